//! Vendor SysEx sub-protocol decoder.
//!
//! Classifies a generically framed SysEx payload into the closed vendor
//! command set and validates shape and checksums before anything mutates.
//! A rejected frame produces exactly one [`SysExReject`]; the caller logs
//! and drops it, and no partial mutation ever occurs.

pub mod performance;
pub mod voice;

use thiserror::Error;

use octavox_midi::status;

use self::voice::{VoiceParam, OPERATOR_MASK_OFFSET, VOICE_IMAGE_LEN};

/// Vendor id carried by the voice/bulk protocol family.
pub const VENDOR_ID: u8 = 0x43;

/// Sub-status high nibbles within the vendor family.
const SUB_BULK: u8 = 0x0;
const SUB_PARAMETER: u8 = 0x1;
const SUB_DUMP_REQUEST: u8 = 0x2;

/// Length of a single-voice bulk frame: header + 155 payload + checksum + F7.
pub const VOICE_BULK_FRAME_LEN: usize = 163;
/// Length of a bank bulk frame: header + 4096 payload + checksum + F7.
pub const BANK_BULK_FRAME_LEN: usize = 4104;
/// Bank bulk payload length (32 packed voices).
pub const BANK_IMAGE_LEN: usize = 4096;

/// Function parameters (64..=77) of the parameter-change sub-protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FunctionParam {
    MonoMode = 64,
    PitchBendRange,
    PitchBendStep,
    PortamentoMode,
    PortamentoGlissando,
    PortamentoTime,
    ModWheelRange,
    ModWheelTarget,
    FootControlRange,
    FootControlTarget,
    BreathControlRange,
    BreathControlTarget,
    AftertouchRange,
    AftertouchTarget,
}

impl FunctionParam {
    pub fn from_id(id: u8) -> Option<Self> {
        use FunctionParam::*;
        let param = match id {
            64 => MonoMode,
            65 => PitchBendRange,
            66 => PitchBendStep,
            67 => PortamentoMode,
            68 => PortamentoGlissando,
            69 => PortamentoTime,
            70 => ModWheelRange,
            71 => ModWheelTarget,
            72 => FootControlRange,
            73 => FootControlTarget,
            74 => BreathControlRange,
            75 => BreathControlTarget,
            76 => AftertouchRange,
            77 => AftertouchTarget,
            _ => return None,
        };
        Some(param)
    }

    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }
}

/// A validated vendor command, borrowed from the frame it arrived in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SysExCommand<'a> {
    /// Request to send the current voice of the addressed slot.
    VoiceDumpRequest,
    /// Function parameter change (mono mode, controller ranges, ...).
    FunctionParameter { param: FunctionParam, value: u8 },
    /// Single voice parameter change.
    VoiceParameter { param: VoiceParam, value: u8 },
    /// Operator on/off mask (6 bits, one per operator).
    OperatorMask { mask: u8 },
    /// Checksum-validated 155-byte voice image.
    VoiceBulk { payload: &'a [u8] },
    /// Checksum-validated 4096-byte bank image.
    BankBulk { payload: &'a [u8] },
}

/// The closed rejection taxonomy. Logged and dropped by the caller.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysExReject {
    #[error("SysEx end status byte not detected")]
    MissingTerminator,
    #[error("SysEx vendor mismatch")]
    VendorMismatch,
    #[error("unknown SysEx parameter change")]
    UnknownParameterChange,
    #[error("unknown SysEx voice or function parameter")]
    UnknownFunction,
    #[error("not a SysEx voice bulk upload")]
    NotVoiceBulk,
    #[error("wrong length for SysEx voice bulk upload (not 155)")]
    VoiceBulkLength,
    #[error("checksum error for one voice")]
    VoiceChecksum,
    #[error("not a SysEx bank bulk upload")]
    NotBankBulk,
    #[error("wrong length for SysEx bank bulk upload (not 4096)")]
    BankBulkLength,
    #[error("checksum error for bank")]
    BankChecksum,
    #[error("unknown SysEx message")]
    UnknownMessage,
}

/// Two's-complement 7-bit checksum over a bulk payload.
///
/// A frame validates when the payload sum plus the checksum byte is zero
/// modulo 128.
pub fn bulk_checksum(payload: &[u8]) -> u8 {
    let sum: u32 = payload.iter().map(|&b| b as u32).sum();
    ((!(sum as u8)).wrapping_add(1)) & 0x7F
}

#[inline]
fn checksum_ok(payload: &[u8], checksum: u8) -> bool {
    let sum: u32 = payload.iter().map(|&b| b as u32).sum();
    (sum + checksum as u32) & 0x7F == 0
}

/// Classify a full `F0 .. F7` frame into the vendor command set.
pub fn classify(frame: &[u8]) -> Result<SysExCommand<'_>, SysExReject> {
    if frame.last() != Some(&status::SYSEX_END) {
        return Err(SysExReject::MissingTerminator);
    }
    if frame.len() < 4 {
        return Err(SysExReject::UnknownMessage);
    }
    if frame[1] != VENDOR_ID {
        return Err(SysExReject::VendorMismatch);
    }

    match frame[2] >> 4 {
        SUB_PARAMETER if frame.len() == 7 => classify_parameter_change(frame),
        SUB_DUMP_REQUEST if frame.len() == 5 => match frame[3] {
            0x00 => Ok(SysExCommand::VoiceDumpRequest),
            _ => Err(SysExReject::UnknownMessage),
        },
        SUB_BULK => classify_bulk(frame),
        _ => Err(SysExReject::UnknownMessage),
    }
}

fn classify_parameter_change(frame: &[u8]) -> Result<SysExCommand<'_>, SysExReject> {
    let group = (frame[3] & 0x7C) >> 2;
    let value = frame[5];
    match group {
        0 => {
            let offset = (((frame[3] & 0x03) as u16) << 7) | frame[4] as u16;
            if offset == OPERATOR_MASK_OFFSET {
                if value > 0x3F {
                    return Err(SysExReject::UnknownParameterChange);
                }
                return Ok(SysExCommand::OperatorMask { mask: value });
            }
            let param =
                VoiceParam::from_offset(offset).ok_or(SysExReject::UnknownParameterChange)?;
            Ok(SysExCommand::VoiceParameter { param, value })
        }
        2 => {
            let param = FunctionParam::from_id(frame[4]).ok_or(SysExReject::UnknownFunction)?;
            Ok(SysExCommand::FunctionParameter { param, value })
        }
        _ => Err(SysExReject::UnknownParameterChange),
    }
}

fn classify_bulk(frame: &[u8]) -> Result<SysExCommand<'_>, SysExReject> {
    match frame[3] {
        // Format 0: one voice, byte count 0x01 0x1B = 155.
        0x00 => {
            if frame.len() < 6 || frame[4] != 0x01 || frame[5] != 0x1B {
                return Err(SysExReject::NotVoiceBulk);
            }
            if frame.len() != VOICE_BULK_FRAME_LEN {
                return Err(SysExReject::VoiceBulkLength);
            }
            let payload = &frame[6..6 + VOICE_IMAGE_LEN];
            if !checksum_ok(payload, frame[6 + VOICE_IMAGE_LEN]) {
                return Err(SysExReject::VoiceChecksum);
            }
            Ok(SysExCommand::VoiceBulk { payload })
        }
        // Format 9: packed 32-voice bank, byte count 0x20 0x00 = 4096.
        0x09 => {
            if frame.len() < 6 || frame[4] != 0x20 || frame[5] != 0x00 {
                return Err(SysExReject::NotBankBulk);
            }
            if frame.len() != BANK_BULK_FRAME_LEN {
                return Err(SysExReject::BankBulkLength);
            }
            let payload = &frame[6..6 + BANK_IMAGE_LEN];
            if !checksum_ok(payload, frame[6 + BANK_IMAGE_LEN]) {
                return Err(SysExReject::BankChecksum);
            }
            Ok(SysExCommand::BankBulk { payload })
        }
        _ => Err(SysExReject::UnknownMessage),
    }
}

/// Build a 163-byte single-voice dump frame from a 155-byte voice image.
pub fn voice_dump_frame(channel: u8, image: &[u8]) -> Vec<u8> {
    debug_assert_eq!(image.len(), VOICE_IMAGE_LEN);
    let mut frame = Vec::with_capacity(VOICE_BULK_FRAME_LEN);
    frame.push(status::SYSEX_BEGIN);
    frame.push(VENDOR_ID);
    frame.push(channel & 0x0F);
    frame.push(0x00);
    frame.push(0x01);
    frame.push(0x1B);
    frame.extend_from_slice(image);
    frame.push(bulk_checksum(image));
    frame.push(status::SYSEX_END);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice_bulk_frame(image: &[u8]) -> Vec<u8> {
        voice_dump_frame(0, image)
    }

    #[test]
    fn test_vendor_mismatch() {
        let frame = [0xF0, 0x42, 0x10, 0x00, 0xF7];
        assert_eq!(classify(&frame), Err(SysExReject::VendorMismatch));
    }

    #[test]
    fn test_missing_terminator() {
        let frame = [0xF0, 0x43, 0x10, 0x00, 0x00];
        assert_eq!(classify(&frame), Err(SysExReject::MissingTerminator));
    }

    #[test]
    fn test_function_parameter_change() {
        // Function group (2 << 2 = 0x08), param 65, value 7.
        let frame = [0xF0, 0x43, 0x10, 0x08, 65, 7, 0xF7];
        assert_eq!(
            classify(&frame),
            Ok(SysExCommand::FunctionParameter {
                param: FunctionParam::PitchBendRange,
                value: 7
            })
        );
    }

    #[test]
    fn test_unknown_function_rejected() {
        let frame = [0xF0, 0x43, 0x10, 0x08, 78, 0, 0xF7];
        assert_eq!(classify(&frame), Err(SysExReject::UnknownFunction));

        let frame = [0xF0, 0x43, 0x10, 0x08, 63, 0, 0xF7];
        assert_eq!(classify(&frame), Err(SysExReject::UnknownFunction));
    }

    #[test]
    fn test_voice_parameter_change() {
        // Offset 134 (algorithm) = high bits 0x01, low byte 0x06.
        let frame = [0xF0, 0x43, 0x10, 0x01, 0x06, 12, 0xF7];
        match classify(&frame) {
            Ok(SysExCommand::VoiceParameter { param, value }) => {
                assert_eq!(param.offset(), 134);
                assert_eq!(value, 12);
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn test_operator_mask() {
        // Offset 155 = high bits 0x01, low byte 0x1B.
        let frame = [0xF0, 0x43, 0x10, 0x01, 0x1B, 0b101010, 0xF7];
        assert_eq!(
            classify(&frame),
            Ok(SysExCommand::OperatorMask { mask: 0b101010 })
        );

        let frame = [0xF0, 0x43, 0x10, 0x01, 0x1B, 0x40, 0xF7];
        assert_eq!(classify(&frame), Err(SysExReject::UnknownParameterChange));
    }

    #[test]
    fn test_unknown_group_rejected() {
        let frame = [0xF0, 0x43, 0x10, 0x04, 0, 0, 0xF7];
        assert_eq!(classify(&frame), Err(SysExReject::UnknownParameterChange));
    }

    #[test]
    fn test_voice_dump_request() {
        let frame = [0xF0, 0x43, 0x20, 0x00, 0xF7];
        assert_eq!(classify(&frame), Ok(SysExCommand::VoiceDumpRequest));

        // Format 9 dump requests are not part of the command set.
        let frame = [0xF0, 0x43, 0x20, 0x09, 0xF7];
        assert_eq!(classify(&frame), Err(SysExReject::UnknownMessage));
    }

    #[test]
    fn test_voice_bulk_accepts_valid_checksum() {
        let image: Vec<u8> = (0..155).map(|i| (i % 100) as u8).collect();
        let frame = voice_bulk_frame(&image);
        assert_eq!(frame.len(), VOICE_BULK_FRAME_LEN);
        match classify(&frame) {
            Ok(SysExCommand::VoiceBulk { payload }) => assert_eq!(payload, &image[..]),
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn test_voice_bulk_rejects_flipped_bit() {
        let image: Vec<u8> = (0..155).map(|i| (i % 100) as u8).collect();
        let mut frame = voice_bulk_frame(&image);
        frame[20] ^= 0x01;
        assert_eq!(classify(&frame), Err(SysExReject::VoiceChecksum));
    }

    #[test]
    fn test_voice_bulk_wrong_length() {
        let image: Vec<u8> = (0..155).map(|i| (i % 100) as u8).collect();
        let mut frame = voice_bulk_frame(&image);
        frame.remove(100);
        assert_eq!(classify(&frame), Err(SysExReject::VoiceBulkLength));
    }

    #[test]
    fn test_voice_bulk_bad_byte_count() {
        let image: Vec<u8> = (0..155).map(|i| (i % 100) as u8).collect();
        let mut frame = voice_bulk_frame(&image);
        frame[5] = 0x1C;
        assert_eq!(classify(&frame), Err(SysExReject::NotVoiceBulk));
    }

    #[test]
    fn test_bank_bulk_round_trip() {
        let image: Vec<u8> = (0..BANK_IMAGE_LEN).map(|i| (i % 128) as u8).collect();
        let mut frame = vec![0xF0, 0x43, 0x00, 0x09, 0x20, 0x00];
        frame.extend_from_slice(&image);
        frame.push(bulk_checksum(&image));
        frame.push(0xF7);
        assert_eq!(frame.len(), BANK_BULK_FRAME_LEN);
        match classify(&frame) {
            Ok(SysExCommand::BankBulk { payload }) => assert_eq!(payload.len(), BANK_IMAGE_LEN),
            other => panic!("unexpected classification: {other:?}"),
        }

        let checksum_index = frame.len() - 2;
        frame[checksum_index] ^= 0x7F;
        assert_eq!(classify(&frame), Err(SysExReject::BankChecksum));
    }

    #[test]
    fn test_checksum_zero_mod_128() {
        let payload = [1u8, 2, 3, 4, 5];
        let sum: u32 = payload.iter().map(|&b| b as u32).sum();
        assert_eq!((sum + bulk_checksum(&payload) as u32) & 0x7F, 0);
    }

    #[test]
    fn test_unknown_message() {
        let frame = [0xF0, 0x43, 0x30, 0x00, 0xF7];
        assert_eq!(classify(&frame), Err(SysExReject::UnknownMessage));
    }
}
