//! Decoded MIDI message types with byte-exact re-encoding.

use thiserror::Error;

/// Hard upper bound for a System Exclusive frame, including `F0`/`F7`.
///
/// Sized for the largest vendor frame this engine speaks (a 4096-byte bank
/// bulk upload plus header and checksum).
pub const SYSEX_MAX_LEN: usize = 4104;

/// Raw status-byte constants.
pub mod status {
    pub const NOTE_OFF: u8 = 0x80;
    pub const NOTE_ON: u8 = 0x90;
    pub const POLY_PRESSURE: u8 = 0xA0;
    pub const CONTROL_CHANGE: u8 = 0xB0;
    pub const PROGRAM_CHANGE: u8 = 0xC0;
    pub const CHANNEL_PRESSURE: u8 = 0xD0;
    pub const PITCH_BEND: u8 = 0xE0;

    pub const SYSEX_BEGIN: u8 = 0xF0;
    pub const SYSEX_END: u8 = 0xF7;

    pub const TIMING_CLOCK: u8 = 0xF8;
    pub const START: u8 = 0xFA;
    pub const CONTINUE: u8 = 0xFB;
    pub const STOP: u8 = 0xFC;
    pub const ACTIVE_SENSING: u8 = 0xFE;
    pub const RESET: u8 = 0xFF;
}

/// Control-change numbers handled by the router.
pub mod cc {
    pub const BANK_SELECT_MSB: u8 = 0;
    pub const MODULATION: u8 = 1;
    pub const BREATH_CONTROLLER: u8 = 2;
    pub const FOOT_PEDAL: u8 = 4;
    pub const VOLUME: u8 = 7;
    pub const PAN_POSITION: u8 = 10;
    pub const BANK_SELECT_LSB: u8 = 32;
    pub const SUSTAIN: u8 = 64;
    pub const RESONANCE: u8 = 71;
    pub const FREQUENCY_CUTOFF: u8 = 74;
    pub const REVERB_LEVEL: u8 = 91;
    pub const DETUNE_LEVEL: u8 = 94;
    pub const ALL_SOUND_OFF: u8 = 120;
    pub const ALL_NOTES_OFF: u8 = 123;
}

/// A decoded channel voice message (status high nibble `0x8`..`0xE`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelMessage {
    NoteOff { key: u8, velocity: u8 },
    NoteOn { key: u8, velocity: u8 },
    PolyPressure { key: u8, pressure: u8 },
    ControlChange { controller: u8, value: u8 },
    ProgramChange { program: u8 },
    ChannelPressure { pressure: u8 },
    /// Decoded 14-bit bend, centered at 0 (-8192..=8191).
    PitchBend { value: i16 },
}

impl ChannelMessage {
    /// Number of data bytes following a given status byte (1 or 2).
    #[inline]
    pub fn data_len(status: u8) -> usize {
        match status & 0xF0 {
            status::PROGRAM_CHANGE | status::CHANNEL_PRESSURE => 1,
            _ => 2,
        }
    }

    /// Decode from a status byte and its data bytes. `d2` is ignored for
    /// single-data-byte messages. Returns `None` for non-channel statuses.
    pub fn decode(status: u8, d1: u8, d2: u8) -> Option<Self> {
        let msg = match status & 0xF0 {
            status::NOTE_OFF => ChannelMessage::NoteOff {
                key: d1,
                velocity: d2,
            },
            status::NOTE_ON => ChannelMessage::NoteOn {
                key: d1,
                velocity: d2,
            },
            status::POLY_PRESSURE => ChannelMessage::PolyPressure {
                key: d1,
                pressure: d2,
            },
            status::CONTROL_CHANGE => ChannelMessage::ControlChange {
                controller: d1,
                value: d2,
            },
            status::PROGRAM_CHANGE => ChannelMessage::ProgramChange { program: d1 },
            status::CHANNEL_PRESSURE => ChannelMessage::ChannelPressure { pressure: d1 },
            status::PITCH_BEND => {
                let raw = (d1 as u16) | ((d2 as u16) << 7);
                ChannelMessage::PitchBend {
                    value: raw as i16 - 0x2000,
                }
            }
            _ => return None,
        };
        Some(msg)
    }

    /// The status high nibble for this message kind.
    #[inline]
    pub fn status_nibble(&self) -> u8 {
        match self {
            ChannelMessage::NoteOff { .. } => status::NOTE_OFF,
            ChannelMessage::NoteOn { .. } => status::NOTE_ON,
            ChannelMessage::PolyPressure { .. } => status::POLY_PRESSURE,
            ChannelMessage::ControlChange { .. } => status::CONTROL_CHANGE,
            ChannelMessage::ProgramChange { .. } => status::PROGRAM_CHANGE,
            ChannelMessage::ChannelPressure { .. } => status::CHANNEL_PRESSURE,
            ChannelMessage::PitchBend { .. } => status::PITCH_BEND,
        }
    }

    /// Re-encode onto a channel. Returns the bytes and their count (2 or 3).
    pub fn encode(&self, channel: u8) -> ([u8; 3], usize) {
        let st = self.status_nibble() | (channel & 0x0F);
        match *self {
            ChannelMessage::NoteOff { key, velocity } => ([st, key, velocity], 3),
            ChannelMessage::NoteOn { key, velocity } => ([st, key, velocity], 3),
            ChannelMessage::PolyPressure { key, pressure } => ([st, key, pressure], 3),
            ChannelMessage::ControlChange { controller, value } => ([st, controller, value], 3),
            ChannelMessage::ProgramChange { program } => ([st, program, 0], 2),
            ChannelMessage::ChannelPressure { pressure } => ([st, pressure, 0], 2),
            ChannelMessage::PitchBend { value } => {
                let raw = (value + 0x2000) as u16;
                ([st, (raw & 0x7F) as u8, ((raw >> 7) & 0x7F) as u8], 3)
            }
        }
    }
}

/// Single-byte System Realtime messages; may interleave anywhere in a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RealTimeMessage {
    TimingClock,
    Start,
    Continue,
    Stop,
    ActiveSensing,
    Reset,
}

impl RealTimeMessage {
    #[inline]
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            status::TIMING_CLOCK => Some(RealTimeMessage::TimingClock),
            status::START => Some(RealTimeMessage::Start),
            status::CONTINUE => Some(RealTimeMessage::Continue),
            status::STOP => Some(RealTimeMessage::Stop),
            status::ACTIVE_SENSING => Some(RealTimeMessage::ActiveSensing),
            status::RESET => Some(RealTimeMessage::Reset),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        match self {
            RealTimeMessage::TimingClock => status::TIMING_CLOCK,
            RealTimeMessage::Start => status::START,
            RealTimeMessage::Continue => status::CONTINUE,
            RealTimeMessage::Stop => status::STOP,
            RealTimeMessage::ActiveSensing => status::ACTIVE_SENSING,
            RealTimeMessage::Reset => status::RESET,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("SysEx frame must start with F0")]
    MissingStart,
    #[error("SysEx frame must end with F7")]
    MissingEnd,
    #[error("SysEx frame exceeds {SYSEX_MAX_LEN} bytes")]
    Oversize,
}

/// A complete System Exclusive frame, `F0 .. F7` inclusive.
///
/// Immutable once built; length is bounded by [`SYSEX_MAX_LEN`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SysExMessage {
    data: Vec<u8>,
}

impl SysExMessage {
    pub fn new(data: Vec<u8>) -> Result<Self, FrameError> {
        if data.first() != Some(&status::SYSEX_BEGIN) {
            return Err(FrameError::MissingStart);
        }
        if data.last() != Some(&status::SYSEX_END) || data.len() < 2 {
            return Err(FrameError::MissingEnd);
        }
        if data.len() > SYSEX_MAX_LEN {
            return Err(FrameError::Oversize);
        }
        Ok(Self { data })
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        false // framing guarantees at least F0 F7
    }

    /// Manufacturer id byte (the byte after `F0`), if present.
    #[inline]
    pub fn vendor(&self) -> Option<u8> {
        self.data.get(1).copied()
    }

    /// Third byte: vendor sub-status + channel for the protocols spoken here.
    #[inline]
    pub fn sub_status(&self) -> Option<u8> {
        self.data.get(2).copied()
    }

    /// Channel nibble embedded in the sub-status byte.
    #[inline]
    pub fn embedded_channel(&self) -> Option<u8> {
        self.sub_status().map(|b| b & 0x0F)
    }
}

/// One reassembled MIDI message, as handed to the router.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Channel { channel: u8, msg: ChannelMessage },
    SysEx(SysExMessage),
    RealTime(RealTimeMessage),
}

impl Message {
    /// The channel this message addresses, if it is a channel message.
    #[inline]
    pub fn channel(&self) -> Option<u8> {
        match self {
            Message::Channel { channel, .. } => Some(*channel),
            _ => None,
        }
    }

    /// Byte-exact wire form, used for Thru mirroring and loopback.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Message::Channel { channel, msg } => {
                let (buf, len) = msg.encode(*channel);
                buf[..len].to_vec()
            }
            Message::SysEx(sysex) => sysex.as_bytes().to_vec(),
            Message::RealTime(rt) => vec![rt.to_byte()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_note_on() {
        let msg = ChannelMessage::decode(0x91, 60, 100).unwrap();
        assert_eq!(
            msg,
            ChannelMessage::NoteOn {
                key: 60,
                velocity: 100
            }
        );
    }

    #[test]
    fn test_decode_rejects_system_status() {
        assert_eq!(ChannelMessage::decode(0xF0, 0, 0), None);
        assert_eq!(ChannelMessage::decode(0xF8, 0, 0), None);
    }

    #[test]
    fn test_data_len() {
        assert_eq!(ChannelMessage::data_len(0x90), 2);
        assert_eq!(ChannelMessage::data_len(0xC5), 1);
        assert_eq!(ChannelMessage::data_len(0xD0), 1);
        assert_eq!(ChannelMessage::data_len(0xE7), 2);
    }

    #[test]
    fn test_pitch_bend_center() {
        let msg = ChannelMessage::decode(0xE0, 0x00, 0x40).unwrap();
        assert_eq!(msg, ChannelMessage::PitchBend { value: 0 });

        let (bytes, len) = msg.encode(0);
        assert_eq!(len, 3);
        assert_eq!(&bytes[..3], &[0xE0, 0x00, 0x40]);
    }

    #[test]
    fn test_encode_round_trip() {
        let cases = [
            (0x83, 64, 0),
            (0x91, 60, 100),
            (0xA2, 60, 50),
            (0xB5, 7, 127),
            (0xC9, 12, 0),
            (0xDF, 99, 0),
            (0xE1, 0x12, 0x34),
        ];
        for (st, d1, d2) in cases {
            let msg = ChannelMessage::decode(st, d1, d2).unwrap();
            let (bytes, len) = msg.encode(st & 0x0F);
            assert_eq!(bytes[0], st);
            assert_eq!(bytes[1], d1);
            if len == 3 {
                assert_eq!(bytes[2], d2);
            }
        }
    }

    #[test]
    fn test_sysex_framing() {
        assert!(SysExMessage::new(vec![0xF0, 0x43, 0xF7]).is_ok());
        assert_eq!(
            SysExMessage::new(vec![0x43, 0xF7]).unwrap_err(),
            FrameError::MissingStart
        );
        assert_eq!(
            SysExMessage::new(vec![0xF0, 0x43]).unwrap_err(),
            FrameError::MissingEnd
        );

        let mut oversize = vec![0u8; SYSEX_MAX_LEN + 1];
        oversize[0] = 0xF0;
        *oversize.last_mut().unwrap() = 0xF7;
        assert_eq!(
            SysExMessage::new(oversize).unwrap_err(),
            FrameError::Oversize
        );
    }

    #[test]
    fn test_sysex_embedded_channel() {
        let sysex = SysExMessage::new(vec![0xF0, 0x43, 0x13, 0x00, 0xF7]).unwrap();
        assert_eq!(sysex.vendor(), Some(0x43));
        assert_eq!(sysex.embedded_channel(), Some(3));
    }

    #[test]
    fn test_message_to_bytes() {
        let msg = Message::Channel {
            channel: 1,
            msg: ChannelMessage::NoteOn {
                key: 0x3C,
                velocity: 0x40,
            },
        };
        assert_eq!(msg.to_bytes(), vec![0x91, 0x3C, 0x40]);

        let msg = Message::Channel {
            channel: 9,
            msg: ChannelMessage::ProgramChange { program: 5 },
        };
        assert_eq!(msg.to_bytes(), vec![0xC9, 0x05]);

        assert_eq!(
            Message::RealTime(RealTimeMessage::TimingClock).to_bytes(),
            vec![0xF8]
        );
    }
}
