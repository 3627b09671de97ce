//! Performance parameter sub-protocol.
//!
//! A second vendor-prefixed SysEx family (development/educational vendor id
//! 0x7D) for external configuration tools, addressing either the global
//! configuration domain or one voice slot. GET requests are answered with
//! the matching SET shape as a readback, sent point-to-point on the
//! originating transport. A successful SET triggers a whole-domain reload.
//!
//! Parsing stops at the frame terminator or the computed length and never
//! reads past either bound, even for malformed input.

use crate::collab::{ParamDomain, PerformanceStore};
use crate::slots::VoiceSlots;
use octavox_midi::{decode_midi14_signed, encode_midi14_signed, status, ChannelAssignment};

/// Vendor id of the performance protocol family.
pub const PERFORMANCE_VENDOR_ID: u8 = 0x7D;

pub const GET_GLOBAL: u8 = 0x10;
pub const GET_TG: u8 = 0x11;
pub const SET_GLOBAL: u8 = 0x20;
pub const SET_TG: u8 = 0x21;

// Global domain parameter ids.
pub const GLOBAL_COMPRESSOR_ENABLE: u16 = 0x0000;
pub const GLOBAL_REVERB_ENABLE: u16 = 0x0001;
pub const GLOBAL_REVERB_SIZE: u16 = 0x0002;
pub const GLOBAL_REVERB_HIGH_DAMP: u16 = 0x0003;
pub const GLOBAL_REVERB_LOW_DAMP: u16 = 0x0004;
pub const GLOBAL_REVERB_LOW_PASS: u16 = 0x0005;
pub const GLOBAL_REVERB_DIFFUSION: u16 = 0x0006;
pub const GLOBAL_REVERB_LEVEL: u16 = 0x0007;

/// Every known global parameter, in dump order.
pub const ALL_GLOBAL_PARAMS: [u16; 8] = [
    GLOBAL_COMPRESSOR_ENABLE,
    GLOBAL_REVERB_ENABLE,
    GLOBAL_REVERB_SIZE,
    GLOBAL_REVERB_HIGH_DAMP,
    GLOBAL_REVERB_LOW_DAMP,
    GLOBAL_REVERB_LOW_PASS,
    GLOBAL_REVERB_DIFFUSION,
    GLOBAL_REVERB_LEVEL,
];

// Per-slot (tone generator) parameter ids.
pub const TG_BANK_NUMBER: u16 = 0x0100;
pub const TG_VOICE_NUMBER: u16 = 0x0101;
pub const TG_MIDI_CHANNEL: u16 = 0x0102;
pub const TG_VOLUME: u16 = 0x0103;
pub const TG_PAN: u16 = 0x0104;
pub const TG_DETUNE: u16 = 0x0105;
pub const TG_CUTOFF: u16 = 0x0106;
pub const TG_RESONANCE: u16 = 0x0107;
pub const TG_NOTE_LIMIT_LOW: u16 = 0x0108;
pub const TG_NOTE_LIMIT_HIGH: u16 = 0x0109;
pub const TG_NOTE_SHIFT: u16 = 0x010A;
pub const TG_REVERB_SEND: u16 = 0x010B;
pub const TG_PITCH_BEND_RANGE: u16 = 0x010C;
pub const TG_PITCH_BEND_STEP: u16 = 0x010D;
pub const TG_PORTAMENTO_MODE: u16 = 0x010E;
pub const TG_PORTAMENTO_GLISSANDO: u16 = 0x010F;
pub const TG_PORTAMENTO_TIME: u16 = 0x0110;
pub const TG_MONO_MODE: u16 = 0x0111;
pub const TG_MOD_WHEEL_RANGE: u16 = 0x0112;
pub const TG_MOD_WHEEL_TARGET: u16 = 0x0113;
pub const TG_FOOT_CONTROL_RANGE: u16 = 0x0114;
pub const TG_FOOT_CONTROL_TARGET: u16 = 0x0115;
pub const TG_BREATH_CONTROL_RANGE: u16 = 0x0116;
pub const TG_BREATH_CONTROL_TARGET: u16 = 0x0117;
pub const TG_AFTERTOUCH_RANGE: u16 = 0x0118;
pub const TG_AFTERTOUCH_TARGET: u16 = 0x0119;

/// Every known per-slot parameter, in dump order.
pub const ALL_TG_PARAMS: [u16; 26] = [
    TG_BANK_NUMBER,
    TG_VOICE_NUMBER,
    TG_MIDI_CHANNEL,
    TG_VOLUME,
    TG_PAN,
    TG_DETUNE,
    TG_CUTOFF,
    TG_RESONANCE,
    TG_NOTE_LIMIT_LOW,
    TG_NOTE_LIMIT_HIGH,
    TG_NOTE_SHIFT,
    TG_REVERB_SEND,
    TG_PITCH_BEND_RANGE,
    TG_PITCH_BEND_STEP,
    TG_PORTAMENTO_MODE,
    TG_PORTAMENTO_GLISSANDO,
    TG_PORTAMENTO_TIME,
    TG_MONO_MODE,
    TG_MOD_WHEEL_RANGE,
    TG_MOD_WHEEL_TARGET,
    TG_FOOT_CONTROL_RANGE,
    TG_FOOT_CONTROL_TARGET,
    TG_BREATH_CONTROL_RANGE,
    TG_BREATH_CONTROL_TARGET,
    TG_AFTERTOUCH_RANGE,
    TG_AFTERTOUCH_TARGET,
];

/// Parameters whose values travel in the offset-8192 signed encoding.
#[inline]
fn is_signed_param(param: u16) -> bool {
    param == TG_DETUNE || param == TG_NOTE_SHIFT
}

/// True when the frame belongs to this protocol family.
#[inline]
pub fn is_performance_frame(frame: &[u8]) -> bool {
    frame.len() >= 4 && frame[1] == PERFORMANCE_VENDOR_ID
}

/// Handle one performance-protocol frame. `reply` enqueues a response frame
/// on the originating transport.
pub fn handle(
    frame: &[u8],
    store: &dyn PerformanceStore,
    slots: &VoiceSlots,
    mut reply: impl FnMut(Vec<u8>),
) {
    if frame.first() != Some(&status::SYSEX_BEGIN)
        || frame.last() != Some(&status::SYSEX_END)
        || !is_performance_frame(frame)
    {
        tracing::warn!("malformed performance SysEx frame");
        return;
    }

    let end = frame.len() - 1; // index of the F7 terminator
    let cmd = frame[2];
    let (slot, mut offset) = match cmd {
        GET_GLOBAL | SET_GLOBAL => (None, 3),
        GET_TG | SET_TG => {
            if end < 4 {
                tracing::warn!("per-slot performance request too short");
                return;
            }
            (Some(frame[3] as usize), 4)
        }
        _ => {
            tracing::warn!(cmd, "unrecognized performance SysEx command");
            return;
        }
    };

    if offset == end {
        // No tuples: dump every known parameter of the domain.
        match cmd {
            GET_GLOBAL => reply(dump_global(store)),
            GET_TG => {
                if let Some(slot) = slot {
                    reply(dump_slot(store, slot));
                }
            }
            _ => {} // a SET with no tuples mutates nothing
        }
        return;
    }

    while offset + 1 < end {
        if frame[offset] == status::SYSEX_END {
            break;
        }
        let param = u16::from_be_bytes([frame[offset], frame[offset + 1]]);
        offset += 2;

        match cmd {
            GET_GLOBAL => {
                if let Some(resp) = get_reply(store, param, None) {
                    reply(resp);
                }
            }
            GET_TG => {
                if let Some(resp) = get_reply(store, param, slot) {
                    reply(resp);
                }
            }
            SET_GLOBAL | SET_TG => {
                if offset + 1 >= end {
                    tracing::warn!(param, "performance SET missing value bytes");
                    break;
                }
                let value = decode_value(param, frame[offset], frame[offset + 1]);
                offset += 2;
                apply_set(store, slots, param, value, slot);
            }
            _ => unreachable!(),
        }
    }
}

fn decode_value(param: u16, hi: u8, lo: u8) -> u16 {
    if is_signed_param(param) {
        decode_midi14_signed(hi, lo) as u16
    } else {
        u16::from_be_bytes([hi, lo])
    }
}

fn apply_set(
    store: &dyn PerformanceStore,
    slots: &VoiceSlots,
    param: u16,
    value: u16,
    slot: Option<usize>,
) {
    let ok = match slot {
        None => store.set_global_parameter(param, value),
        Some(slot) => {
            let ok = store.set_slot_parameter(param, value, slot);
            if ok && param == TG_MIDI_CHANNEL {
                // The channel map is live routing state, not just
                // configuration; keep the slot table in sync (preserving
                // the Omni memory rules).
                slots.set_assignment(slot, ChannelAssignment::from_raw(value as u8));
            }
            ok
        }
    };

    if ok {
        let domain = match slot {
            None => ParamDomain::Global,
            Some(slot) => ParamDomain::Slot(slot),
        };
        tracing::debug!(param, value, ?domain, "performance SET applied");
        store.reload_domain(domain);
    } else {
        tracing::warn!(param, value, "performance SET rejected by store");
    }
}

fn get_reply(store: &dyn PerformanceStore, param: u16, slot: Option<usize>) -> Option<Vec<u8>> {
    let value = match slot {
        None => store.global_parameter(param),
        Some(slot) => store.slot_parameter(param, slot),
    };
    let Some(value) = value else {
        tracing::warn!(param, "performance GET for unknown parameter");
        return None;
    };

    let (vh, vl) = if is_signed_param(param) {
        encode_midi14_signed(value as i16 as i32)
    } else {
        let [hi, lo] = value.to_be_bytes();
        (hi, lo)
    };

    let [ph, pl] = param.to_be_bytes();
    let mut resp = vec![status::SYSEX_BEGIN, PERFORMANCE_VENDOR_ID];
    match slot {
        None => resp.push(SET_GLOBAL),
        Some(slot) => {
            resp.push(SET_TG);
            resp.push(slot as u8);
        }
    }
    resp.extend_from_slice(&[ph, pl, vh, vl, status::SYSEX_END]);
    Some(resp)
}

fn dump_global(store: &dyn PerformanceStore) -> Vec<u8> {
    let mut resp = vec![status::SYSEX_BEGIN, PERFORMANCE_VENDOR_ID, SET_GLOBAL];
    for &param in &ALL_GLOBAL_PARAMS {
        let value = store.global_parameter(param).unwrap_or(0);
        resp.extend_from_slice(&param.to_be_bytes());
        resp.extend_from_slice(&value.to_be_bytes());
    }
    resp.push(status::SYSEX_END);
    resp
}

fn dump_slot(store: &dyn PerformanceStore, slot: usize) -> Vec<u8> {
    let mut resp = vec![
        status::SYSEX_BEGIN,
        PERFORMANCE_VENDOR_ID,
        SET_TG,
        slot as u8,
    ];
    for &param in &ALL_TG_PARAMS {
        let value = store.slot_parameter(param, slot).unwrap_or(0);
        resp.extend_from_slice(&param.to_be_bytes());
        resp.extend_from_slice(&value.to_be_bytes());
    }
    resp.push(status::SYSEX_END);
    resp
}
