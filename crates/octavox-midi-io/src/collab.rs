//! Collaborator traits.
//!
//! The protocol engine drives these seams; the FM voice renderer, the
//! performance store, and the UI are external to this crate. All traits are
//! object-safe and take `&self` — implementations handle their own interior
//! mutability, since calls arrive from whichever transport was polled last.

use crate::sysex::voice::VoiceParam;
use crate::sysex::FunctionParam;

/// The synthesis engine behind the voice slots.
///
/// Covers the per-slot note path, the controller setters the router maps
/// Control Change messages onto, and the voice-parameter store addressed by
/// the vendor SysEx protocol. Defaults are no-ops so hosts and tests only
/// implement what they observe.
#[allow(unused_variables)]
pub trait VoiceEngine: Send + Sync {
    fn key_down(&self, key: u8, velocity: u8, slot: usize) {}
    fn key_up(&self, key: u8, slot: usize) {}
    fn set_aftertouch(&self, pressure: u8, slot: usize) {}
    /// Re-applies controller state after one of the modulation sources moved.
    fn controllers_refresh(&self, slot: usize) {}

    fn set_mod_wheel(&self, value: u8, slot: usize) {}
    fn set_breath_controller(&self, value: u8, slot: usize) {}
    fn set_foot_controller(&self, value: u8, slot: usize) {}
    fn set_volume(&self, value: u8, slot: usize) {}
    fn set_pan(&self, value: u8, slot: usize) {}
    fn bank_select_lsb(&self, value: u8, slot: usize) {}
    fn set_sustain(&self, on: bool, slot: usize) {}
    /// Value already scaled to 0..=99.
    fn set_resonance(&self, value: u8, slot: usize) {}
    /// Value already scaled to 0..=99.
    fn set_cutoff(&self, value: u8, slot: usize) {}
    /// Value already scaled to 0..=99.
    fn set_reverb_send(&self, value: u8, slot: usize) {}
    /// -99..=99, 0 = no detune.
    fn set_master_tune(&self, value: i8, slot: usize) {}
    fn program_change(&self, program: u8, slot: usize) {}
    /// Decoded 14-bit bend, centered at 0.
    fn set_pitch_bend(&self, value: i16, slot: usize) {}

    /// All Sound Off (CC 120).
    fn panic(&self, value: u8, slot: usize) {}
    /// All Notes Off (CC 123).
    fn notes_off(&self, value: u8, slot: usize) {}

    /// 14-bit master volume scaled to 0.0..=1.0. Global, not per slot.
    fn set_master_volume(&self, volume: f32) {}

    /// Function parameter change from the vendor SysEx protocol.
    fn set_function_parameter(&self, param: FunctionParam, value: u8, slot: usize) {}
    /// Single voice parameter change, value already clamped to the field
    /// bound.
    fn set_voice_parameter(&self, param: VoiceParam, value: u8, slot: usize) {}
    /// Operator on/off mask, one bit per operator (bit 0 = operator 1).
    fn set_operator_mask(&self, mask: u8, slot: usize) {}
    /// Checksum-validated 155-byte voice image; applied atomically.
    fn load_voice(&self, image: &[u8], slot: usize) {}
    /// Current 155-byte voice image of a slot, for dump replies.
    fn voice_dump(&self, slot: usize) -> Vec<u8> {
        vec![0; crate::sysex::voice::VOICE_IMAGE_LEN]
    }
}

/// Which configuration domain a performance parameter lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamDomain {
    Global,
    Slot(usize),
}

/// Store behind the performance parameter sub-protocol.
#[allow(unused_variables)]
pub trait PerformanceStore: Send + Sync {
    fn global_parameter(&self, param: u16) -> Option<u16>;
    /// Returns false for unknown ids or out-of-range values.
    fn set_global_parameter(&self, param: u16, value: u16) -> bool;
    fn slot_parameter(&self, param: u16, slot: usize) -> Option<u16>;
    fn set_slot_parameter(&self, param: u16, value: u16, slot: usize) -> bool;
    /// Whole-domain refresh after a successful SET. Documented side effect
    /// of the protocol, not an optimization target.
    fn reload_domain(&self, domain: ParamDomain) {}
    /// Program select on the performance-select channel. Returns true when
    /// the program exists (first responder wins).
    fn select_performance(&self, program: u8) -> bool {
        false
    }
}

/// Display feedback for inbound note and controller traffic.
#[allow(unused_variables)]
pub trait UiEventSink: Send + Sync {
    fn note_event(&self, slot: usize, key: u8, velocity: u8, down: bool) {}
    fn control_event(&self, slot: usize, controller: u8, value: u8) {}
    fn clock_tick(&self) {}
}

/// Tap for every completed SysEx on USB transports, used for controller
/// surface identification.
pub trait SysExListener: Send + Sync {
    fn on_sysex(&self, cable: u8, frame: &[u8]);
}
