//! Core MIDI wire types for the Octavox synthesizer.
//!
//! Decoded message enums, channel assignments, status-byte constants, and
//! 14-bit value helpers. No I/O and no shared state; everything here is
//! cheap to copy and safe to use from real-time contexts.

mod channel;
mod message;
mod utils;

pub use channel::ChannelAssignment;
pub use message::{
    cc, status, ChannelMessage, FrameError, Message, RealTimeMessage, SysExMessage, SYSEX_MAX_LEN,
};
pub use utils::{decode_midi14, decode_midi14_signed, encode_midi14, encode_midi14_signed};
