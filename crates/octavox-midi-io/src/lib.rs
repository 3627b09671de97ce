//! MIDI protocol engine for the Octavox synthesizer.
//!
//! Accepts raw byte/packet streams from several independent transports,
//! reassembles them into discrete MIDI messages, and dispatches each one to
//! independently addressable voice slots according to a dynamic channel
//! map. Vendor SysEx sub-protocols (master volume, bulk voice/bank
//! transfer, operator masks, performance parameter get/set) are decoded and
//! validated here before any collaborator is touched.
//!
//! Everything is cooperative and non-blocking: each transport is pumped by
//! a periodic [`MidiSystem::poll`] call, and outbound traffic is queued per
//! transport and flushed on its next tick.

pub mod error;
pub use error::{Error, Result};

mod system;
pub use system::{MidiSystem, MidiSystemBuilder};

pub mod config;
pub use config::{MidiConfig, DEFAULT_UDP_PORT};

pub mod collab;
pub use collab::{ParamDomain, PerformanceStore, SysExListener, UiEventSink, VoiceEngine};

pub mod reassembly;
pub use reassembly::{PacketReassembler, ParserState, StreamReassembler};

pub mod registry;
pub use registry::{DeviceRegistry, OutboundSender};

pub mod router;
pub use router::Router;

pub mod slots;
pub use slots::{VoiceSlot, VoiceSlots, VoiceSlotsReader};

pub mod system_cc;
pub use system_cc::{CcRole, SystemCcMap};

pub mod sysex;
pub use sysex::{FunctionParam, SysExCommand, SysExReject};

pub mod transport;
pub use transport::{
    DatagramLink, SerialLink, SessionEvent, SessionLink, Transport, UsbMidiPort,
};

pub use octavox_midi::{
    status, ChannelAssignment, ChannelMessage, Message, RealTimeMessage, SysExMessage,
    SYSEX_MAX_LEN,
};

#[cfg(test)]
pub(crate) mod test_support;
