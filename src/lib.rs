//! # Octavox - polyphonic FM synthesizer MIDI engine
//!
//! Umbrella crate re-exporting the MIDI subsystems:
//! - **octavox-midi** - core wire types (messages, channel assignments,
//!   14-bit value helpers)
//! - **octavox-midi-io** - the protocol engine (transports, reassembly,
//!   routing, vendor SysEx sub-protocols, device registry)
//!
//! ## Quick start
//!
//! ```ignore
//! use octavox::prelude::*;
//!
//! let mut system = MidiSystem::builder(MidiConfig::default())
//!     .voice_engine(engine)
//!     .performance_store(store)
//!     .serial(Box::new(uart))
//!     .build()?;
//!
//! // Called from the firmware main loop.
//! loop {
//!     system.poll();
//! }
//! ```

/// Re-export of the core wire-type crate for direct access.
pub use octavox_midi as midi;

/// Re-export of the protocol-engine crate for direct access.
pub use octavox_midi_io as midi_io;

pub use octavox_midi::{
    decode_midi14, decode_midi14_signed, encode_midi14, encode_midi14_signed, status,
    ChannelAssignment, ChannelMessage, Message, RealTimeMessage, SysExMessage, SYSEX_MAX_LEN,
};

pub use octavox_midi_io::{
    CcRole, DatagramLink, DeviceRegistry, Error, FunctionParam, MidiConfig, MidiSystem,
    MidiSystemBuilder, PacketReassembler, ParamDomain, ParserState, PerformanceStore, Result,
    Router, SerialLink, SessionEvent, SessionLink, StreamReassembler, SysExCommand, SysExListener,
    SysExReject, SystemCcMap, Transport, UiEventSink, UsbMidiPort, VoiceEngine, VoiceSlot,
    VoiceSlots, VoiceSlotsReader,
};

pub mod prelude {
    pub use crate::{
        ChannelAssignment, ChannelMessage, Message, MidiConfig, MidiSystem, MidiSystemBuilder,
        PerformanceStore, SysExListener, UiEventSink, VoiceEngine,
    };
}
