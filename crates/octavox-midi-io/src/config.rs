//! Engine configuration.

use octavox_midi::ChannelAssignment;
use serde::{Deserialize, Serialize};

/// Default UDP MIDI port.
pub const DEFAULT_UDP_PORT: u16 = 1999;

/// Configuration for the MIDI protocol engine.
///
/// Loaded once at startup by the host firmware; the engine treats it as
/// read-only for its whole lifetime.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    /// Number of voice slots (tone generators).
    pub slot_count: usize,
    /// Serial MIDI baud rate.
    pub baud_rate: u32,
    /// Maximum number of USB keyboard instances.
    pub usb_keyboards: usize,
    /// Thru source device name, empty = Thru disabled.
    pub thru_in: String,
    /// Thru destination device name.
    pub thru_out: String,
    /// Whether Program Change messages are applied per slot.
    pub rx_program_change: bool,
    /// Channel on which Program Change selects a whole performance
    /// (first responder wins). `Disabled` turns the feature off.
    pub performance_select_channel: ChannelAssignment,
    /// UDP MIDI port.
    pub udp_port: u16,
    /// Route outbound UDP frames through the network-session transport
    /// while no datagram peer is known.
    pub udp_fallback_to_session: bool,
    /// Log every inbound message.
    pub dump_enabled: bool,
    /// System-CC bank per role, 0 = role disabled (1..=7 select a bank).
    pub system_cc_volume: usize,
    pub system_cc_pan: usize,
    pub system_cc_detune: usize,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            slot_count: 8,
            baud_rate: 31250,
            usb_keyboards: 1,
            thru_in: String::new(),
            thru_out: String::new(),
            rx_program_change: true,
            performance_select_channel: ChannelAssignment::Disabled,
            udp_port: DEFAULT_UDP_PORT,
            udp_fallback_to_session: false,
            dump_enabled: false,
            system_cc_volume: 0,
            system_cc_pan: 0,
            system_cc_detune: 0,
        }
    }
}

impl MidiConfig {
    /// True when a Thru route is fully configured.
    #[inline]
    pub fn thru_enabled(&self) -> bool {
        !self.thru_in.is_empty() && !self.thru_out.is_empty()
    }
}
