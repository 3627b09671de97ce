//! MIDI transports.
//!
//! The closed variant set {Serial, USB-Keyboard(n), Network-Participant,
//! UDP-Broadcast} as an enum over concrete transport structs. Hardware
//! drivers are out of scope: each transport is constructed over an injected
//! link trait and stays pollable and non-blocking.
//!
//! `poll()` first flushes the transport's outbound queue to the link, then
//! pumps inbound data through the transport's reassembler straight into the
//! router, so messages from one transport are always processed in arrival
//! order.

mod serial;
mod session;
mod udp;
mod usb;

pub use serial::{SerialLink, SerialTransport};
pub use session::{NetworkSessionTransport, SessionEvent, SessionLink, IDENTITY_REQUEST};
pub use udp::{DatagramLink, UdpTransport};
pub use usb::{UsbKeyboardTransport, UsbMidiPort};

use crate::router::Router;

/// Well-known transport names used by the registry and Thru configuration.
pub const SERIAL_NAME: &str = "serial";
pub const SESSION_NAME: &str = "session";
pub const UDP_NAME: &str = "udp";

/// Name of the n-th USB keyboard instance ("umidi1", "umidi2", ...).
pub fn usb_keyboard_name(instance: usize) -> String {
    format!("umidi{}", instance + 1)
}

/// One physical or logical MIDI connection.
pub enum Transport {
    Serial(SerialTransport),
    UsbKeyboard(UsbKeyboardTransport),
    NetworkSession(NetworkSessionTransport),
    UdpBroadcast(UdpTransport),
}

impl Transport {
    pub fn name(&self) -> &str {
        match self {
            Transport::Serial(t) => t.name(),
            Transport::UsbKeyboard(t) => t.name(),
            Transport::NetworkSession(t) => t.name(),
            Transport::UdpBroadcast(t) => t.name(),
        }
    }

    /// One cooperative tick: flush outbound, then pump inbound.
    pub fn poll(&mut self, router: &Router) {
        match self {
            Transport::Serial(t) => t.poll(router),
            Transport::UsbKeyboard(t) => t.poll(router),
            Transport::NetworkSession(t) => t.poll(router),
            Transport::UdpBroadcast(t) => t.poll(router),
        }
    }
}
