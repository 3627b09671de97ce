//! Network session transport (real-time MIDI participant).
//!
//! The session handshake itself lives behind the injected link; this
//! transport consumes its payload byte stream and, on a connect event,
//! sends a Device Identity Request so the peer can be identified.

use crossbeam_channel::Receiver;

use crate::reassembly::StreamReassembler;
use crate::router::Router;

/// Universal non-realtime Device Identity Request, broadcast device id.
pub const IDENTITY_REQUEST: [u8; 6] = [0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7];

pub enum SessionEvent {
    /// A participant completed the session handshake.
    Connected,
    /// Session payload bytes (plain MIDI stream).
    Data(Vec<u8>),
    /// The participant left or timed out.
    Disconnected,
}

/// Injected session endpoint. `poll_event` must not block.
pub trait SessionLink: Send {
    fn poll_event(&mut self) -> Option<SessionEvent>;
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()>;
}

pub struct NetworkSessionTransport {
    name: String,
    link: Box<dyn SessionLink>,
    parser: StreamReassembler,
    outbound: Receiver<Vec<u8>>,
}

impl NetworkSessionTransport {
    pub fn new(name: String, link: Box<dyn SessionLink>, outbound: Receiver<Vec<u8>>) -> Self {
        Self {
            name,
            link,
            parser: StreamReassembler::new(),
            outbound,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn poll(&mut self, router: &Router) {
        self.flush_outbound();

        while let Some(event) = self.link.poll_event() {
            match event {
                SessionEvent::Connected => {
                    tracing::info!(device = %self.name, "session participant connected");
                    if let Err(err) = self.link.write(&IDENTITY_REQUEST) {
                        tracing::error!(device = %self.name, %err, "identity request failed");
                    }
                }
                SessionEvent::Data(bytes) => {
                    let name = &self.name;
                    self.parser
                        .feed(&bytes, |msg| router.dispatch(msg, name));
                }
                SessionEvent::Disconnected => {
                    tracing::info!(device = %self.name, "session participant disconnected");
                    self.parser.reset();
                }
            }
        }
    }

    fn flush_outbound(&mut self) {
        while let Ok(frame) = self.outbound.try_recv() {
            if let Err(err) = self.link.write(&frame) {
                tracing::error!(device = %self.name, %err, "session write failed");
            }
        }
    }
}
