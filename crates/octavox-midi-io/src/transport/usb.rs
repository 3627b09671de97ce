//! USB keyboard transport.
//!
//! Inbound data arrives as whole class-driver packets per cable. Outbound
//! SysEx is split into 4-byte USB-MIDI event packets and sent in bounded
//! chunks, one chunk per poll tick, so a long dump can never stall the
//! poll loop.

use crossbeam_channel::Receiver;

use octavox_midi::{status, Message};

use crate::reassembly::PacketReassembler;
use crate::router::Router;

/// Largest packetised byte count pushed to the port per poll tick.
const MAX_CHUNK: usize = 256;

/// Injected USB-MIDI class endpoint. `read_packet` returns the cable
/// number and byte count of one pending packet, or `None` when drained.
pub trait UsbMidiPort: Send {
    fn read_packet(&mut self, buf: &mut [u8]) -> Option<(u8, usize)>;
    /// Send pre-built 4-byte USB-MIDI event packets.
    fn write_packets(&mut self, packets: &[u8]) -> std::io::Result<()>;
    /// Send a short plain MIDI message.
    fn write_plain(&mut self, bytes: &[u8]) -> std::io::Result<()>;
}

pub struct UsbKeyboardTransport {
    name: String,
    port: Box<dyn UsbMidiPort>,
    parser: PacketReassembler,
    outbound: Receiver<Vec<u8>>,
    /// Packetised SysEx awaiting chunked transmission.
    pending: Vec<u8>,
    pending_off: usize,
}

impl UsbKeyboardTransport {
    pub fn new(name: String, port: Box<dyn UsbMidiPort>, outbound: Receiver<Vec<u8>>) -> Self {
        Self {
            name,
            port,
            parser: PacketReassembler::new(),
            outbound,
            pending: Vec::new(),
            pending_off: 0,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn poll(&mut self, router: &Router) {
        self.flush_outbound();

        let mut buf = [0u8; 64];
        while let Some((cable, n)) = self.port.read_packet(&mut buf) {
            let messages = self.parser.feed_packet(&buf[..n]);
            for msg in messages {
                if let Message::SysEx(sysex) = &msg {
                    // Fan-out: the controller-identification listener sees
                    // every completed SysEx on USB transports.
                    if let Some(listener) = router.sysex_listener() {
                        listener.on_sysex(cable, sysex.as_bytes());
                    }
                }
                router.dispatch(msg, &self.name);
            }
        }
    }

    fn flush_outbound(&mut self) {
        // A chunked SysEx in flight takes priority; one chunk per tick.
        if !self.pending.is_empty() {
            self.send_pending_chunk();
            return;
        }

        while let Ok(frame) = self.outbound.try_recv() {
            if frame.first() == Some(&status::SYSEX_BEGIN)
                && frame.last() == Some(&status::SYSEX_END)
            {
                self.pending = packetize_sysex(&frame, 0);
                self.pending_off = 0;
                self.send_pending_chunk();
                return;
            }
            if let Err(err) = self.port.write_plain(&frame) {
                tracing::error!(device = %self.name, %err, "USB write failed");
            }
        }
    }

    fn send_pending_chunk(&mut self) {
        let end = (self.pending_off + MAX_CHUNK).min(self.pending.len());
        let chunk = &self.pending[self.pending_off..end];
        if let Err(err) = self.port.write_packets(chunk) {
            tracing::error!(device = %self.name, %err, "USB packet write failed");
        }
        self.pending_off = end;
        if self.pending_off >= self.pending.len() {
            self.pending.clear();
            self.pending_off = 0;
        }
    }
}

/// Split a SysEx frame into 4-byte USB-MIDI event packets.
///
/// Header nibbles: cable number high, Code Index Number low (0x4 start or
/// continue with 3 bytes, 0x6 end with 2 bytes, 0x5 end with 1 byte).
pub fn packetize_sysex(frame: &[u8], cable: u8) -> Vec<u8> {
    let mut packets = Vec::with_capacity((frame.len() + 2) / 3 * 4);
    let mut idx = 0;
    while idx < frame.len() {
        let remaining = frame.len() - idx;
        let header = cable << 4;
        match remaining {
            1 => {
                packets.extend_from_slice(&[header | 0x5, frame[idx], 0, 0]);
                idx += 1;
            }
            2 => {
                packets.extend_from_slice(&[header | 0x6, frame[idx], frame[idx + 1], 0]);
                idx += 2;
            }
            _ => {
                packets.extend_from_slice(&[
                    header | 0x4,
                    frame[idx],
                    frame[idx + 1],
                    frame[idx + 2],
                ]);
                idx += 3;
            }
        }
    }
    packets
}
