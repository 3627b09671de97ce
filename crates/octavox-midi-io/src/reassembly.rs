//! Per-transport reassembly state machines.
//!
//! [`StreamReassembler`] turns a raw byte stream (serial UART, network
//! session payloads, UDP datagram contents) into complete [`Message`]s,
//! honoring running status and interleaved System Realtime bytes.
//! [`PacketReassembler`] is the USB variant, consuming whole packets.
//!
//! Every malformed-framing condition resyncs locally: the frame in flight
//! is dropped and the next well-formed message on the same transport parses
//! normally. Nothing here returns an error to the caller.

use octavox_midi::{
    status, ChannelMessage, Message, RealTimeMessage, SysExMessage, SYSEX_MAX_LEN,
};
use smallvec::SmallVec;

/// Parser states of the byte-stream machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParserState {
    Idle,
    AwaitingParam1,
    AwaitingParam2,
    /// A message just completed; data-only bytes reuse the last status.
    RunningStatus,
    CollectingSysEx,
}

/// Byte-stream reassembler with running-status support.
#[derive(Debug)]
pub struct StreamReassembler {
    state: ParserState,
    status_byte: u8,
    param1: u8,
    sysex: Vec<u8>,
}

impl StreamReassembler {
    pub fn new() -> Self {
        Self {
            state: ParserState::Idle,
            status_byte: 0,
            param1: 0,
            sysex: Vec::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = ParserState::Idle;
        self.sysex.clear();
    }

    /// The transition function: one byte in, at most one message out.
    pub fn feed_byte(&mut self, byte: u8) -> Option<Message> {
        // System Realtime bytes may arrive in any state, including
        // mid-SysEx, without disturbing it.
        if let Some(rt) = RealTimeMessage::from_byte(byte) {
            return Some(Message::RealTime(rt));
        }

        if self.state == ParserState::CollectingSysEx {
            return self.collect_sysex(byte);
        }

        if byte & 0x80 != 0 {
            return self.begin_status(byte);
        }

        self.feed_data(byte)
    }

    /// Pump a slice, emitting every completed message in order.
    pub fn feed(&mut self, bytes: &[u8], mut emit: impl FnMut(Message)) {
        for &byte in bytes {
            if let Some(msg) = self.feed_byte(byte) {
                emit(msg);
            }
        }
    }

    /// A status byte outside SysEx collection. Arriving mid-parameter this
    /// aborts the partial message and reinterprets the byte as new status.
    fn begin_status(&mut self, byte: u8) -> Option<Message> {
        match byte {
            status::SYSEX_BEGIN => {
                self.sysex.clear();
                self.sysex.push(status::SYSEX_BEGIN);
                self.state = ParserState::CollectingSysEx;
                None
            }
            0xF1..=0xF7 => {
                // System Common with no local meaning; drop and resync.
                self.state = ParserState::Idle;
                None
            }
            _ => {
                self.status_byte = byte;
                self.state = ParserState::AwaitingParam1;
                None
            }
        }
    }

    fn feed_data(&mut self, byte: u8) -> Option<Message> {
        match self.state {
            // A stray data byte with no status to bind to.
            ParserState::Idle => None,
            ParserState::AwaitingParam1 | ParserState::RunningStatus => {
                if ChannelMessage::data_len(self.status_byte) == 1 {
                    self.state = ParserState::RunningStatus;
                    self.complete(byte, 0)
                } else {
                    self.param1 = byte;
                    self.state = ParserState::AwaitingParam2;
                    None
                }
            }
            ParserState::AwaitingParam2 => {
                self.state = ParserState::RunningStatus;
                self.complete(self.param1, byte)
            }
            ParserState::CollectingSysEx => unreachable!("handled in feed_byte"),
        }
    }

    fn complete(&mut self, d1: u8, d2: u8) -> Option<Message> {
        let channel = self.status_byte & 0x0F;
        ChannelMessage::decode(self.status_byte, d1, d2).map(|msg| Message::Channel { channel, msg })
    }

    fn collect_sysex(&mut self, byte: u8) -> Option<Message> {
        if byte == status::SYSEX_END {
            self.sysex.push(byte);
            self.state = ParserState::Idle;
            let data = std::mem::take(&mut self.sysex);
            return SysExMessage::new(data).ok().map(Message::SysEx);
        }
        if byte & 0x80 != 0 {
            // Unexpected status mid-SysEx: drop the buffer, reinterpret.
            self.sysex.clear();
            self.state = ParserState::Idle;
            return self.begin_status(byte);
        }
        if self.sysex.len() >= SYSEX_MAX_LEN - 1 {
            tracing::warn!(len = self.sysex.len(), "SysEx overflow, frame dropped");
            self.sysex.clear();
            self.state = ParserState::Idle;
            return None;
        }
        self.sysex.push(byte);
        None
    }
}

impl Default for StreamReassembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Packet-based reassembler for USB-MIDI transports.
///
/// Non-SysEx packets arrive as complete messages from the class driver and
/// are parsed directly; SysEx spans packets and is buffered with the same
/// discipline as the stream machine.
#[derive(Debug, Default)]
pub struct PacketReassembler {
    sysex: Vec<u8>,
}

impl PacketReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_collecting(&self) -> bool {
        !self.sysex.is_empty()
    }

    pub fn feed_packet(&mut self, packet: &[u8]) -> SmallVec<[Message; 2]> {
        let mut out = SmallVec::new();
        if packet.is_empty() {
            return out;
        }

        if self.sysex.is_empty() && packet[0] != status::SYSEX_BEGIN {
            self.parse_plain(packet, &mut out);
            return out;
        }

        for &byte in packet {
            if let Some(rt) = RealTimeMessage::from_byte(byte) {
                // Realtime may appear mid-SysEx; dispatch without
                // disturbing the buffer.
                out.push(Message::RealTime(rt));
                continue;
            }
            if byte == status::SYSEX_BEGIN && self.sysex.is_empty() {
                self.sysex.push(byte);
                continue;
            }
            if byte == status::SYSEX_END {
                self.sysex.push(byte);
                let data = std::mem::take(&mut self.sysex);
                if let Ok(sysex) = SysExMessage::new(data) {
                    out.push(Message::SysEx(sysex));
                }
                break;
            }
            if byte & 0x80 != 0 {
                // Another command arrived, something went wrong; reset.
                self.sysex.clear();
                break;
            }
            if self.sysex.len() >= SYSEX_MAX_LEN - 1 {
                tracing::warn!(len = self.sysex.len(), "USB SysEx overflow, frame dropped");
                self.sysex.clear();
                break;
            }
            self.sysex.push(byte);
        }
        out
    }

    /// Parse a packet of complete messages. There is no running status
    /// across USB packets; unparseable bytes are skipped until resync.
    fn parse_plain(&self, packet: &[u8], out: &mut SmallVec<[Message; 2]>) {
        let mut i = 0;
        while i < packet.len() {
            let byte = packet[i];
            if let Some(rt) = RealTimeMessage::from_byte(byte) {
                out.push(Message::RealTime(rt));
                i += 1;
                continue;
            }
            if byte & 0x80 == 0 || byte & 0xF0 == 0xF0 {
                i += 1;
                continue;
            }
            let arity = ChannelMessage::data_len(byte);
            if i + arity >= packet.len() {
                break;
            }
            let d1 = packet[i + 1];
            let d2 = if arity == 2 { packet[i + 2] } else { 0 };
            if d1 & 0x80 != 0 || d2 & 0x80 != 0 {
                i += 1;
                continue;
            }
            if let Some(msg) = ChannelMessage::decode(byte, d1, d2) {
                out.push(Message::Channel {
                    channel: byte & 0x0F,
                    msg,
                });
            }
            i += 1 + arity;
        }
    }
}
