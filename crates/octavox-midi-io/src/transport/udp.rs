//! UDP broadcast transport.
//!
//! Datagram payloads are plain MIDI byte streams and run through the same
//! stream reassembler as serial data. Until a peer address is learned from
//! inbound traffic, outbound frames can optionally fall back to the
//! network-session transport's queue.

use crossbeam_channel::Receiver;

use crate::reassembly::StreamReassembler;
use crate::registry::OutboundSender;
use crate::router::Router;

/// Injected datagram socket. `recv` must not block.
pub trait DatagramLink: Send {
    fn recv(&mut self, buf: &mut [u8]) -> Option<usize>;
    fn send(&mut self, bytes: &[u8]) -> std::io::Result<()>;
    /// True once a peer address is known to send to.
    fn peer_known(&self) -> bool {
        true
    }
}

pub struct UdpTransport {
    name: String,
    link: Box<dyn DatagramLink>,
    parser: StreamReassembler,
    outbound: Receiver<Vec<u8>>,
    fallback: Option<OutboundSender>,
}

impl UdpTransport {
    pub fn new(
        name: String,
        link: Box<dyn DatagramLink>,
        outbound: Receiver<Vec<u8>>,
        fallback: Option<OutboundSender>,
    ) -> Self {
        Self {
            name,
            link,
            parser: StreamReassembler::new(),
            outbound,
            fallback,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn poll(&mut self, router: &Router) {
        self.flush_outbound();

        let mut buf = [0u8; 1024];
        while let Some(n) = self.link.recv(&mut buf) {
            let name = &self.name;
            self.parser
                .feed(&buf[..n], |msg| router.dispatch(msg, name));
        }
    }

    fn flush_outbound(&mut self) {
        while let Ok(frame) = self.outbound.try_recv() {
            if !self.link.peer_known() {
                if let Some(fallback) = &self.fallback {
                    fallback.send(frame);
                    continue;
                }
            }
            if let Err(err) = self.link.send(&frame) {
                tracing::error!(device = %self.name, %err, "UDP send failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_router, RecordedNotes};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct FakeSocket {
        inbound: VecDeque<Vec<u8>>,
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
        peer: bool,
    }

    impl DatagramLink for FakeSocket {
        fn recv(&mut self, buf: &mut [u8]) -> Option<usize> {
            let datagram = self.inbound.pop_front()?;
            let n = datagram.len().min(buf.len());
            buf[..n].copy_from_slice(&datagram[..n]);
            Some(n)
        }

        fn send(&mut self, bytes: &[u8]) -> std::io::Result<()> {
            self.sent.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }

        fn peer_known(&self) -> bool {
            self.peer
        }
    }

    #[test]
    fn test_datagram_with_multiple_messages() {
        let (router, notes) = test_router();
        let rx = router.registry().register("udp").unwrap();
        let socket = FakeSocket {
            inbound: VecDeque::from(vec![vec![0x91, 60, 100, 0x81, 60, 0]]),
            sent: Arc::new(Mutex::new(Vec::new())),
            peer: true,
        };
        let mut transport = UdpTransport::new("udp".into(), Box::new(socket), rx, None);

        transport.poll(&router);
        assert_eq!(
            notes.take(),
            vec![RecordedNotes::Down(60, 100, 0), RecordedNotes::Up(60, 0)]
        );
    }

    #[test]
    fn test_outbound_goes_to_socket_when_peer_known() {
        let (router, _notes) = test_router();
        let rx = router.registry().register("udp").unwrap();
        let socket = FakeSocket {
            inbound: VecDeque::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
            peer: true,
        };
        let sent = socket.sent.clone();
        let mut transport = UdpTransport::new("udp".into(), Box::new(socket), rx, None);

        router.registry().send_to("udp", &[0xF8]);
        transport.poll(&router);
        assert_eq!(sent.lock().unwrap().as_slice(), &[vec![0xF8]]);
    }

    #[test]
    fn test_fallback_to_session_without_peer() {
        let (router, _notes) = test_router();
        let rx_udp = router.registry().register("udp").unwrap();
        let rx_session = router.registry().register("session").unwrap();
        let fallback = router.registry().sender("session");

        let socket = FakeSocket {
            inbound: VecDeque::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
            peer: false,
        };
        let sent = socket.sent.clone();
        let mut transport = UdpTransport::new("udp".into(), Box::new(socket), rx_udp, fallback);

        router.registry().send_to("udp", &[0x91, 0x3C, 0x40]);
        transport.poll(&router);
        assert!(sent.lock().unwrap().is_empty());
        assert_eq!(rx_session.try_recv().unwrap(), vec![0x91, 0x3C, 0x40]);
    }
}
