//! Serial UART transport.

use crossbeam_channel::Receiver;

use crate::reassembly::StreamReassembler;
use crate::router::Router;

/// Injected UART endpoint. `read` returns 0 when no data is pending;
/// neither call may block.
pub trait SerialLink: Send {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()>;
}

pub struct SerialTransport {
    name: String,
    link: Box<dyn SerialLink>,
    parser: StreamReassembler,
    outbound: Receiver<Vec<u8>>,
}

impl SerialTransport {
    pub fn new(name: String, link: Box<dyn SerialLink>, outbound: Receiver<Vec<u8>>) -> Self {
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

        let mut buf = [0u8; 128];
        match self.link.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                let name = &self.name;
                self.parser
                    .feed(&buf[..n], |msg| router.dispatch(msg, name));
            }
            Err(err) => {
                tracing::error!(device = %self.name, %err, "serial read failed");
            }
        }
    }

    fn flush_outbound(&mut self) {
        while let Ok(frame) = self.outbound.try_recv() {
            if let Err(err) = self.link.write(&frame) {
                tracing::error!(device = %self.name, %err, "serial write failed");
            }
        }
    }
}
