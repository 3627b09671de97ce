//! Device registry.
//!
//! Name → outbound-queue table, populated exactly once per transport at
//! construction and never shrunk. The router uses it for Thru mirroring
//! (named lookup) and for broadcast replies (full iteration). Owned by the
//! system root and shared by `Arc`, not process-global.

use crate::error::{Error, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use dashmap::DashMap;

/// Default depth of a transport's outbound FIFO.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Cloneable handle onto one transport's outbound queue.
#[derive(Clone)]
pub struct OutboundSender {
    name: String,
    tx: Sender<Vec<u8>>,
}

impl OutboundSender {
    /// Enqueue a frame without blocking. A full queue drops the frame; the
    /// transport flushes on its next poll tick, bounding latency to one
    /// poll interval.
    pub fn send(&self, frame: Vec<u8>) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(device = %self.name, "outbound queue full, frame dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!(device = %self.name, "outbound queue disconnected");
                false
            }
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

pub struct DeviceRegistry {
    devices: DashMap<String, OutboundSender>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            devices: DashMap::new(),
        }
    }

    /// Register a transport name, creating its outbound queue. Returns the
    /// receiving end, owned by the transport. Names are unique by
    /// configuration; a duplicate is a construction error.
    pub fn register(&self, name: &str) -> Result<Receiver<Vec<u8>>> {
        self.register_with_depth(name, DEFAULT_QUEUE_DEPTH)
    }

    pub fn register_with_depth(&self, name: &str, depth: usize) -> Result<Receiver<Vec<u8>>> {
        if self.devices.contains_key(name) {
            return Err(Error::DuplicateDevice(name.to_string()));
        }
        let (tx, rx) = bounded(depth);
        self.devices.insert(
            name.to_string(),
            OutboundSender {
                name: name.to_string(),
                tx,
            },
        );
        tracing::debug!(device = name, "registered MIDI device");
        Ok(rx)
    }

    /// O(1) lookup for point-to-point sends (Thru target, replies).
    pub fn sender(&self, name: &str) -> Option<OutboundSender> {
        self.devices.get(name).map(|entry| entry.value().clone())
    }

    /// Enqueue a frame for one named device.
    pub fn send_to(&self, name: &str, frame: &[u8]) -> bool {
        match self.sender(name) {
            Some(sender) => sender.send(frame.to_vec()),
            None => false,
        }
    }

    /// Enqueue a frame for every registered device (voice dumps).
    pub fn broadcast(&self, frame: &[u8]) {
        for entry in self.devices.iter() {
            entry.value().send(frame.to_vec());
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.devices.iter().map(|e| e.key().clone()).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
