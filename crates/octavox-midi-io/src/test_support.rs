//! Shared fixtures for the in-crate test suites.

use std::sync::Arc;

use parking_lot::Mutex;

use octavox_midi::ChannelAssignment;

use crate::collab::{PerformanceStore, VoiceEngine};
use crate::config::MidiConfig;
use crate::registry::DeviceRegistry;
use crate::router::Router;
use crate::slots::VoiceSlots;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedNotes {
    Down(u8, u8, usize),
    Up(u8, usize),
}

#[derive(Default)]
pub struct NoteRecorder {
    events: Mutex<Vec<RecordedNotes>>,
}

impl NoteRecorder {
    pub fn take(&self) -> Vec<RecordedNotes> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl VoiceEngine for NoteRecorder {
    fn key_down(&self, key: u8, velocity: u8, slot: usize) {
        self.events
            .lock()
            .push(RecordedNotes::Down(key, velocity, slot));
    }

    fn key_up(&self, key: u8, slot: usize) {
        self.events.lock().push(RecordedNotes::Up(key, slot));
    }
}

pub struct NullEngine;

impl VoiceEngine for NullEngine {}

pub struct NullStore;

impl PerformanceStore for NullStore {
    fn global_parameter(&self, _param: u16) -> Option<u16> {
        None
    }
    fn set_global_parameter(&self, _param: u16, _value: u16) -> bool {
        false
    }
    fn slot_parameter(&self, _param: u16, _slot: usize) -> Option<u16> {
        None
    }
    fn set_slot_parameter(&self, _param: u16, _value: u16, _slot: usize) -> bool {
        false
    }
}

/// A router with slot 0 in Omni and a note-recording engine.
pub fn test_router() -> (Router, Arc<NoteRecorder>) {
    let engine = Arc::new(NoteRecorder::default());
    let slots = Arc::new(VoiceSlots::new(8));
    slots.set_assignment(0, ChannelAssignment::Omni);
    let router = Router::new(
        MidiConfig::default(),
        slots,
        Arc::new(DeviceRegistry::new()),
        engine.clone(),
        Arc::new(NullStore),
        None,
        None,
    );
    (router, engine)
}
