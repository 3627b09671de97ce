//! The voice-slot table.
//!
//! Fixed-size channel map shared between the router (writer) and
//! audio-rendering contexts on other cores (readers). Snapshots are
//! published through `ArcSwap`: readers are lock-free and may observe up to
//! one processing block of staleness, which is the documented contract.

use arc_swap::ArcSwap;
use octavox_midi::ChannelAssignment;
use std::sync::Arc;

/// One voice slot's routing state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoiceSlot {
    pub assignment: ChannelAssignment,
    /// Assignment remembered on the transition into Omni, restored by
    /// Omni-Off. Never overwritten while already Omni.
    previous: ChannelAssignment,
}

/// Fixed-size table of voice slots, created once at system start.
pub struct VoiceSlots {
    inner: Arc<ArcSwap<Vec<VoiceSlot>>>,
}

/// Read-only handle for audio-rendering contexts.
#[derive(Clone)]
pub struct VoiceSlotsReader {
    inner: Arc<ArcSwap<Vec<VoiceSlot>>>,
}

impl VoiceSlots {
    pub fn new(count: usize) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(vec![VoiceSlot::default(); count])),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn assignment(&self, slot: usize) -> ChannelAssignment {
        self.inner
            .load()
            .get(slot)
            .map(|s| s.assignment)
            .unwrap_or(ChannelAssignment::Disabled)
    }

    /// Current table snapshot (cheap clone of an `Arc`).
    pub fn snapshot(&self) -> Arc<Vec<VoiceSlot>> {
        self.inner.load_full()
    }

    pub fn reader(&self) -> VoiceSlotsReader {
        VoiceSlotsReader {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Assign a slot. Entering Omni records the outgoing assignment so that
    /// Omni-Off can restore it; while already Omni the memory is kept.
    pub fn set_assignment(&self, slot: usize, assignment: ChannelAssignment) {
        self.update(slot, |entry| {
            if assignment == ChannelAssignment::Omni
                && entry.assignment != ChannelAssignment::Omni
            {
                entry.previous = entry.assignment;
            }
            entry.assignment = assignment;
        });
    }

    /// Leave Omni, restoring the remembered assignment.
    pub fn omni_off(&self, slot: usize) {
        self.update(slot, |entry| {
            if entry.assignment == ChannelAssignment::Omni {
                entry.assignment = entry.previous;
            }
        });
    }

    fn update(&self, slot: usize, f: impl FnOnce(&mut VoiceSlot)) {
        let current = self.inner.load_full();
        if slot >= current.len() {
            tracing::warn!(slot, "voice slot index out of range");
            return;
        }
        let mut next = (*current).clone();
        f(&mut next[slot]);
        self.inner.store(Arc::new(next));
    }
}

impl VoiceSlotsReader {
    /// Lock-free; may lag the router by one published snapshot.
    pub fn assignment(&self, slot: usize) -> ChannelAssignment {
        self.inner
            .load()
            .get(slot)
            .map(|s| s.assignment)
            .unwrap_or(ChannelAssignment::Disabled)
    }

    pub fn snapshot(&self) -> Arc<Vec<VoiceSlot>> {
        self.inner.load_full()
    }
}
