//! Bounded newest-first event buffers.

use super::event::{EventPatch, LiveEvent};
use crate::types::EventId;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Max events kept per channel.
pub const BUFFER_CAPACITY: usize = 200;

/// One channel's events, newest first.
///
/// Entries are shared immutably; a patch swaps in a new entry instead of
/// mutating the old one, so snapshots handed out earlier stay stable.
#[derive(Debug, Default)]
pub struct LiveBuffer {
    events: VecDeque<Arc<LiveEvent>>,
}

impl LiveBuffer {
    pub fn new() -> Self {
        Self {
            events: VecDeque::with_capacity(BUFFER_CAPACITY),
        }
    }

    /// Prepend an event. Returns the entry evicted to stay within capacity.
    pub fn push(&mut self, event: LiveEvent) -> Option<Arc<LiveEvent>> {
        self.events.push_front(Arc::new(event));
        if self.events.len() > BUFFER_CAPACITY {
            self.events.pop_back()
        } else {
            None
        }
    }

    /// Replace the event with `id`. No-op (returns false) if it's gone.
    pub fn patch(&mut self, id: EventId, patch: &EventPatch) -> bool {
        match self.events.iter_mut().find(|e| e.id == id) {
            Some(slot) => {
                let updated = patch.apply(slot);
                *slot = Arc::new(updated);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: EventId) -> Option<Arc<LiveEvent>> {
        self.events.iter().find(|e| e.id == id).cloned()
    }

    pub fn newest(&self) -> Option<Arc<LiveEvent>> {
        self.events.front().cloned()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events newest first.
    pub fn snapshot(&self) -> Vec<Arc<LiveEvent>> {
        self.events.iter().cloned().collect()
    }

    /// Drop every event. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.events.len();
        self.events.clear();
        removed
    }
}

/// Buffers for every channel, keyed by channel path.
///
/// Each channel's buffer sits behind its own lock so writers on different
/// channels never contend.
#[derive(Debug, Default)]
pub struct EventBuffers {
    buffers: RwLock<HashMap<String, Arc<Mutex<LiveBuffer>>>>,
}

impl EventBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    fn buffer(&self, channel: &str) -> Option<Arc<Mutex<LiveBuffer>>> {
        self.buffers.read().get(channel).cloned()
    }

    fn buffer_or_create(&self, channel: &str) -> Arc<Mutex<LiveBuffer>> {
        if let Some(buffer) = self.buffer(channel) {
            return buffer;
        }
        Arc::clone(
            self.buffers
                .write()
                .entry(channel.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(LiveBuffer::new()))),
        )
    }

    /// Prepend an event to a channel's buffer, evicting the oldest entry
    /// past capacity.
    pub fn push(&self, channel: &str, event: LiveEvent) -> Option<Arc<LiveEvent>> {
        let buffer = self.buffer_or_create(channel);
        let evicted = buffer.lock().push(event);
        if let Some(old) = &evicted {
            tracing::debug!(channel, event_id = %old.id, "evicted oldest buffered event");
        }
        evicted
    }

    /// Patch an event by identity. No-op if the channel or event is gone.
    pub fn patch(&self, channel: &str, id: EventId, patch: &EventPatch) -> bool {
        let patched = self
            .buffer(channel)
            .map(|buffer| buffer.lock().patch(id, patch))
            .unwrap_or(false);
        if !patched {
            tracing::debug!(channel, event_id = %id, "patch target no longer buffered");
        }
        patched
    }

    pub fn get(&self, channel: &str, id: EventId) -> Option<Arc<LiveEvent>> {
        self.buffer(channel).and_then(|buffer| buffer.lock().get(id))
    }

    /// A channel's events, newest first. Empty if nothing was ever buffered.
    pub fn snapshot(&self, channel: &str) -> Vec<Arc<LiveEvent>> {
        self.buffer(channel)
            .map(|buffer| buffer.lock().snapshot())
            .unwrap_or_default()
    }

    pub fn newest(&self, channel: &str) -> Option<Arc<LiveEvent>> {
        self.buffer(channel).and_then(|buffer| buffer.lock().newest())
    }

    pub fn len(&self, channel: &str) -> usize {
        self.buffer(channel)
            .map(|buffer| buffer.lock().len())
            .unwrap_or(0)
    }

    /// Total events across every channel.
    pub fn total_len(&self) -> usize {
        self.buffers.read().values().map(|b| b.lock().len()).sum()
    }

    /// Clear one channel. Returns how many events were removed.
    pub fn clear(&self, channel: &str) -> usize {
        self.buffer(channel)
            .map(|buffer| buffer.lock().clear())
            .unwrap_or(0)
    }

    /// Channels that currently hold at least one event.
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self
            .buffers
            .read()
            .iter()
            .filter(|(_, buffer)| !buffer.lock().is_empty())
            .map(|(channel, _)| channel.clone())
            .collect();
        channels.sort();
        channels
    }
}
