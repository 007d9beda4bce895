//! Pending events and the depth-tagged propagation queue.
//!
//! Queue entries live only here: each round consumes a snapshot of the queue
//! and entries that have aged out relative to the current propagation depth
//! are pruned once the round completes.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::timestamp::FeedTimestamp;

/// One pending event awaiting delivery to agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEvent {
    /// Event description shown to agents.
    pub content: String,
    /// When the underlying action happened.
    pub time: FeedTimestamp,
    /// Id of the message (or seed) the event refers to.
    pub id: String,
    /// Propagation depth tag; entries at depth 0 are mandatory.
    pub depth: u32,
}

impl PendingEvent {
    pub fn new(
        content: impl Into<String>,
        time: FeedTimestamp,
        id: impl Into<String>,
        depth: u32,
    ) -> Self {
        Self {
            content: content.into(),
            time,
            id: id.into(),
            depth,
        }
    }
}

/// Insertion-ordered global queue of pending events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventQueue {
    entries: VecDeque<PendingEvent>,
}

impl EventQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends an event at the back of the queue.
    pub fn push_back(&mut self, event: PendingEvent) {
        self.entries.push_back(event);
    }

    /// Inserts an event at the front of the queue (operator injection).
    pub fn push_front(&mut self, event: PendingEvent) {
        self.entries.push_front(event);
    }

    /// Clones the current entries as a round snapshot.
    ///
    /// Round input is frozen at round start: entries enqueued while the
    /// round runs are not visible to it.
    pub fn snapshot(&self) -> Vec<PendingEvent> {
        self.entries.iter().cloned().collect()
    }

    /// Retains only entries with `depth > below`, i.e. prunes entries whose
    /// depth has aged out relative to the just-completed round.
    ///
    /// Returns the number of pruned entries.
    pub fn prune_at_or_below(&mut self, below: u32) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.depth > below);
        before - self.entries.len()
    }

    /// Iterates pending entries in queue order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingEvent> {
        self.entries.iter()
    }
}
