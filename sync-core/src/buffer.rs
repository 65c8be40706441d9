//! Pending action queue for storesync.
//!
//! Actions accepted by the send filter wait here, in dispatch order, until
//! both sides are ready. The queue has no capacity limit and no shedding
//! policy: a handshake that never completes lets it grow without bound.
//! The high-water mark is kept so hosts can notice that happening.

use std::collections::VecDeque;

use storesync_types::Action;

/// FIFO of actions waiting to be sent.
#[derive(Debug, Default, Clone)]
pub struct PendingActions {
    queue: VecDeque<Action>,
    high_water_mark: usize,
}

impl PendingActions {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action, returning the new length.
    pub fn push(&mut self, action: Action) -> usize {
        self.queue.push_back(action);
        self.high_water_mark = self.high_water_mark.max(self.queue.len());
        self.queue.len()
    }

    /// Take every queued action, leaving the queue empty.
    pub fn drain_all(&mut self) -> Vec<Action> {
        self.queue.drain(..).collect()
    }

    /// Number of queued actions.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Largest length the queue has reached.
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    /// Iterate queued actions in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.queue.iter()
    }
}
