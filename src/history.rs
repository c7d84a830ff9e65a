//! Bounded history of broadcast envelopes
//!
//! Replayed to every new joiner, oldest first.

use std::collections::VecDeque;

use crate::frame::Frame;

/// Number of envelopes a room keeps for replay
pub const HISTORY_CAPACITY: usize = 100;

/// FIFO ring of the most recent envelopes
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<Frame>,
    capacity: usize,
}

impl History {
    /// Create an empty history holding at most `capacity` envelopes
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Seed a history from previously persisted envelopes
    ///
    /// Only the last `capacity` entries survive.
    pub fn from_frames(capacity: usize, frames: impl IntoIterator<Item = Frame>) -> Self {
        let mut history = Self::new(capacity);
        for frame in frames {
            history.push(frame);
        }
        history
    }

    /// Append an envelope, evicting the oldest when over capacity
    ///
    /// Returns the evicted envelope, if any.
    pub fn push(&mut self, frame: Frame) -> Option<Frame> {
        self.entries.push_back(frame);
        if self.entries.len() > self.capacity {
            self.entries.pop_front()
        } else {
            None
        }
    }

    /// Iterate in broadcast order, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.entries.iter()
    }

    /// Copy of the retained envelopes, oldest first
    pub fn snapshot(&self) -> Vec<Frame> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}
