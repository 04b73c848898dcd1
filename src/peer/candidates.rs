//! Buffer for candidates that arrive before they can legally be applied

use crate::types::IceCandidate;
use std::collections::VecDeque;

/// FIFO buffer for remote candidates received before a remote description
/// exists to receive them
///
/// No deduplication: the relay is not expected to repeat candidates, and
/// duplicates are passed through unchanged.
#[derive(Debug, Default)]
pub struct CandidateQueue {
    queue: VecDeque<IceCandidate>,
}

impl CandidateQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a candidate to the back
    pub fn enqueue(&mut self, candidate: IceCandidate) {
        self.queue.push_back(candidate);
    }

    /// Take all buffered candidates in arrival order, leaving the queue
    /// empty
    ///
    /// A no-op on an empty queue. The session drains exactly once, right
    /// after the remote description is accepted.
    pub fn drain(&mut self) -> Vec<IceCandidate> {
        self.queue.drain(..).collect()
    }

    /// Number of buffered candidates
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
