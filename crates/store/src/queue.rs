//! Pending-message queues for the outbound and inbound drains.
//!
//! Both directions use plain FIFO. The inbound drain additionally
//! requeues a message whose causal dependencies are not yet satisfied:
//! it goes to the back and is retried on a later cycle, after other
//! messages (including the ones it depends on) have had their turn. Fair
//! FIFO selection is sufficient for causal delivery; ordering candidates
//! by timestamp dominance would only reduce retries.

use crate::message::WriteMessage;
use std::collections::VecDeque;

/// FIFO queue of writes awaiting processing.
#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: VecDeque<WriteMessage>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a newly produced or received message.
    pub fn push(&mut self, msg: WriteMessage) {
        self.entries.push_back(msg);
    }

    /// Take the oldest message, if any.
    pub fn pop(&mut self) -> Option<WriteMessage> {
        self.entries.pop_front()
    }

    /// Put a not-yet-deliverable message back at the tail for a later
    /// retry. Never drop such a message: its dependencies are in flight.
    pub fn requeue(&mut self, msg: WriteMessage) {
        self.entries.push_back(msg);
    }

    /// Return a message to the head of the queue.
    ///
    /// Used when a broadcast attempt fails: the message must go out
    /// before anything issued after it, to keep per-origin FIFO on the
    /// wire.
    pub fn push_front(&mut self, msg: WriteMessage) {
        self.entries.push_front(msg);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
