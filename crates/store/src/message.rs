//! The replicated write message and its causal-delivery check.

use crate::vclock::VectorClock;
use causal_common::ProcessId;
use serde::{Deserialize, Serialize};

/// A single write, as broadcast to every replica.
///
/// Immutable once constructed. `timestamp` is a snapshot of the origin's
/// vector clock taken right after the origin incremented its own
/// component for this write. Serialization for the wire is the
/// transport's concern; the derives only make that possible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteMessage {
    pub origin: ProcessId,
    pub key: usize,
    pub value: Vec<u8>,
    pub timestamp: VectorClock,
}

impl WriteMessage {
    pub fn new(origin: ProcessId, key: usize, value: Vec<u8>, timestamp: VectorClock) -> Self {
        Self {
            origin,
            key,
            value,
            timestamp,
        }
    }

    /// The causal-delivery predicate: may this message be applied at a
    /// replica whose clock is `local`?
    ///
    /// Two conditions, with `j = origin`:
    /// 1. exact successor: `timestamp[j] == local[j] + 1` — this is the
    ///    next unseen write from its origin (per-origin FIFO);
    /// 2. dominance: `local[k] >= timestamp[k]` for every other `k` —
    ///    every write the origin had seen when it issued this one has
    ///    already been applied here.
    ///
    /// A message with `timestamp[j] <= local[j]` is a replay of an
    /// already-applied write (at-least-once transports may duplicate);
    /// it is [`Deliverability::Stale`] and safe to drop — re-application
    /// is rejected rather than retried.
    pub fn deliverability_at(&self, local: &VectorClock) -> Deliverability {
        debug_assert_eq!(self.timestamp.len(), local.len(), "clock widths must match");

        let j = self.origin.index();
        let seen_from_origin = local.get(j);
        if self.timestamp.get(j) <= seen_from_origin {
            return Deliverability::Stale;
        }
        let next = self.timestamp.get(j) == seen_from_origin + 1;
        let deps = (0..local.len()).all(|k| k == j || local.get(k) >= self.timestamp.get(k));
        if next && deps {
            Deliverability::Deliverable
        } else {
            Deliverability::Pending
        }
    }
}

/// Where a received message stands relative to a replica's clock.
#[derive(Debug, PartialEq, Eq)]
pub enum Deliverability {
    /// Causally safe to apply now.
    Deliverable,
    /// Dependencies not yet applied locally; retry later.
    Pending,
    /// Already applied (duplicate delivery); drop it.
    Stale,
}
