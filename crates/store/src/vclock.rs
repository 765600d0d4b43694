//! Vector clock primitives for causal ordering.
//!
//! Clocks here are fixed-width: one `u64` component per member of the
//! replica group, indexed by `ProcessId`. Component `i` counts the writes
//! issued by process `i` that the owning store has applied, including its
//! own. Each clock is owned exclusively by one store and mutated only
//! under that store's lock.

use serde::{Deserialize, Serialize};

/// A fixed-width vector clock over a group of `len()` processes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorClock {
    counters: Vec<u64>,
}

impl VectorClock {
    /// All-zero clock for a group of `width` processes.
    pub fn zero(width: usize) -> Self {
        Self {
            counters: vec![0; width],
        }
    }

    /// Create from raw counters.
    pub fn from_counters(counters: Vec<u64>) -> Self {
        Self { counters }
    }

    /// Number of processes this clock covers.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// The counter for process `i`.
    ///
    /// Panics on out-of-range `i`; clock width is fixed at group size, so
    /// an out-of-range index is a programming error.
    pub fn get(&self, i: usize) -> u64 {
        self.counters[i]
    }

    /// Increment the counter for process `i` in place, returning the new
    /// count.
    pub fn increment(&mut self, i: usize) -> u64 {
        self.counters[i] += 1;
        self.counters[i]
    }

    /// Overwrite the counter for process `i`.
    ///
    /// Used on causal delivery: the exact-successor check guarantees the
    /// new value is exactly one above the old.
    pub fn set(&mut self, i: usize, value: u64) {
        debug_assert!(value >= self.counters[i], "clock component must not regress");
        self.counters[i] = value;
    }

    /// Dominance: `self[k] >= other[k]` for every component.
    ///
    /// This is the "has seen at least as much" relation used by the
    /// causal-delivery check.
    pub fn descends(&self, other: &Self) -> bool {
        debug_assert_eq!(self.len(), other.len(), "clock widths must match");
        self.counters
            .iter()
            .zip(&other.counters)
            .all(|(s, o)| s >= o)
    }

    /// Full comparison of two clocks of equal width.
    pub fn compare(&self, other: &Self) -> ClockOrder {
        debug_assert_eq!(self.len(), other.len(), "clock widths must match");

        let mut self_gte = true;
        let mut other_gte = true;

        for (s, o) in self.counters.iter().zip(&other.counters) {
            if s < o {
                self_gte = false;
            }
            if o < s {
                other_gte = false;
            }
        }

        match (self_gte, other_gte) {
            (true, true) => ClockOrder::Equal,
            (true, false) => ClockOrder::Dominates,
            (false, true) => ClockOrder::DominatedBy,
            (false, false) => ClockOrder::Concurrent,
        }
    }

    /// The raw counters.
    pub fn counters(&self) -> &[u64] {
        &self.counters
    }
}

/// Outcome of comparing two vector clocks.
#[derive(Debug, PartialEq, Eq)]
pub enum ClockOrder {
    Equal,
    /// Left is strictly ahead on at least one component, behind on none.
    Dominates,
    /// Right is strictly ahead on at least one component, behind on none.
    DominatedBy,
    /// Each is ahead of the other somewhere — causally unrelated.
    Concurrent,
}
