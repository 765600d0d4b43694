//! causal-common: shared types for the causal-kv project.
//!
//! Provides the `ProcessId` type identifying a member of the fixed
//! replica group, and the `MemError` taxonomy surfaced by the
//! shared-memory API.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ProcessId
// ---------------------------------------------------------------------------

/// Identifier of one process in the replica group.
///
/// Members carry dense integer ids `0..member_count`; the id doubles as
/// the index of that process's component in every vector clock.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessId(usize);

impl ProcessId {
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    /// The raw index, usable to address a vector-clock component.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl From<usize> for ProcessId {
    fn from(id: usize) -> Self {
        Self(id)
    }
}

impl fmt::Debug for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProcessId({})", self.0)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the shared-memory API.
///
/// All variants are caller contract violations. An undeliverable inbound
/// message is a normal retried state, not an error, and has no variant
/// here.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MemError {
    #[error("key {key} out of range (store size {size})")]
    InvalidKey { key: usize, size: usize },

    #[error("store not initialized")]
    NotInitialized,

    #[error("store already initialized")]
    AlreadyInitialized,

    #[error("store stopped")]
    Stopped,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
