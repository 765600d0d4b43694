//! Capability interface over shared-memory backends.
//!
//! Callers that only need `{init, read, write}` plus lifecycle control
//! program against this trait; the causal store is one concrete variant,
//! and other consistency models can slot in behind the same seam.

use crate::broadcast::Broadcast;
use crate::store::CausalStore;
use causal_common::{MemError, ProcessId};

/// A process-local view of replicated shared memory.
#[async_trait::async_trait]
pub trait SharedMemory: Send + Sync {
    /// Allocate the local memory and clock. Exactly once per instance.
    async fn init(
        &self,
        process_id: ProcessId,
        store_size: usize,
        member_count: usize,
    ) -> Result<(), MemError>;

    /// Current local value for `key`.
    async fn read(&self, key: usize) -> Result<Vec<u8>, MemError>;

    /// Write `value` to `key`, visible locally at once and replicated
    /// asynchronously.
    async fn write(&self, key: usize, value: Vec<u8>) -> Result<(), MemError>;

    /// Terminate this instance. Idempotent.
    async fn stop(&self);

    async fn is_stopped(&self) -> bool;
}

#[async_trait::async_trait]
impl<B: Broadcast> SharedMemory for CausalStore<B> {
    async fn init(
        &self,
        process_id: ProcessId,
        store_size: usize,
        member_count: usize,
    ) -> Result<(), MemError> {
        CausalStore::init(self, process_id, store_size, member_count).await
    }

    async fn read(&self, key: usize) -> Result<Vec<u8>, MemError> {
        CausalStore::read(self, key).await
    }

    async fn write(&self, key: usize, value: Vec<u8>) -> Result<(), MemError> {
        CausalStore::write(self, key, value).await
    }

    async fn stop(&self) {
        CausalStore::stop(self).await;
    }

    async fn is_stopped(&self) -> bool {
        CausalStore::is_stopped(self).await
    }
}
