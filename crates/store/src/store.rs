//! The causal store: local memory, vector clock, pending queues, and the
//! causal-delivery rule, all behind a single lock.
//!
//! One store instance per process. Application code calls `read`/`write`;
//! the transport pushes received writes through `deliver_remote`; the two
//! drains in [`crate::tasks`] move messages out to the injected
//! [`Broadcast`] collaborator and apply inbound messages once causally
//! safe. Every access to the clock, the memory, or either queue happens
//! under the store's lock, held only for the single pop/push or
//! compare/update at hand — never across the broadcast call.

use crate::broadcast::{Broadcast, Inbound};
use crate::message::{Deliverability, WriteMessage};
use crate::queue::PendingQueue;
use crate::vclock::VectorClock;
use causal_common::{MemError, ProcessId};
use causal_metrics::metrics;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Result of one inbound drain cycle.
#[derive(Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A message passed the causal-delivery check and was applied.
    Applied,
    /// The candidate's dependencies are not yet satisfied; it went back
    /// to the tail of the inbound queue.
    Requeued,
    /// The candidate was a replay of an already-applied write and was
    /// dropped.
    Discarded,
    /// Nothing to do (empty queue, or store not running).
    Idle,
}

/// Mutable state of a running store.
struct State {
    id: ProcessId,
    mem: Vec<Vec<u8>>,
    clock: VectorClock,
    outbound: PendingQueue,
    inbound: PendingQueue,
}

/// Lifecycle of a store: created empty, initialized exactly once, and
/// terminated by `stop`. No further mutation after stop.
enum Lifecycle {
    Unborn,
    Running(State),
    Stopped,
}

/// Causal-consistent replicated shared memory, one instance per process.
pub struct CausalStore<B: Broadcast> {
    transport: Arc<B>,
    inner: Mutex<Lifecycle>,
}

impl<B: Broadcast> std::fmt::Debug for CausalStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CausalStore").finish_non_exhaustive()
    }
}

impl<B: Broadcast> CausalStore<B> {
    /// Construct the shell. No memory is allocated until [`init`].
    ///
    /// [`init`]: CausalStore::init
    pub fn new(transport: Arc<B>) -> Self {
        Self {
            transport,
            inner: Mutex::new(Lifecycle::Unborn),
        }
    }

    /// Allocate the zero-filled local memory of `store_size` slots, the
    /// zero clock of width `member_count`, and empty queues.
    ///
    /// Exactly once per store; a second call returns
    /// `AlreadyInitialized`. Parameter sanity (`process_id <
    /// member_count`, non-zero sizes) is the caller's contract, enforced
    /// upstream by config validation.
    pub async fn init(
        &self,
        process_id: ProcessId,
        store_size: usize,
        member_count: usize,
    ) -> Result<(), MemError> {
        debug_assert!(store_size > 0, "store_size must be > 0");
        debug_assert!(member_count > 0, "member_count must be > 0");
        debug_assert!(
            process_id.index() < member_count,
            "process_id must be < member_count"
        );

        let mut inner = self.inner.lock().await;
        match &*inner {
            Lifecycle::Unborn => {
                *inner = Lifecycle::Running(State {
                    id: process_id,
                    mem: vec![Vec::new(); store_size],
                    clock: VectorClock::zero(member_count),
                    outbound: PendingQueue::new(),
                    inbound: PendingQueue::new(),
                });
                tracing::info!(
                    "store {} initialized ({} slots, {} members)",
                    process_id,
                    store_size,
                    member_count
                );
                Ok(())
            }
            Lifecycle::Running(_) | Lifecycle::Stopped => Err(MemError::AlreadyInitialized),
        }
    }

    /// Terminate the store. Idempotent; both drains observe the stop at
    /// the top of their next cycle and exit.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        if let Lifecycle::Running(state) = &*inner {
            tracing::info!("store {} stopping", state.id);
        }
        *inner = Lifecycle::Stopped;
    }

    pub async fn is_stopped(&self) -> bool {
        matches!(*self.inner.lock().await, Lifecycle::Stopped)
    }

    /// Local read: the most recently applied value for `key` in this
    /// process's view, local or remote. No causal constraint.
    pub async fn read(&self, key: usize) -> Result<Vec<u8>, MemError> {
        let inner = self.inner.lock().await;
        let state = running(&inner)?;
        let value = state
            .mem
            .get(key)
            .cloned()
            .ok_or(MemError::InvalidKey {
                key,
                size: state.mem.len(),
            })?;
        metrics().reads_local.inc();
        Ok(value)
    }

    /// Local write: advance this process's clock component, apply
    /// immediately (a process always sees its own writes), and enqueue
    /// the timestamped message for broadcast. Never blocks on I/O.
    pub async fn write(&self, key: usize, value: Vec<u8>) -> Result<(), MemError> {
        let mut inner = self.inner.lock().await;
        let state = running_mut(&mut inner)?;
        if key >= state.mem.len() {
            return Err(MemError::InvalidKey {
                key,
                size: state.mem.len(),
            });
        }

        state.clock.increment(state.id.index());
        state.mem[key] = value.clone();
        // Snapshot taken after the increment: the message carries exactly
        // what this process had seen when it issued the write.
        let msg = WriteMessage::new(state.id, key, value, state.clock.clone());
        state.outbound.push(msg);

        metrics().writes_local.inc();
        metrics().outbound_depth.set(state.outbound.len() as i64);
        tracing::trace!("store {} wrote key {}", state.id, key);
        Ok(())
    }

    /// Inbound contract for the transport: enqueue a received write. No
    /// causal check at enqueue time.
    pub async fn deliver_remote(&self, msg: WriteMessage) -> Result<(), MemError> {
        let mut inner = self.inner.lock().await;
        let state = running_mut(&mut inner)?;
        debug_assert_eq!(
            msg.timestamp.len(),
            state.clock.len(),
            "message clock width must match group size"
        );
        state.inbound.push(msg);
        metrics().inbound_depth.set(state.inbound.len() as i64);
        Ok(())
    }

    /// Snapshot of this process's vector clock.
    pub async fn clock(&self) -> Result<VectorClock, MemError> {
        let inner = self.inner.lock().await;
        Ok(running(&inner)?.clock.clone())
    }

    /// Copy of the whole local memory, for observers and convergence
    /// checks.
    pub async fn snapshot(&self) -> Result<Vec<Vec<u8>>, MemError> {
        let inner = self.inner.lock().await;
        Ok(running(&inner)?.mem.clone())
    }

    // -----------------------------------------------------------------------
    // Drain internals (used by `tasks`)
    // -----------------------------------------------------------------------

    pub(crate) fn transport(&self) -> &B {
        &self.transport
    }

    /// Dequeue the oldest outbound message, if running and non-empty.
    pub(crate) async fn take_outbound(&self) -> Option<WriteMessage> {
        let mut inner = self.inner.lock().await;
        let Lifecycle::Running(state) = &mut *inner else {
            return None;
        };
        let msg = state.outbound.pop();
        metrics().outbound_depth.set(state.outbound.len() as i64);
        msg
    }

    /// Return a message whose broadcast failed to the head of the
    /// outbound queue, preserving per-origin FIFO on the wire. Dropped if
    /// the store stopped in the meantime.
    pub(crate) async fn return_outbound(&self, msg: WriteMessage) {
        let mut inner = self.inner.lock().await;
        if let Lifecycle::Running(state) = &mut *inner {
            state.outbound.push_front(msg);
            metrics().outbound_depth.set(state.outbound.len() as i64);
        }
    }

    /// One inbound drain step: take the oldest candidate and either apply
    /// it (causal-delivery check holds) or requeue it for a later cycle.
    pub(crate) async fn apply_next(&self) -> ApplyOutcome {
        let mut inner = self.inner.lock().await;
        let Lifecycle::Running(state) = &mut *inner else {
            return ApplyOutcome::Idle;
        };
        let Some(msg) = state.inbound.pop() else {
            return ApplyOutcome::Idle;
        };

        match msg.deliverability_at(&state.clock) {
            Deliverability::Deliverable => {
                debug_assert!(msg.key < state.mem.len(), "key validated at the origin");
                let j = msg.origin.index();
                state.clock.set(j, msg.timestamp.get(j));
                state.mem[msg.key] = msg.value;
                metrics().messages_applied.inc();
                metrics().inbound_depth.set(state.inbound.len() as i64);
                tracing::trace!(
                    "store {} applied write {} from {}",
                    state.id,
                    msg.key,
                    msg.origin
                );
                ApplyOutcome::Applied
            }
            Deliverability::Pending => {
                tracing::debug!(
                    "store {} holding write from {} (deps not satisfied)",
                    state.id,
                    msg.origin
                );
                state.inbound.requeue(msg);
                metrics().messages_requeued.inc();
                ApplyOutcome::Requeued
            }
            Deliverability::Stale => {
                tracing::debug!(
                    "store {} dropping replayed write from {}",
                    state.id,
                    msg.origin
                );
                metrics().messages_discarded.inc();
                metrics().inbound_depth.set(state.inbound.len() as i64);
                ApplyOutcome::Discarded
            }
        }
    }
}

#[async_trait::async_trait]
impl<B: Broadcast> Inbound for CausalStore<B> {
    async fn deliver_remote(&self, msg: WriteMessage) -> Result<(), MemError> {
        CausalStore::deliver_remote(self, msg).await
    }
}

fn running(inner: &Lifecycle) -> Result<&State, MemError> {
    match inner {
        Lifecycle::Running(state) => Ok(state),
        Lifecycle::Unborn => Err(MemError::NotInitialized),
        Lifecycle::Stopped => Err(MemError::Stopped),
    }
}

fn running_mut(inner: &mut Lifecycle) -> Result<&mut State, MemError> {
    match inner {
        Lifecycle::Running(state) => Ok(state),
        Lifecycle::Unborn => Err(MemError::NotInitialized),
        Lifecycle::Stopped => Err(MemError::Stopped),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
