//! Background drains for the pending queues.
//!
//! Two independent tokio tasks per store: the send drain pops outbound
//! messages and hands them to the transport; the apply drain runs the
//! causal-delivery check over the inbound queue. Both poll on a fixed
//! interval and exit cooperatively once the store is stopped, so
//! shutdown latency is bounded by the poll period. The per-cycle
//! functions are public so tests can drain deterministically without
//! spawning anything.

use crate::broadcast::Broadcast;
use crate::store::{ApplyOutcome, CausalStore};
use causal_metrics::metrics;
use std::sync::Arc;
use tokio::time::{interval, Duration};

/// Poll periods for the two drains.
#[derive(Debug, Clone)]
pub struct DrainConfig {
    pub send_interval: Duration,
    pub apply_interval: Duration,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            send_interval: Duration::from_millis(10),
            apply_interval: Duration::from_millis(10),
        }
    }
}

/// Result of one outbound drain cycle.
#[derive(Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Broadcast failed; the message went back to the head of the
    /// outbound queue for retry.
    Failed,
    Idle,
}

/// Spawn both drains for a store. Returns the send and apply task
/// handles; both complete shortly after `store.stop()`.
pub fn spawn_drains<B: Broadcast>(
    store: &Arc<CausalStore<B>>,
    config: DrainConfig,
) -> (tokio::task::JoinHandle<()>, tokio::task::JoinHandle<()>) {
    (
        spawn_send_task(store.clone(), config.send_interval),
        spawn_apply_task(store.clone(), config.apply_interval),
    )
}

/// Spawn the outbound drain task.
pub fn spawn_send_task<B: Broadcast>(
    store: Arc<CausalStore<B>>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(period);
        loop {
            tick.tick().await;
            if store.is_stopped().await {
                break;
            }
            send_cycle(&store).await;
        }
        tracing::debug!("send drain exited");
    })
}

/// Spawn the inbound drain task.
pub fn spawn_apply_task<B: Broadcast>(
    store: Arc<CausalStore<B>>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(period);
        loop {
            tick.tick().await;
            if store.is_stopped().await {
                break;
            }
            apply_cycle(&store).await;
        }
        tracing::debug!("apply drain exited");
    })
}

/// One outbound cycle: pop the oldest message (FIFO) and broadcast it.
///
/// The transport call runs outside the store lock, so a slow transport
/// never stalls `read`/`write`. On failure the message returns to the
/// head of the queue — retried before anything issued after it.
pub async fn send_cycle<B: Broadcast>(store: &CausalStore<B>) -> SendOutcome {
    let Some(msg) = store.take_outbound().await else {
        return SendOutcome::Idle;
    };

    match store.transport().broadcast(msg.clone()).await {
        Ok(()) => {
            metrics().messages_broadcast.inc();
            SendOutcome::Sent
        }
        Err(e) => {
            tracing::warn!("broadcast failed, will retry: {}", e);
            metrics().broadcast_failures.inc();
            store.return_outbound(msg).await;
            SendOutcome::Failed
        }
    }
}

/// One inbound cycle: apply the oldest candidate if causally safe,
/// otherwise requeue it.
pub async fn apply_cycle<B: Broadcast>(store: &CausalStore<B>) -> ApplyOutcome {
    store.apply_next().await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
