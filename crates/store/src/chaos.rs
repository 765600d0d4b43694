//! Chaos injection wrapper for [`Broadcast`].
//!
//! [`ChaosBroadcast`] wraps any `B: Broadcast` and injects latency,
//! jitter, and message duplication. It never drops a message — the
//! transport contract forbids silent loss — so what it exercises is the
//! retry and replay-rejection machinery, not loss recovery.

use crate::broadcast::{Broadcast, BroadcastError};
use crate::message::WriteMessage;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;

/// Configuration for broadcast chaos injection.
#[derive(Debug, Clone)]
pub struct ChaosBroadcastConfig {
    /// Fixed latency injected before forwarding.
    pub latency: Duration,
    /// Random additional latency in \[0, jitter\].
    pub jitter: Duration,
    /// Probability of forwarding the message a second time \[0.0, 1.0\].
    pub duplicate_rate: f64,
}

impl Default for ChaosBroadcastConfig {
    fn default() -> Self {
        Self {
            latency: Duration::ZERO,
            jitter: Duration::ZERO,
            duplicate_rate: 0.0,
        }
    }
}

/// A [`Broadcast`] wrapper that injects latency and duplication.
pub struct ChaosBroadcast<B: Broadcast> {
    inner: Arc<B>,
    config: Arc<RwLock<ChaosBroadcastConfig>>,
}

impl<B: Broadcast> std::fmt::Debug for ChaosBroadcast<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaosBroadcast").finish_non_exhaustive()
    }
}

impl<B: Broadcast> ChaosBroadcast<B> {
    pub fn new(inner: Arc<B>, config: ChaosBroadcastConfig) -> Self {
        Self {
            inner,
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Dynamically update the duplication rate.
    pub async fn set_duplicate_rate(&self, rate: f64) {
        self.config.write().await.duplicate_rate = rate;
    }
}

#[async_trait::async_trait]
impl<B: Broadcast> Broadcast for ChaosBroadcast<B> {
    async fn broadcast(&self, msg: WriteMessage) -> Result<(), BroadcastError> {
        let (delay, duplicate) = {
            let config = self.config.read().await;
            let jitter_ms = if config.jitter.is_zero() {
                0
            } else {
                rand::thread_rng().gen_range(0..=config.jitter.as_millis() as u64)
            };
            let delay = config.latency + Duration::from_millis(jitter_ms);
            let duplicate = config.duplicate_rate > 0.0
                && rand::thread_rng().gen_bool(config.duplicate_rate.min(1.0));
            (delay, duplicate)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.inner.broadcast(msg.clone()).await?;
        if duplicate {
            tracing::debug!("chaos: duplicating message from {}", msg.origin);
            self.inner.broadcast(msg).await?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
