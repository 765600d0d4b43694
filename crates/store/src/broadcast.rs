//! Abstraction over the write-propagation transport.
//!
//! The store defines what must be sent (`Broadcast`) and how received
//! writes come back in (`Inbound`); the physical wire between processes
//! is the transport layer's concern. The transport must eventually hand
//! every broadcast message to every other live process's
//! `deliver_remote` — at-least-once, no silent loss. [`LocalBus`] is the
//! in-process reference implementation used by tests and the node
//! binary.

use crate::message::WriteMessage;
use causal_common::{MemError, ProcessId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error("broadcast failed: {0}")]
    Send(String),
}

/// Outbound side of the transport contract.
///
/// Called once per locally-originated write by the send drain. A
/// returned error means the attempt failed and the message will be
/// retried; it must not mean the message was partially delivered and
/// forgotten.
#[async_trait::async_trait]
pub trait Broadcast: Send + Sync + 'static {
    async fn broadcast(&self, msg: WriteMessage) -> Result<(), BroadcastError>;
}

/// Inbound side of the transport contract: push a received write onto a
/// replica's inbound queue. No causal check happens at enqueue time.
#[async_trait::async_trait]
pub trait Inbound: Send + Sync + 'static {
    async fn deliver_remote(&self, msg: WriteMessage) -> Result<(), MemError>;
}

// ---------------------------------------------------------------------------
// LocalBus
// ---------------------------------------------------------------------------

/// In-process broadcast bus connecting the members of one replica group.
///
/// Fans each message out to every registered member except its origin.
/// A member that has stopped is no longer live and is skipped; that is
/// not a transport failure.
#[derive(Default)]
pub struct LocalBus {
    members: RwLock<HashMap<ProcessId, Arc<dyn Inbound>>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a member's inbound endpoint under its process id.
    pub async fn register(&self, id: ProcessId, member: Arc<dyn Inbound>) {
        self.members.write().await.insert(id, member);
    }

    /// Number of registered members.
    pub async fn member_count(&self) -> usize {
        self.members.read().await.len()
    }
}

impl std::fmt::Debug for LocalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBus").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Broadcast for LocalBus {
    async fn broadcast(&self, msg: WriteMessage) -> Result<(), BroadcastError> {
        let targets: Vec<(ProcessId, Arc<dyn Inbound>)> = {
            let members = self.members.read().await;
            members
                .iter()
                .filter(|(id, _)| **id != msg.origin)
                .map(|(id, m)| (*id, m.clone()))
                .collect()
        };

        for (id, target) in targets {
            match target.deliver_remote(msg.clone()).await {
                Ok(()) => {}
                // A stopped member has left the group; skip it.
                Err(MemError::Stopped) => {
                    tracing::debug!("member {} stopped, skipping delivery", id);
                }
                Err(e) => {
                    return Err(BroadcastError::Send(format!(
                        "delivery to {} rejected: {}",
                        id, e
                    )));
                }
            }
        }
        Ok(())
    }
}
