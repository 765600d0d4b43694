//! Multi-member integration tests.
//!
//! These exercise the full store stack — writes, broadcast over the
//! in-process bus, and causal delivery — both deterministically (driving
//! drain cycles by hand) and with spawned drains under chaos-injected
//! duplication and latency.

use causal_common::{MemError, ProcessId};
use causal_store::broadcast::{Broadcast, BroadcastError, Inbound, LocalBus};
use causal_store::chaos::{ChaosBroadcast, ChaosBroadcastConfig};
use causal_store::message::WriteMessage;
use causal_store::store::{ApplyOutcome, CausalStore};
use causal_store::tasks::{apply_cycle, send_cycle, spawn_drains, DrainConfig, SendOutcome};
use causal_store::vclock::VectorClock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;

// ────────────────────────── Test harness ──────────────────────────

/// A replica group wired over a [`LocalBus`].
struct TestCluster {
    stores: Vec<Arc<CausalStore<LocalBus>>>,
}

impl TestCluster {
    async fn boot(members: usize, size: usize) -> Self {
        let bus = Arc::new(LocalBus::new());
        let mut stores = Vec::with_capacity(members);
        for i in 0..members {
            let id = ProcessId::new(i);
            let store = Arc::new(CausalStore::new(bus.clone()));
            store.init(id, size, members).await.unwrap();
            bus.register(id, store.clone() as Arc<dyn Inbound>).await;
            stores.push(store);
        }
        Self { stores }
    }

    /// Drive every member's drains for `rounds` cycles, deterministically.
    async fn settle(&self, rounds: usize) {
        for _ in 0..rounds {
            for store in &self.stores {
                while send_cycle(store).await == SendOutcome::Sent {}
            }
            for store in &self.stores {
                while apply_cycle(store).await == ApplyOutcome::Applied {}
            }
        }
    }
}

/// Captures broadcast messages for manual, reordered delivery.
struct CapturingBroadcast {
    sent: Mutex<Vec<WriteMessage>>,
}

impl CapturingBroadcast {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    async fn take_all(&self) -> Vec<WriteMessage> {
        std::mem::take(&mut *self.sent.lock().await)
    }
}

#[async_trait::async_trait]
impl Broadcast for CapturingBroadcast {
    async fn broadcast(&self, msg: WriteMessage) -> Result<(), BroadcastError> {
        self.sent.lock().await.push(msg);
        Ok(())
    }
}

async fn capturing_store(
    id: usize,
    size: usize,
    members: usize,
) -> (Arc<CausalStore<CapturingBroadcast>>, Arc<CapturingBroadcast>) {
    let transport = Arc::new(CapturingBroadcast::new());
    let store = Arc::new(CausalStore::new(transport.clone()));
    store.init(ProcessId::new(id), size, members).await.unwrap();
    (store, transport)
}

// ────────────────────────── Deterministic scenarios ──────────────────────────

#[tokio::test]
async fn test_write_propagates_to_all_members() {
    let cluster = TestCluster::boot(3, 4).await;

    cluster.stores[0].write(1, b"shared".to_vec()).await.unwrap();
    cluster.settle(2).await;

    for store in &cluster.stores {
        assert_eq!(store.read(1).await.unwrap(), b"shared");
        assert_eq!(store.clock().await.unwrap().counters(), &[1, 0, 0]);
    }
}

#[tokio::test]
async fn test_out_of_order_transport_delivery() {
    // Two writes from p0 reach p1 reversed: the second write fails the
    // exact-successor check and cycles through the queue until the first
    // has been applied.
    let (p0, p0_out) = capturing_store(0, 1, 3).await;
    let (p1, _) = capturing_store(1, 1, 3).await;

    p0.write(0, b"10".to_vec()).await.unwrap();
    p0.write(0, b"20".to_vec()).await.unwrap();
    assert_eq!(send_cycle(&p0).await, SendOutcome::Sent);
    assert_eq!(send_cycle(&p0).await, SendOutcome::Sent);

    let mut sent = p0_out.take_all().await;
    assert_eq!(sent.len(), 2);
    let write_20 = sent.pop().unwrap();
    let write_10 = sent.pop().unwrap();

    // Reversed arrival order.
    p1.deliver_remote(write_20).await.unwrap();
    p1.deliver_remote(write_10).await.unwrap();

    assert_eq!(apply_cycle(&p1).await, ApplyOutcome::Requeued);
    assert_eq!(apply_cycle(&p1).await, ApplyOutcome::Applied);
    assert_eq!(p1.read(0).await.unwrap(), b"10");
    assert_eq!(apply_cycle(&p1).await, ApplyOutcome::Applied);

    assert_eq!(p1.read(0).await.unwrap(), b"20");
    assert_eq!(p1.clock().await.unwrap().counters(), &[2, 0, 0]);
    assert_eq!(apply_cycle(&p1).await, ApplyOutcome::Idle);
}

#[tokio::test]
async fn test_causal_chain_respected_at_third_member() {
    // p1 writes after seeing p0's write; p2 receives p1's message first
    // and must hold it until p0's arrives.
    let (p0, p0_out) = capturing_store(0, 2, 3).await;
    let (p1, p1_out) = capturing_store(1, 2, 3).await;
    let (p2, _) = capturing_store(2, 2, 3).await;

    p0.write(0, b"cause".to_vec()).await.unwrap();
    send_cycle(&p0).await;
    let from_p0 = p0_out.take_all().await.pop().unwrap();

    // p1 sees p0's write, then issues its own.
    p1.deliver_remote(from_p0.clone()).await.unwrap();
    assert_eq!(apply_cycle(&p1).await, ApplyOutcome::Applied);
    p1.write(1, b"effect".to_vec()).await.unwrap();
    send_cycle(&p1).await;
    let from_p1 = p1_out.take_all().await.pop().unwrap();
    assert_eq!(from_p1.timestamp.counters(), &[1, 1, 0]);

    // p2 receives effect before cause.
    p2.deliver_remote(from_p1).await.unwrap();
    assert_eq!(apply_cycle(&p2).await, ApplyOutcome::Requeued);
    assert_eq!(p2.read(1).await.unwrap(), Vec::<u8>::new());

    p2.deliver_remote(from_p0).await.unwrap();
    assert_eq!(apply_cycle(&p2).await, ApplyOutcome::Applied); // cause
    assert_eq!(apply_cycle(&p2).await, ApplyOutcome::Applied); // effect
    assert_eq!(p2.read(0).await.unwrap(), b"cause");
    assert_eq!(p2.read(1).await.unwrap(), b"effect");
    assert_eq!(p2.clock().await.unwrap().counters(), &[1, 1, 0]);
}

#[tokio::test]
async fn test_stopped_member_does_not_block_group() {
    let cluster = TestCluster::boot(3, 2).await;

    cluster.stores[2].stop().await;
    cluster.stores[0].write(0, b"still works".to_vec()).await.unwrap();
    cluster.settle(2).await;

    assert_eq!(cluster.stores[1].read(0).await.unwrap(), b"still works");
    assert_eq!(cluster.stores[2].read(0).await, Err(MemError::Stopped));
}

#[tokio::test]
async fn test_interleaved_writes_converge() {
    let cluster = TestCluster::boot(3, 9).await;

    // Each member writes its own keys, interleaved with partial drains.
    for round in 0..3usize {
        for (i, store) in cluster.stores.iter().enumerate() {
            let key = i * 3 + round;
            store.write(key, format!("m{}r{}", i, round).into_bytes()).await.unwrap();
        }
        cluster.settle(1).await;
    }
    cluster.settle(3).await;

    let expected_clock = VectorClock::from_counters(vec![3, 3, 3]);
    let reference = cluster.stores[0].snapshot().await.unwrap();
    for store in &cluster.stores {
        assert_eq!(store.clock().await.unwrap(), expected_clock);
        assert_eq!(store.snapshot().await.unwrap(), reference);
    }
    assert_eq!(reference[4], b"m1r1");
}

// ────────────────────────── Chaos ──────────────────────────

#[tokio::test]
async fn test_convergence_under_chaos_duplication_and_latency() {
    let members = 3;
    let size = 12;
    let writes_per_member = 4usize;

    let bus = Arc::new(LocalBus::new());
    let chaos = Arc::new(ChaosBroadcast::new(
        bus.clone(),
        ChaosBroadcastConfig {
            latency: Duration::from_millis(1),
            jitter: Duration::from_millis(3),
            duplicate_rate: 0.5,
        },
    ));

    let mut stores = Vec::with_capacity(members);
    for i in 0..members {
        let id = ProcessId::new(i);
        let store = Arc::new(CausalStore::new(chaos.clone()));
        store.init(id, size, members).await.unwrap();
        bus.register(id, store.clone() as Arc<dyn Inbound>).await;
        stores.push(store);
    }

    let config = DrainConfig {
        send_interval: Duration::from_millis(1),
        apply_interval: Duration::from_millis(1),
    };
    let mut drains = Vec::new();
    for store in &stores {
        drains.push(spawn_drains(store, config.clone()));
    }

    // Distinct keys per member, so converged values are deterministic.
    for (i, store) in stores.iter().enumerate() {
        for w in 0..writes_per_member {
            let key = i * writes_per_member + w;
            store.write(key, format!("m{}w{}", i, w).into_bytes()).await.unwrap();
        }
    }

    // Despite duplication and jitter, every member converges to the same
    // clock; duplicates are rejected by the exact-successor check.
    let target = VectorClock::from_counters(vec![writes_per_member as u64; members]);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let mut all_converged = true;
        for store in &stores {
            if store.clock().await.unwrap() != target {
                all_converged = false;
                break;
            }
        }
        if all_converged {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "cluster should converge under chaos"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let reference = stores[0].snapshot().await.unwrap();
    for store in &stores {
        assert_eq!(store.snapshot().await.unwrap(), reference);
    }
    assert_eq!(reference[0], b"m0w0");
    assert_eq!(reference[writes_per_member], b"m1w0");

    for store in &stores {
        store.stop().await;
    }
    for (send_task, apply_task) in drains {
        tokio::time::timeout(Duration::from_secs(1), send_task)
            .await
            .expect("send drain exits after stop")
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), apply_task)
            .await
            .expect("apply drain exits after stop")
            .unwrap();
    }
}
