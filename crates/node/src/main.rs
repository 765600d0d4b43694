//! causal-node: entry point for a causal-kv replica group.
//!
//! Loads config, initialises tracing and metrics, then boots the whole
//! member set in-process, wired over the [`LocalBus`]. Each member gets
//! its own store and drain tasks; an optional workload issues writes so
//! replication can be observed through logs and metrics. Runs until
//! Ctrl+C, then stops every store and waits for the drains to exit.

use causal_common::ProcessId;
use causal_store::broadcast::{Inbound, LocalBus};
use causal_store::store::CausalStore;
use causal_store::tasks::{spawn_drains, DrainConfig};
use std::sync::Arc;
use tokio::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    causal_metrics::init_tracing();

    // Load config: first CLI arg is the YAML config path
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    let config = causal_config::load_from_file(std::path::Path::new(&config_path))
        .unwrap_or_else(|e| {
            tracing::warn!(
                "failed to load config from {}: {}, using defaults",
                config_path,
                e
            );
            causal_config::NodeConfig::default()
        });

    let drain_config = DrainConfig {
        send_interval: Duration::from_millis(config.runtime.send_interval_ms),
        apply_interval: Duration::from_millis(config.runtime.apply_interval_ms),
    };

    // Build and initialise every member before spawning any drain, so no
    // write is broadcast into a partially registered group.
    let bus = Arc::new(LocalBus::new());
    let mut stores = Vec::with_capacity(config.store.members);
    for i in 0..config.store.members {
        let id = ProcessId::new(i);
        let store = Arc::new(CausalStore::new(bus.clone()));
        store.init(id, config.store.size, config.store.members).await?;
        bus.register(id, store.clone() as Arc<dyn Inbound>).await;
        stores.push(store);
    }

    let mut drains = Vec::with_capacity(stores.len());
    for store in &stores {
        drains.push(spawn_drains(store, drain_config.clone()));
    }

    tracing::info!(
        "replica group running: {} member(s), {} slot(s)",
        config.store.members,
        config.store.size
    );

    // Spawn metrics HTTP server if configured
    if let Some(metrics_port) = config.metrics_port {
        let metrics_addr: std::net::SocketAddr = format!("0.0.0.0:{}", metrics_port)
            .parse()
            .expect("valid metrics address");
        tokio::spawn(async move {
            if let Err(e) = causal_metrics::serve_metrics(metrics_addr).await {
                tracing::warn!("metrics server failed: {}", e);
            }
        });
    }

    // Demo workload: round-robin writes across members
    if config.runtime.workload_writes > 0 {
        let workload_stores = stores.clone();
        let writes = config.runtime.workload_writes;
        let size = config.store.size;
        tokio::spawn(async move {
            run_workload(workload_stores, writes, size).await;
        });
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("received Ctrl+C, shutting down");

    for store in &stores {
        store.stop().await;
    }
    for (send_task, apply_task) in drains {
        send_task.await?;
        apply_task.await?;
    }

    Ok(())
}

/// Issue `writes` writes round-robin across the members, slow enough to
/// let replication interleave with new writes.
async fn run_workload(stores: Vec<Arc<CausalStore<LocalBus>>>, writes: usize, size: usize) {
    for round in 0..writes {
        let writer = &stores[round % stores.len()];
        let key = round % size;
        let value = format!("value-{}", round).into_bytes();
        if let Err(e) = writer.write(key, value).await {
            tracing::warn!("workload write failed: {}", e);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tracing::info!("workload complete: {} write(s) issued", writes);
}
