//! Metrics and tracing setup for causal-kv.
//!
//! Provides a global [`StoreMetrics`] singleton backed by the
//! `prometheus` crate, plus a lightweight HTTP server for Prometheus
//! scraping.

use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::OnceLock;

// ────────────────────────── Tracing ──────────────────────────

/// Initialize the tracing subscriber with env-filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

// ────────────────────────── Prometheus metrics ──────────────────────────

/// Global metrics instance.
static METRICS: OnceLock<StoreMetrics> = OnceLock::new();

/// Retrieve (or lazily create) the global metrics singleton.
pub fn metrics() -> &'static StoreMetrics {
    METRICS.get_or_init(StoreMetrics::new)
}

/// All Prometheus metrics for a causal-kv process.
pub struct StoreMetrics {
    pub registry: Registry,

    // ── Local API ──
    pub reads_local: IntCounter,
    pub writes_local: IntCounter,

    // ── Replication ──
    pub messages_broadcast: IntCounter,
    pub broadcast_failures: IntCounter,
    pub messages_applied: IntCounter,
    pub messages_requeued: IntCounter,
    pub messages_discarded: IntCounter,

    // ── Queue depths ──
    pub outbound_depth: IntGauge,
    pub inbound_depth: IntGauge,
}

// Manual Debug impl because prometheus types don't derive Debug.
impl std::fmt::Debug for StoreMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreMetrics").finish_non_exhaustive()
    }
}

impl StoreMetrics {
    fn new() -> Self {
        let registry = Registry::new();

        let reads_local = IntCounter::with_opts(Opts::new(
            "causal_reads_local_total",
            "Local read operations",
        ))
        .expect("reads_local counter");
        let writes_local = IntCounter::with_opts(Opts::new(
            "causal_writes_local_total",
            "Local write operations",
        ))
        .expect("writes_local counter");

        let messages_broadcast = IntCounter::with_opts(Opts::new(
            "causal_messages_broadcast_total",
            "Write messages handed to the broadcast transport",
        ))
        .expect("messages_broadcast counter");
        let broadcast_failures = IntCounter::with_opts(Opts::new(
            "causal_broadcast_failures_total",
            "Broadcast attempts that failed and were requeued",
        ))
        .expect("broadcast_failures counter");
        let messages_applied = IntCounter::with_opts(Opts::new(
            "causal_messages_applied_total",
            "Remote writes applied after passing the causal-delivery check",
        ))
        .expect("messages_applied counter");
        let messages_requeued = IntCounter::with_opts(Opts::new(
            "causal_messages_requeued_total",
            "Inbound messages requeued with unsatisfied dependencies",
        ))
        .expect("messages_requeued counter");
        let messages_discarded = IntCounter::with_opts(Opts::new(
            "causal_messages_discarded_total",
            "Replayed inbound messages dropped as already applied",
        ))
        .expect("messages_discarded counter");

        let outbound_depth = IntGauge::with_opts(Opts::new(
            "causal_outbound_queue_depth",
            "Writes awaiting broadcast",
        ))
        .expect("outbound_depth gauge");
        let inbound_depth = IntGauge::with_opts(Opts::new(
            "causal_inbound_queue_depth",
            "Received writes awaiting causal delivery",
        ))
        .expect("inbound_depth gauge");

        for collector in [&reads_local, &writes_local, &messages_broadcast,
            &broadcast_failures, &messages_applied, &messages_requeued,
            &messages_discarded]
        {
            registry
                .register(Box::new(collector.clone()))
                .expect("register counter");
        }
        registry
            .register(Box::new(outbound_depth.clone()))
            .expect("register outbound_depth");
        registry
            .register(Box::new(inbound_depth.clone()))
            .expect("register inbound_depth");

        Self {
            registry,
            reads_local,
            writes_local,
            messages_broadcast,
            broadcast_failures,
            messages_applied,
            messages_requeued,
            messages_discarded,
            outbound_depth,
            inbound_depth,
        }
    }
}

/// Encode all registered metrics in Prometheus text exposition format.
pub fn encode_metrics() -> String {
    let m = metrics();
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    encoder
        .encode(&m.registry.gather(), &mut buf)
        .expect("prometheus text encoding");
    String::from_utf8(buf).expect("prometheus output is valid UTF-8")
}

// ────────────────────────── Metrics HTTP server ──────────────────────────

use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

async fn metrics_handler(
    _req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, std::convert::Infallible> {
    let body = encode_metrics();
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/plain; version=0.0.4; charset=utf-8")
        .body(Full::new(Bytes::from(body)))
        .expect("valid HTTP response"))
}

/// Serve Prometheus metrics on the given address (`GET /metrics`).
///
/// This spawns a lightweight HTTP/1.1 server. Call from a `tokio::spawn`.
pub async fn serve_metrics(
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("metrics server listening on http://{}/metrics", addr);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(metrics_handler))
                .await
            {
                tracing::debug!("metrics connection error: {}", e);
            }
        });
    }
}

// ────────────────────────── Tests ──────────────────────────
