//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed node metrics, and an async
//! HTTP exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    body::Incoming, header, server::conn::http1, service::service_fn, Method, Request, Response,
    StatusCode,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};

/// Node-level Prometheus metrics.
///
/// These are registered into a [`Registry`] and updated from the
/// miner, the chain dispatcher, and the gossip plane.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Blocks produced by the local miner.
    pub blocks_mined_total: IntCounter,
    /// Blocks accepted from gossip or range replies.
    pub blocks_received_total: IntCounter,
    /// Chain reorganizations to a longer fork.
    pub chain_reorgs_total: IntCounter,
    /// Inbound gossip messages that decoded successfully.
    pub messages_received_total: IntCounter,
    /// Current number of staged transactions.
    pub mempool_transactions: IntGauge,
    /// Wall-clock duration of one mining round, in seconds.
    pub mine_block_seconds: Histogram,
}

impl NodeMetrics {
    /// Registers node metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let blocks_mined_total = IntCounter::with_opts(Opts::new(
            "blocks_mined_total",
            "Total number of blocks produced by the local miner",
        ))?;
        registry.register(Box::new(blocks_mined_total.clone()))?;

        let blocks_received_total = IntCounter::with_opts(Opts::new(
            "blocks_received_total",
            "Total number of blocks accepted from peers",
        ))?;
        registry.register(Box::new(blocks_received_total.clone()))?;

        let chain_reorgs_total = IntCounter::with_opts(Opts::new(
            "chain_reorgs_total",
            "Total number of reorganizations to a longer fork",
        ))?;
        registry.register(Box::new(chain_reorgs_total.clone()))?;

        let messages_received_total = IntCounter::with_opts(Opts::new(
            "messages_received_total",
            "Total number of successfully decoded gossip messages",
        ))?;
        registry.register(Box::new(messages_received_total.clone()))?;

        let mempool_transactions = IntGauge::with_opts(Opts::new(
            "mempool_transactions",
            "Current number of staged transactions",
        ))?;
        registry.register(Box::new(mempool_transactions.clone()))?;

        let mine_block_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "mine_block_seconds",
                "Duration of one mining round (VM execution + PoW) in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
            ]),
        )?;
        registry.register(Box::new(mine_block_seconds.clone()))?;

        Ok(Self {
            blocks_mined_total,
            blocks_received_total,
            chain_reorgs_total,
            messages_received_total,
            mempool_transactions,
            mine_block_seconds,
        })
    }
}

/// Wrapper around a Prometheus registry and the node metrics.
///
/// This is the main handle you pass around in the node. It can be
/// wrapped in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub node: NodeMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying
    /// `Registry` and registers the node metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("node".to_string()), None)?;
        let node = NodeMetrics::register(&registry)?;
        Ok(Self { registry, node })
    }

    /// Encodes all metrics in this registry into the Prometheus text
    /// format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::warn!("metrics HTTP server error: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}
