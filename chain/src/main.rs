// src/main.rs

//! Node binary.
//!
//! Wires up the chain library into a running peer:
//!
//! - JSON config and static peer list from disk
//! - chain snapshot restore from the data directory
//! - gossip server on the configured port
//! - handshake loops against every configured peer
//! - mining loop on the blocking pool
//! - Prometheus metrics exporter on /metrics

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use chain::{
    config::{load_config, MetricsConfig},
    network::{client, server},
    run_prometheus_http_server, ChainManager, HandshakeMessage, HttpGatewayClient, Mempool,
    MetricsRegistry, Miner, MinerError, Node,
};

/// Delay between mining rounds.
const MINE_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "node", about = "Compute-chain peer node")]
struct Cli {
    /// Gossip listen port; defaults to the configured network port.
    #[arg(long)]
    port: Option<String>,

    /// Path to the JSON configuration file.
    #[arg(long, default_value = "config.json")]
    config: String,

    /// Path to the JSON peer-list file.
    #[arg(long, default_value = "peers.json")]
    peers: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "node=info,chain=info".to_string()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let cfg = load_config(Path::new(&cli.config))
        .map_err(|e| format!("failed to load {}: {e}", cli.config))?;

    let peers = chain::network::load_peers(Path::new(&cli.peers))
        .map_err(|e| format!("failed to load {}: {e}", cli.peers))?;
    let peer_addrs: Vec<String> = peers.iter().map(|p| p.address()).collect();

    let port = cli.port.unwrap_or_else(|| cfg.network.port.clone());
    let listen_addr = format!("0.0.0.0:{port}");

    // ---------------------------
    // Metrics registry + exporter
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    let metrics_cfg = MetricsConfig::default();
    if metrics_cfg.enabled {
        let metrics_clone = metrics.clone();
        let addr = metrics_cfg.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::warn!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{addr}/metrics");
    }

    // ---------------------------
    // Chain state + snapshot
    // ---------------------------

    let chain = Arc::new(ChainManager::new());
    let snapshot_path = PathBuf::from(&cfg.data_dir).join("blockchain.json");
    if snapshot_path.exists() {
        match chain.load(&snapshot_path) {
            Ok(()) => tracing::info!(height = chain.height(), "chain snapshot restored"),
            Err(e) => tracing::warn!("ignoring unreadable chain snapshot: {e}"),
        }
    } else if let Err(e) = std::fs::create_dir_all(&cfg.data_dir) {
        return Err(format!("failed to create data dir {}: {e}", cfg.data_dir));
    }

    let mempool = Arc::new(Mempool::new());

    // ---------------------------
    // Object store client
    // ---------------------------

    let store = Arc::new(
        HttpGatewayClient::new(
            cfg.ipfs_gateway_url.clone(),
            Duration::from_secs(cfg.vm_execution_timeout.max(1)),
        )
        .map_err(|e| format!("failed to create object-store client: {e}"))?,
    );

    // ---------------------------
    // Gossip dispatcher + server
    // ---------------------------

    let node = Arc::new(
        Node::new(
            chain.clone(),
            mempool.clone(),
            peer_addrs.clone(),
            listen_addr.clone(),
            metrics.clone(),
        )
        .with_snapshot_path(snapshot_path.clone()),
    );

    let server_node = node.clone();
    let server_addr = listen_addr.clone();
    let server_task = tokio::spawn(async move {
        server::run_gossip_server(server_addr, server_node).await
    });

    // Announce ourselves to every configured peer; each loop retries
    // until its peer answers once.
    for peer in peer_addrs.clone() {
        let hello = HandshakeMessage::new(env!("CARGO_PKG_VERSION"), listen_addr.clone());
        tokio::task::spawn_blocking(move || client::handshake_loop(&peer, &hello));
    }

    // ---------------------------
    // Mining loop
    // ---------------------------

    let miner = Miner::new(
        mempool.clone(),
        chain.clone(),
        store,
        peer_addrs,
        cfg.max_block_transactions,
        cfg.mining_difficulty_target.clone(),
    );

    let miner_metrics = metrics.clone();
    let miner_chain = chain.clone();
    let miner_mempool = mempool.clone();
    tokio::task::spawn_blocking(move || {
        loop {
            let start = std::time::Instant::now();
            match miner.mine_block() {
                Ok(Some(block)) => {
                    miner_metrics.node.blocks_mined_total.inc();
                    miner_metrics
                        .node
                        .mine_block_seconds
                        .observe(start.elapsed().as_secs_f64());
                    miner_metrics
                        .node
                        .mempool_transactions
                        .set(miner_mempool.len() as i64);

                    tracing::info!(
                        height = miner_chain.height() - 1,
                        transactions = block.transactions.len(),
                        "mined block appended"
                    );

                    if let Err(e) = miner_chain.persist(&snapshot_path) {
                        tracing::warn!("failed to persist chain snapshot: {e}");
                    }
                }
                Ok(None) => {}
                Err(e @ MinerError::EmptyDifficultyTarget) | Err(e @ MinerError::Pow(_)) => {
                    tracing::error!("fatal mining error: {e}");
                    std::process::exit(1);
                }
                Err(e) => {
                    tracing::warn!("mining round failed: {e}");
                }
            }
            std::thread::sleep(MINE_INTERVAL);
        }
    });

    // The node blocks here indefinitely; a clean shutdown never occurs.
    match server_task.await {
        Ok(result) => result.map_err(|e| format!("gossip server error: {e}")),
        Err(e) => Err(format!("gossip server task failed: {e}")),
    }
}
