// txgen/src/main.rs

//! Transaction-generator CLI.
//!
//! Builds a compute transaction from two content identifiers, prints
//! its wire form to standard output, and broadcasts it to the given
//! peers. Exit code 0 on success, non-zero on validation failure.

use clap::Parser;

use chain::network::client;
use chain::{Transaction, TxMessage};

#[derive(Parser, Debug)]
#[command(name = "txgen", about = "Create and broadcast a compute transaction")]
struct Cli {
    /// Content identifier of the input dataset.
    #[arg(long = "dataHash", default_value = "")]
    data_hash: String,

    /// Content identifier of the algorithm.
    #[arg(long = "algoHash", default_value = "")]
    algo_hash: String,

    /// Comma-separated list of peers (`host:port`).
    #[arg(long = "peers", default_value = "localhost:6001,localhost:6002")]
    peers: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "txgen=info".to_string()))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(
        &cli.data_hash,
        &cli.algo_hash,
        &cli.peers,
        client::broadcast_transaction,
    ) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

/// Validates the inputs, builds the transaction, and hands its wire
/// form to `broadcast`.
fn run(
    data_hash: &str,
    algo_hash: &str,
    peers: &str,
    broadcast: impl Fn(&TxMessage, &[String]),
) -> Result<(), String> {
    if data_hash.is_empty() || algo_hash.is_empty() {
        return Err("dataHash and algoHash are required".to_string());
    }

    let peer_list = parse_peers(peers)?;

    let mut tx = Transaction {
        data_hash: data_hash.to_string(),
        algorithm_hash: algo_hash.to_string(),
        metadata: "Generated via CLI".to_string(),
        ..Transaction::default()
    };
    tx.generate_tx_id();

    let message = TxMessage::from_transaction(&tx);
    match serde_json::to_string_pretty(&message) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => return Err(format!("failed to render transaction: {e}")),
    }

    broadcast(&message, &peer_list);
    Ok(())
}

/// Splits and validates a comma-separated peer list.
fn parse_peers(peers: &str) -> Result<Vec<String>, String> {
    let entries: Vec<String> = peers
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    if entries.is_empty() {
        return Err("invalid or empty peer list".to_string());
    }

    for entry in &entries {
        validate_peer_address(entry)
            .map_err(|e| format!("invalid peer address: {entry}, error: {e}"))?;
    }

    Ok(entries)
}

/// Checks that a peer address is in `host:port` form with a numeric
/// port.
fn validate_peer_address(peer: &str) -> Result<(), String> {
    let (host, port) = peer
        .rsplit_once(':')
        .ok_or_else(|| "missing ':' separator".to_string())?;

    if host.is_empty() {
        return Err("empty host".to_string());
    }
    port.parse::<u16>()
        .map_err(|e| format!("bad port: {e}"))?;
    Ok(())
}
