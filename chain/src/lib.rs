//! Chain library crate.
//!
//! This crate provides the core building blocks for a peer-to-peer
//! node on a content-addressed compute blockchain: transactions name
//! an input dataset and an algorithm by opaque content identifiers, a
//! miner executes the algorithm deterministically inside a bounded VM
//! and commits the result as part of the mined block, and nodes gossip
//! transactions and blocks over TCP until they converge on a single
//! longest chain.
//!
//! The pieces:
//!
//! - SHA-256 and Merkle primitives (`hash`),
//! - the transaction/block data model (`types`),
//! - a mutex-guarded mempool (`mempool`),
//! - the longest-chain manager with orphan buffering and reorgs
//!   (`consensus`),
//! - proof-of-work search and validation (`pow`),
//! - the deterministic execution VM (`vm`),
//! - the mining loop (`miner`),
//! - the object-store interface and IPFS HTTP client (`ipfs`),
//! - the gossip plane: wire codec, server, dialer, dispatcher
//!   (`network`),
//! - Prometheus-based metrics (`metrics`),
//! - and the node configuration (`config`).
//!
//! Higher-level binaries compose these pieces into full nodes and
//! tooling.

pub mod config;
pub mod consensus;
pub mod hash;
pub mod ipfs;
pub mod mempool;
pub mod metrics;
pub mod miner;
pub mod network;
pub mod pow;
pub mod types;
pub mod vm;

// Re-export top-level configuration types.
pub use config::{load_config, Config, ConfigError, MetricsConfig, NetworkConfig};

// Re-export the chain manager and its outcomes.
pub use consensus::{BlockDisposition, ChainError, ChainManager};

// Re-export the mempool and miner.
pub use mempool::Mempool;
pub use miner::{BlockBroadcaster, GossipBroadcaster, Miner, MinerError};

// Re-export object-store interfaces and the HTTP client.
pub use ipfs::{HttpGatewayClient, MockStore, ObjectStore, StoreError};

// Re-export metrics registry and the exporter.
pub use metrics::{run_prometheus_http_server, MetricsRegistry, NodeMetrics};

// Re-export the gossip dispatcher and wire types.
pub use network::{
    BlockMessage, BlocksMessage, CodecError, GetBlocksMessage, GetDataMessage, HandshakeMessage,
    InvMessage, Message, Node, Peer, TxMessage,
};

// Re-export domain types at the crate root for convenience.
pub use types::*;

/// Type alias for the object store a "typical" node talks to.
pub type DefaultObjectStore = HttpGatewayClient;
