//! Message dispatcher.
//!
//! A [`Node`] owns the handles the gossip plane needs — chain manager,
//! mempool, peer list, and the peer-version registry — and routes each
//! decoded message into chain, mempool, or fetch actions. Keeping this
//! on one explicit value (instead of package-level globals) makes the
//! wiring visible and testable.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::consensus::{BlockDisposition, ChainManager};
use crate::hash;
use crate::mempool::Mempool;
use crate::metrics::MetricsRegistry;

use super::client;
use super::message::{
    self, BlockMessage, BlocksMessage, GetBlocksMessage, GetDataMessage, HandshakeMessage,
    InvMessage, Message, TxMessage,
};

/// Gossip-facing node state.
pub struct Node {
    chain: Arc<ChainManager>,
    mempool: Arc<Mempool>,
    peers: Vec<String>,
    listen_addr: String,
    snapshot_path: Option<PathBuf>,
    peer_versions: Mutex<HashMap<String, String>>,
    metrics: Arc<MetricsRegistry>,
}

impl Node {
    /// Creates a dispatcher over the given handles.
    pub fn new(
        chain: Arc<ChainManager>,
        mempool: Arc<Mempool>,
        peers: Vec<String>,
        listen_addr: impl Into<String>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            chain,
            mempool,
            peers,
            listen_addr: listen_addr.into(),
            snapshot_path: None,
            peer_versions: Mutex::new(HashMap::new()),
            metrics,
        }
    }

    /// Persist the chain to this path after each accepted block.
    pub fn with_snapshot_path(mut self, path: PathBuf) -> Self {
        self.snapshot_path = Some(path);
        self
    }

    /// Returns the chain handle this dispatcher routes into.
    pub fn chain(&self) -> &Arc<ChainManager> {
        &self.chain
    }

    /// Returns the mempool handle this dispatcher routes into.
    pub fn mempool(&self) -> &Arc<Mempool> {
        &self.mempool
    }

    /// Returns the recorded protocol version of `peer`, if any.
    pub fn peer_version(&self, peer: &str) -> Option<String> {
        let versions = self.peer_versions.lock().expect("peer registry poisoned");
        versions.get(peer).cloned()
    }

    /// Decodes and routes one raw inbound message.
    ///
    /// Codec failures are logged and dropped; the node stays up.
    pub fn handle_message(&self, raw: &[u8]) {
        let decoded = match message::decode(raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!("dropping inbound message: {e}");
                return;
            }
        };

        self.metrics.node.messages_received_total.inc();

        match decoded {
            Message::Handshake(hello) => self.on_handshake(hello),
            Message::Transaction(tx) => self.on_transaction(tx),
            Message::Block(block) => self.on_block(block),
            Message::GetBlocks(request) => self.on_get_blocks(request),
            Message::Blocks(reply) => self.on_blocks(reply),
            Message::Inv(inv) => self.on_inv(inv),
            Message::GetData(request) => self.on_get_data(request),
        }
    }

    fn on_handshake(&self, hello: HandshakeMessage) {
        tracing::info!(
            peer = %hello.peer_address,
            version = %hello.version,
            "peer joined"
        );
        let mut versions = self.peer_versions.lock().expect("peer registry poisoned");
        versions.insert(hello.peer_address, hello.version);
    }

    fn on_transaction(&self, tx_msg: TxMessage) {
        let tx = tx_msg.to_transaction();
        if self.mempool.has(&tx.tx_id) {
            tracing::debug!(tx = %tx_msg.tx_id, "transaction already staged");
            return;
        }
        tracing::info!(tx = %tx_msg.tx_id, "admitting transaction from gossip");
        self.mempool.add(tx);
        self.metrics
            .node
            .mempool_transactions
            .set(self.mempool.len() as i64);
    }

    fn on_block(&self, block_msg: BlockMessage) {
        let block = block_msg.to_block();
        match self.chain.add_block(block) {
            Ok(disposition) => {
                tracing::info!(
                    block = %block_msg.block_id,
                    ?disposition,
                    "accepted block from gossip"
                );
                self.metrics.node.blocks_received_total.inc();
                if disposition == BlockDisposition::Reorganized {
                    self.metrics.node.chain_reorgs_total.inc();
                }
                self.unstage_included(&block_msg.transactions);
                self.snapshot_after(disposition);

                // Relay as an inventory announcement so the flood
                // converges; peers that already know the hash ignore it.
                let inv = InvMessage {
                    hashes: vec![block_msg.block_id.clone()],
                    kind: message::DATA_TYPE_BLOCK.to_string(),
                };
                client::broadcast_inv(&inv, &self.peers);
            }
            Err(e) => {
                tracing::warn!(block = %block_msg.block_id, "rejected block from gossip: {e}");
            }
        }
    }

    fn on_get_blocks(&self, request: GetBlocksMessage) {
        match self
            .chain
            .fetch_blocks(request.start_height, request.end_height)
        {
            Ok(blocks) => {
                let reply = BlocksMessage { blocks };
                if let Err(e) = client::send_to_peer(&request.requesting_node, &reply) {
                    tracing::warn!(
                        peer = %request.requesting_node,
                        "failed to reply with blocks: {e}"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    peer = %request.requesting_node,
                    start = request.start_height,
                    end = request.end_height,
                    "cannot serve block range: {e}"
                );
            }
        }
    }

    fn on_blocks(&self, reply: BlocksMessage) {
        for block in reply.blocks {
            let id = hash::to_hex(&block.header.hash);
            let included: Vec<Vec<u8>> =
                block.transactions.iter().map(|tx| tx.tx_id.clone()).collect();
            match self.chain.add_block(block) {
                Ok(disposition) => {
                    tracing::info!(block = %id, ?disposition, "imported block from range reply");
                    self.metrics.node.blocks_received_total.inc();
                    if disposition == BlockDisposition::Reorganized {
                        self.metrics.node.chain_reorgs_total.inc();
                    }
                    for tx_id in &included {
                        self.mempool.remove(tx_id);
                    }
                    self.metrics
                        .node
                        .mempool_transactions
                        .set(self.mempool.len() as i64);
                    self.snapshot_after(disposition);
                }
                Err(e) => tracing::debug!(block = %id, "skipping block from range reply: {e}"),
            }
        }
    }

    /// Drops transactions that just landed in an accepted block.
    fn unstage_included(&self, transactions: &[TxMessage]) {
        for tx_msg in transactions {
            self.mempool.remove(&message::from_wire_bytes(&tx_msg.tx_id));
        }
        self.metrics
            .node
            .mempool_transactions
            .set(self.mempool.len() as i64);
    }

    fn on_inv(&self, inv: InvMessage) {
        for wire_hash in &inv.hashes {
            let key = message::from_wire_bytes(wire_hash);
            let known = match inv.kind.as_str() {
                message::DATA_TYPE_BLOCK => self.chain.has_block(&key),
                message::DATA_TYPE_TRANSACTION => self.mempool.has(&key),
                other => {
                    tracing::warn!(kind = %other, "ignoring inventory of unknown kind");
                    return;
                }
            };

            if known {
                continue;
            }

            // Ask everyone; the first responder wins and duplicate
            // replies are idempotent.
            let request = GetDataMessage {
                kind: inv.kind.clone(),
                hash: wire_hash.clone(),
                peer_address: self.listen_addr.clone(),
            };
            for peer in &self.peers {
                if let Err(e) = client::send_to_peer(peer, &request) {
                    tracing::warn!(peer = %peer, "failed to request missing item: {e}");
                }
            }
        }
    }

    fn on_get_data(&self, request: GetDataMessage) {
        let key = message::from_wire_bytes(&request.hash);
        match request.kind.as_str() {
            message::DATA_TYPE_BLOCK => match self.chain.get_block(&key) {
                Some(block) => {
                    let reply = BlockMessage::from_block(&block);
                    if let Err(e) = client::send_to_peer(&request.peer_address, &reply) {
                        tracing::warn!(
                            peer = %request.peer_address,
                            "failed to serve block: {e}"
                        );
                    }
                }
                None => tracing::info!(hash = %request.hash, "requested block not found"),
            },
            message::DATA_TYPE_TRANSACTION => match self.mempool.get(&key) {
                Some(tx) => {
                    let reply = TxMessage::from_transaction(&tx);
                    if let Err(e) = client::send_to_peer(&request.peer_address, &reply) {
                        tracing::warn!(
                            peer = %request.peer_address,
                            "failed to serve transaction: {e}"
                        );
                    }
                }
                None => tracing::info!(hash = %request.hash, "requested transaction not found"),
            },
            other => tracing::warn!(kind = %other, "ignoring data request of unknown kind"),
        }
    }

    fn snapshot_after(&self, disposition: BlockDisposition) {
        // Orphans do not change the main chain, so there is nothing
        // new to snapshot.
        if disposition == BlockDisposition::Orphaned {
            return;
        }
        if let Some(path) = &self.snapshot_path {
            if let Err(e) = self.chain.persist(path) {
                tracing::warn!("failed to persist chain snapshot: {e}");
            }
        }
    }
}
