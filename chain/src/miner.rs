//! Mining loop: transaction selection, VM execution, proof-of-work,
//! chain insertion, and broadcast.
//!
//! `mine_block` is single-shot; the node calls it in a loop. Broadcast
//! goes through the [`BlockBroadcaster`] seam so tests (and alternative
//! transports) can observe outbound blocks without a live mesh.

use std::fmt;
use std::sync::Arc;

use crate::consensus::{ChainError, ChainManager};
use crate::hash;
use crate::ipfs::ObjectStore;
use crate::mempool::Mempool;
use crate::network::client;
use crate::network::message::BlockMessage;
use crate::pow::{self, PowError};
use crate::types::{unix_nanos, Block, BlockHeader, Transaction, GENESIS_PREVIOUS_HASH};
use crate::vm;

/// Errors that stop a mining round.
#[derive(Debug)]
pub enum MinerError {
    /// The miner refuses to run without a difficulty target.
    EmptyDifficultyTarget,
    /// The nonce search failed; fatal at the node level.
    Pow(PowError),
    /// The chain rejected a block the miner had to insert.
    Chain(ChainError),
}

impl From<PowError> for MinerError {
    fn from(e: PowError) -> Self {
        MinerError::Pow(e)
    }
}

impl From<ChainError> for MinerError {
    fn from(e: ChainError) -> Self {
        MinerError::Chain(e)
    }
}

impl fmt::Display for MinerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinerError::EmptyDifficultyTarget => {
                write!(f, "mining difficulty target is empty")
            }
            MinerError::Pow(e) => write!(f, "{e}"),
            MinerError::Chain(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for MinerError {}

/// Outbound seam for freshly mined blocks.
pub trait BlockBroadcaster: Send + Sync {
    /// Sends a mined block to the given peers, best-effort.
    fn broadcast_block(&self, block: &BlockMessage, peers: &[String]);
}

/// Default broadcaster: dials every peer through the gossip client.
pub struct GossipBroadcaster;

impl BlockBroadcaster for GossipBroadcaster {
    fn broadcast_block(&self, block: &BlockMessage, peers: &[String]) {
        client::broadcast_block(block, peers);
    }
}

/// The mining engine.
pub struct Miner {
    mempool: Arc<Mempool>,
    chain: Arc<ChainManager>,
    store: Arc<dyn ObjectStore>,
    peers: Vec<String>,
    max_block_transactions: usize,
    difficulty_target: String,
    broadcaster: Box<dyn BlockBroadcaster>,
}

impl Miner {
    /// Creates a miner with the default gossip broadcaster.
    pub fn new(
        mempool: Arc<Mempool>,
        chain: Arc<ChainManager>,
        store: Arc<dyn ObjectStore>,
        peers: Vec<String>,
        max_block_transactions: usize,
        difficulty_target: impl Into<String>,
    ) -> Self {
        Self {
            mempool,
            chain,
            store,
            peers,
            max_block_transactions,
            difficulty_target: difficulty_target.into(),
            broadcaster: Box::new(GossipBroadcaster),
        }
    }

    /// Replaces the outbound broadcaster.
    pub fn set_broadcaster(&mut self, broadcaster: Box<dyn BlockBroadcaster>) {
        self.broadcaster = broadcaster;
    }

    /// Appends a genesis block if the chain is still empty.
    pub fn initialize_chain(&self) -> Result<(), ChainError> {
        if self.chain.height() == 0 {
            self.chain.add_block(Self::make_genesis())?;
            tracing::info!("genesis block added");
        }
        Ok(())
    }

    fn make_genesis() -> Block {
        let mut genesis = Block {
            header: BlockHeader {
                previous_hash: GENESIS_PREVIOUS_HASH.to_vec(),
                timestamp: unix_nanos(),
                ..BlockHeader::default()
            },
            transactions: Vec::new(),
        };
        genesis.compute_merkle_root();
        // Genesis never passes through proof-of-work, so its identity
        // is the canonical header hash.
        genesis.header.hash = genesis.compute_hash();
        genesis
    }

    /// Selects up to `max_block_transactions` staged transactions.
    ///
    /// Selection order is unspecified; callers must not rely on it.
    pub fn pick_transactions(&self) -> Vec<Transaction> {
        let mut transactions = self.mempool.all();
        transactions.truncate(self.max_block_transactions);
        transactions
    }

    /// Mines one block.
    ///
    /// Returns `Ok(None)` when there is nothing to mine or the chain
    /// rejected the freshly mined block (a concurrent miner won that
    /// height). A transaction whose inputs cannot be fetched, or whose
    /// execution fails, stays in the block with an empty output; it
    /// never fails the whole block.
    pub fn mine_block(&self) -> Result<Option<Block>, MinerError> {
        if self.difficulty_target.is_empty() {
            return Err(MinerError::EmptyDifficultyTarget);
        }

        if self.mempool.is_empty() {
            tracing::debug!("mempool empty, skipping mining round");
            return Ok(None);
        }

        if self.chain.height() == 0 {
            self.chain.add_block(Self::make_genesis())?;
            tracing::info!("genesis block mined");
        }

        let mut transactions = self.pick_transactions();
        if transactions.is_empty() {
            return Ok(None);
        }

        for tx in transactions.iter_mut() {
            if tx.data_hash.is_empty() || tx.algorithm_hash.is_empty() {
                tracing::warn!(
                    tx = %hash::to_hex(&tx.tx_id),
                    "transaction has incomplete fields, skipping execution"
                );
                continue;
            }

            let (data, algorithm) =
                match self.store.fetch_inputs(&tx.data_hash, &tx.algorithm_hash) {
                    Ok(inputs) => inputs,
                    Err(e) => {
                        tracing::warn!(
                            tx = %hash::to_hex(&tx.tx_id),
                            "failed to fetch inputs, skipping execution: {e}"
                        );
                        continue;
                    }
                };

            match vm::run(&algorithm, &data) {
                Ok(output) => tx.vm_output = output,
                Err(e) => {
                    tracing::warn!(
                        tx = %hash::to_hex(&tx.tx_id),
                        "VM execution failed, skipping: {e}"
                    );
                }
            }
        }

        let tip_hash = self
            .chain
            .tip()
            .map(|tip| tip.header.hash)
            .unwrap_or_default();

        let mut block = Block {
            header: BlockHeader {
                previous_hash: tip_hash,
                timestamp: unix_nanos(),
                nonce: 0,
                ..BlockHeader::default()
            },
            transactions,
        };

        block.compute_merkle_root();
        block.compute_vm_outputs_hash();

        if self.chain.has_merkle_root(&block.header.merkle_root) {
            tracing::warn!(
                root = %hash::to_hex(&block.header.merkle_root),
                "Merkle root already on chain, bumping timestamp"
            );
            block.header.timestamp = unix_nanos();
            block.compute_merkle_root();
        }

        let preimage = block.header.bytes();
        let (nonce, hash_hex) = pow::perform_proof_of_work(&preimage, &self.difficulty_target)?;
        block.header.nonce = nonce;
        block.header.hash = hash_hex.into_bytes();

        if let Err(e) = self.chain.add_block(block.clone()) {
            tracing::warn!("chain rejected mined block: {e}");
            return Ok(None);
        }

        tracing::info!(
            block = %hash::to_hex(&block.header.hash),
            transactions = block.transactions.len(),
            nonce = block.header.nonce,
            "block mined"
        );

        let message = BlockMessage::from_block(&block);
        self.broadcaster.broadcast_block(&message, &self.peers);

        for tx in &block.transactions {
            self.mempool.remove(&tx.tx_id);
        }

        Ok(Some(block))
    }
}
