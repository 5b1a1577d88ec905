// chain/src/types/block.rs

//! Block and header types, hashing, and store-backed validation.
//!
//! The header carries two distinct hash roles: `hash` is the block's
//! identity (for mined blocks, the lowercase-hex proof-of-work digest;
//! for genesis blocks, the canonical header hash), while
//! [`BlockHeader::bytes`] is the proof-of-work preimage with a fixed
//! byte layout that must not change across nodes.

use serde::{Deserialize, Serialize};

use crate::hash;
use crate::ipfs::ObjectStore;

use super::Transaction;

/// `previous_hash` sentinel carried by the block at height 0.
///
/// Producers must never emit a block hash equal to this byte string.
pub const GENESIS_PREVIOUS_HASH: &[u8] = b"GENESIS";

/// Block header.
///
/// Hash-valued fields are plain byte strings rather than fixed-size
/// digests because the genesis sentinel and mined block identities
/// (hex text) are not digest-shaped.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Hash of the block this one extends, or the genesis sentinel.
    pub previous_hash: Vec<u8>,
    /// Creation time in nanoseconds since Unix epoch.
    pub timestamp: i64,
    /// Proof-of-work nonce.
    pub nonce: u64,
    /// Merkle root over the transaction ids.
    pub merkle_root: Vec<u8>,
    /// Reserved; not consulted during validation.
    pub difficulty: u32,
    /// SHA-256 over the concatenated VM outputs, block order.
    pub vm_outputs_hash: Vec<u8>,
    /// The block's own identity.
    pub hash: Vec<u8>,
}

impl BlockHeader {
    /// Returns the proof-of-work preimage for this header.
    ///
    /// Layout is exactly `previous_hash ‖ ascii(timestamp) ‖ "|" ‖
    /// hex(merkle_root)`. Changing this breaks interoperability with
    /// every other node, so treat it as frozen.
    pub fn bytes(&self) -> Vec<u8> {
        let mut out = self.previous_hash.clone();
        out.extend_from_slice(
            format!("{}|{}", self.timestamp, hash::to_hex(&self.merkle_root)).as_bytes(),
        );
        out
    }

    /// Returns the canonical byte representation of this header.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails, which would be a programming error.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("BlockHeader should always be serializable as JSON")
    }
}

/// Block = header + ordered list of transactions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Recomputes the Merkle root over the transaction ids.
    ///
    /// Empty transaction lists yield an empty root.
    pub fn compute_merkle_root(&mut self) {
        let leaves: Vec<Vec<u8>> = self
            .transactions
            .iter()
            .map(|tx| tx.tx_id.clone())
            .collect();
        self.header.merkle_root = hash::merkle_root(&leaves);
    }

    /// Recomputes the digest over the concatenated VM outputs.
    ///
    /// Empty transaction lists yield an empty digest.
    pub fn compute_vm_outputs_hash(&mut self) {
        if self.transactions.is_empty() {
            self.header.vm_outputs_hash = Vec::new();
            return;
        }

        let mut outputs = Vec::new();
        for tx in &self.transactions {
            outputs.extend_from_slice(&tx.vm_output);
        }
        self.header.vm_outputs_hash = hash::sha256(&outputs).to_vec();
    }

    /// Computes the canonical SHA-256 hash of the header.
    ///
    /// This is the identity used for blocks that never pass through
    /// proof-of-work (the genesis block). Mined blocks instead carry
    /// the PoW digest assigned by the miner.
    pub fn compute_hash(&self) -> Vec<u8> {
        hash::sha256(&self.header.canonical_bytes()).to_vec()
    }

    /// Returns `true` if this block carries the genesis sentinel.
    pub fn is_genesis(&self) -> bool {
        self.header.previous_hash == GENESIS_PREVIOUS_HASH
    }

    /// Validates the transaction list against the object store.
    ///
    /// The list must be non-empty and free of duplicate ids; every
    /// transaction must carry non-empty metadata and both of its
    /// content identifiers must resolve to non-empty bytes.
    pub fn validate_transactions(&self, store: &dyn ObjectStore) -> bool {
        if self.transactions.is_empty() {
            return false;
        }

        let mut seen: std::collections::HashSet<&[u8]> = std::collections::HashSet::new();
        for tx in &self.transactions {
            if !seen.insert(&tx.tx_id) {
                return false;
            }
            if tx.metadata.is_empty() {
                return false;
            }
            match store.fetch_inputs(&tx.data_hash, &tx.algorithm_hash) {
                Ok((data, algo)) if !data.is_empty() && !algo.is_empty() => {}
                _ => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipfs::MockStore;

    fn dummy_tx(byte: u8) -> Transaction {
        let mut tx = Transaction {
            data_hash: format!("QmData{byte}"),
            algorithm_hash: format!("QmAlgo{byte}"),
            metadata: "block test".to_string(),
            ..Transaction::default()
        };
        tx.tx_id = vec![byte; hash::DIGEST_LEN];
        tx.vm_output = vec![byte, byte];
        tx
    }

    fn dummy_block(txs: Vec<Transaction>) -> Block {
        Block {
            header: BlockHeader {
                previous_hash: b"parent".to_vec(),
                timestamp: 1_700_000_000_000_000_000,
                ..BlockHeader::default()
            },
            transactions: txs,
        }
    }

    #[test]
    fn header_bytes_layout_is_fixed() {
        let header = BlockHeader {
            previous_hash: b"prev".to_vec(),
            timestamp: 42,
            merkle_root: vec![0xAB, 0xCD],
            ..BlockHeader::default()
        };

        assert_eq!(header.bytes(), b"prev42|abcd".to_vec());
    }

    #[test]
    fn merkle_root_matches_manual_combine_for_two_txs() {
        let mut block = dummy_block(vec![dummy_tx(1), dummy_tx(2)]);
        block.compute_merkle_root();

        let mut combined = vec![1u8; hash::DIGEST_LEN];
        combined.extend_from_slice(&[2u8; hash::DIGEST_LEN]);
        assert_eq!(block.header.merkle_root, hash::sha256(&combined).to_vec());
    }

    #[test]
    fn odd_transaction_count_promotes_trailing_id() {
        let mut block = dummy_block(vec![dummy_tx(1), dummy_tx(2), dummy_tx(3)]);
        block.compute_merkle_root();

        let mut ab = vec![1u8; hash::DIGEST_LEN];
        ab.extend_from_slice(&[2u8; hash::DIGEST_LEN]);
        let mut top = hash::sha256(&ab).to_vec();
        top.extend_from_slice(&[3u8; hash::DIGEST_LEN]);

        assert_eq!(block.header.merkle_root, hash::sha256(&top).to_vec());
    }

    #[test]
    fn empty_block_has_empty_merkle_root_and_outputs_hash() {
        let mut block = dummy_block(Vec::new());
        block.compute_merkle_root();
        block.compute_vm_outputs_hash();

        assert!(block.header.merkle_root.is_empty());
        assert!(block.header.vm_outputs_hash.is_empty());
    }

    #[test]
    fn vm_outputs_hash_covers_outputs_in_block_order() {
        let mut block = dummy_block(vec![dummy_tx(1), dummy_tx(2)]);
        block.compute_vm_outputs_hash();

        let expected = hash::sha256(&[1u8, 1, 2, 2]).to_vec();
        assert_eq!(block.header.vm_outputs_hash, expected);
    }

    #[test]
    fn recomputing_roots_and_hash_is_idempotent() {
        let mut block = dummy_block(vec![dummy_tx(1), dummy_tx(2)]);
        block.compute_merkle_root();
        block.compute_vm_outputs_hash();

        let root = block.header.merkle_root.clone();
        let outputs = block.header.vm_outputs_hash.clone();
        let hash1 = block.compute_hash();

        block.compute_merkle_root();
        block.compute_vm_outputs_hash();
        let hash2 = block.compute_hash();

        assert_eq!(block.header.merkle_root, root);
        assert_eq!(block.header.vm_outputs_hash, outputs);
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), hash::DIGEST_LEN);
    }

    #[test]
    fn validate_transactions_accepts_well_formed_block() {
        let store = MockStore::with_payloads(b"data".to_vec(), b"algo".to_vec());
        let block = dummy_block(vec![dummy_tx(1), dummy_tx(2)]);
        assert!(block.validate_transactions(&store));
    }

    #[test]
    fn validate_transactions_rejects_empty_block() {
        let store = MockStore::with_payloads(b"data".to_vec(), b"algo".to_vec());
        let block = dummy_block(Vec::new());
        assert!(!block.validate_transactions(&store));
    }

    #[test]
    fn validate_transactions_rejects_duplicate_ids() {
        let store = MockStore::with_payloads(b"data".to_vec(), b"algo".to_vec());
        let block = dummy_block(vec![dummy_tx(1), dummy_tx(1)]);
        assert!(!block.validate_transactions(&store));
    }

    #[test]
    fn validate_transactions_rejects_empty_metadata() {
        let store = MockStore::with_payloads(b"data".to_vec(), b"algo".to_vec());
        let mut tx = dummy_tx(1);
        tx.metadata = String::new();
        let block = dummy_block(vec![tx]);
        assert!(!block.validate_transactions(&store));
    }

    #[test]
    fn validate_transactions_rejects_unresolvable_inputs() {
        let store = MockStore::failing();
        let block = dummy_block(vec![dummy_tx(1)]);
        assert!(!block.validate_transactions(&store));
    }
}
