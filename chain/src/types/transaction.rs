// chain/src/types/transaction.rs

//! Transaction model and id derivation.
//!
//! A transaction references an input dataset and an algorithm by opaque
//! content identifiers supplied by the object store. The miner executes
//! the algorithm against the dataset and stores the result in
//! `vm_output`; everything else is immutable once the id is derived.

use serde::{Deserialize, Serialize};

use crate::hash;
use crate::ipfs::{ObjectStore, StoreError};

use super::unix_nanos;

/// A compute transaction.
///
/// `tx_id` is the SHA-256 digest of the canonical serde_json encoding
/// of the transaction with `vm_output` cleared and `timestamp` already
/// stamped, so the id commits to every field except the execution
/// result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction id, derived by [`Transaction::generate_tx_id`].
    pub tx_id: Vec<u8>,
    /// Content identifier of the input dataset.
    pub data_hash: String,
    /// Content identifier of the algorithm to execute.
    pub algorithm_hash: String,
    /// Free-form description attached by the producer.
    pub metadata: String,
    /// Execution result, populated by the miner; empty until executed.
    pub vm_output: Vec<u8>,
    /// Creation time in nanoseconds since Unix epoch.
    pub timestamp: i64,
}

impl Transaction {
    /// Returns the canonical byte representation of this transaction.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails. This is considered a programming
    /// error, because all fields are required to be serializable.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("Transaction should always be serializable as JSON")
    }

    /// Derives and stores the transaction id.
    ///
    /// Clears `vm_output`, stamps `timestamp` with the current
    /// nanosecond clock, and hashes the canonical encoding. The id is
    /// therefore independent of any later execution result but changes
    /// whenever any other field changes.
    pub fn generate_tx_id(&mut self) {
        self.vm_output = Vec::new();
        self.timestamp = unix_nanos();
        let digest = hash::sha256(&self.canonical_bytes());
        self.tx_id = digest.to_vec();
    }

    /// Resolves this transaction's dataset and algorithm via the store.
    pub fn fetch_inputs(&self, store: &dyn ObjectStore) -> Result<(Vec<u8>, Vec<u8>), StoreError> {
        store.fetch_inputs(&self.data_hash, &self.algorithm_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipfs::MockStore;

    fn dummy_tx(data: &str, algo: &str) -> Transaction {
        Transaction {
            data_hash: data.to_string(),
            algorithm_hash: algo.to_string(),
            metadata: "test transaction".to_string(),
            ..Transaction::default()
        }
    }

    #[test]
    fn generate_tx_id_sets_digest_and_clears_output() {
        let mut tx = dummy_tx("QmData", "QmAlgo");
        tx.vm_output = vec![1, 2, 3];
        tx.generate_tx_id();

        assert_eq!(tx.tx_id.len(), hash::DIGEST_LEN);
        assert!(tx.vm_output.is_empty());
        assert!(tx.timestamp > 0);
    }

    #[test]
    fn tx_id_commits_to_the_cleared_output_form() {
        // A stale execution result must not leak into the id: the
        // derivation clears it before hashing.
        let mut tx = dummy_tx("QmData", "QmAlgo");
        tx.vm_output = b"stale result".to_vec();
        tx.generate_tx_id();

        // Recompute the digest over the preimage form: output and id
        // both empty, timestamp as stamped.
        let mut preimage = tx.clone();
        preimage.tx_id = Vec::new();
        let recomputed = hash::sha256(&preimage.canonical_bytes()).to_vec();

        assert_eq!(recomputed, tx.tx_id);
    }

    #[test]
    fn tx_id_changes_when_any_other_field_changes() {
        let mut base = dummy_tx("QmData", "QmAlgo");
        base.timestamp = 1_700_000_000;
        let base_digest = hash::sha256(&base.canonical_bytes()).to_vec();

        let mut other_data = base.clone();
        other_data.data_hash = "QmOther".to_string();
        assert_ne!(
            hash::sha256(&other_data.canonical_bytes()).to_vec(),
            base_digest
        );

        let mut other_meta = base.clone();
        other_meta.metadata = "changed".to_string();
        assert_ne!(
            hash::sha256(&other_meta.canonical_bytes()).to_vec(),
            base_digest
        );

        let mut other_ts = base.clone();
        other_ts.timestamp += 1;
        assert_ne!(
            hash::sha256(&other_ts.canonical_bytes()).to_vec(),
            base_digest
        );
    }

    #[test]
    fn distinct_transactions_get_distinct_ids() {
        let mut a = dummy_tx("QmDataA", "QmAlgo");
        let mut b = dummy_tx("QmDataB", "QmAlgo");
        a.generate_tx_id();
        b.generate_tx_id();
        assert_ne!(a.tx_id, b.tx_id);
    }

    #[test]
    fn fetch_inputs_resolves_both_cids() {
        let store = MockStore::with_payloads(b"dataset".to_vec(), b"KMeans".to_vec());
        let mut tx = dummy_tx("QmData", "QmAlgo");
        tx.generate_tx_id();

        let (data, algo) = tx.fetch_inputs(&store).expect("inputs should resolve");
        assert_eq!(data, b"dataset");
        assert_eq!(algo, b"KMeans");
    }

    #[test]
    fn fetch_inputs_propagates_store_failure() {
        let store = MockStore::failing();
        let tx = dummy_tx("QmData", "QmAlgo");
        assert!(tx.fetch_inputs(&store).is_err());
    }
}
