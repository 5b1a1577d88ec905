//! Mutex-guarded staging area for unconfirmed transactions.
//!
//! Transactions enter on admission (CLI or gossip) and leave when a
//! block containing them is accepted, or on explicit removal. The map
//! is keyed by raw transaction id; iteration order is unspecified and
//! callers must not rely on it.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::Transaction;

/// Pool of unconfirmed transactions keyed by transaction id.
#[derive(Default)]
pub struct Mempool {
    inner: Mutex<HashMap<Vec<u8>, Transaction>>,
}

impl Mempool {
    /// Creates a new, empty mempool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a transaction. Re-adding an existing id is a silent no-op.
    pub fn add(&self, tx: Transaction) {
        let mut pool = self.inner.lock().expect("mempool lock poisoned");
        pool.entry(tx.tx_id.clone()).or_insert(tx);
    }

    /// Returns `true` if a transaction with this id is staged.
    pub fn has(&self, tx_id: &[u8]) -> bool {
        let pool = self.inner.lock().expect("mempool lock poisoned");
        pool.contains_key(tx_id)
    }

    /// Fetches a staged transaction by id, if present.
    pub fn get(&self, tx_id: &[u8]) -> Option<Transaction> {
        let pool = self.inner.lock().expect("mempool lock poisoned");
        pool.get(tx_id).cloned()
    }

    /// Removes a transaction by id. Missing ids are ignored.
    pub fn remove(&self, tx_id: &[u8]) {
        let mut pool = self.inner.lock().expect("mempool lock poisoned");
        pool.remove(tx_id);
    }

    /// Returns every staged transaction, in unspecified order.
    pub fn all(&self) -> Vec<Transaction> {
        let pool = self.inner.lock().expect("mempool lock poisoned");
        pool.values().cloned().collect()
    }

    /// Returns the number of staged transactions.
    pub fn len(&self) -> usize {
        let pool = self.inner.lock().expect("mempool lock poisoned");
        pool.len()
    }

    /// Returns `true` if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
