//! Core domain types used by the chain.
//!
//! This module defines the transaction and block models together with
//! their canonical serialization and hashing rules. The canonical byte
//! form of every hashed structure is its serde_json encoding in struct
//! declaration order; the encoding is byte-stable for byte-equal input,
//! which is what transaction ids, Merkle roots, and block hashes depend
//! on.

use std::time::{SystemTime, UNIX_EPOCH};

pub mod block;
pub mod transaction;

pub use block::{Block, BlockHeader, GENESIS_PREVIOUS_HASH};
pub use transaction::Transaction;

/// Returns the current wall-clock time in nanoseconds since Unix epoch.
///
/// On error (system clock before epoch) this falls back to 0.
pub fn unix_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}
