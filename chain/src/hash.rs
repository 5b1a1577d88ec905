//! SHA-256 primitives shared across the chain.
//!
//! Every digest in this system (transaction ids, Merkle roots, block
//! hashes, proof-of-work) is SHA-256. This module wraps the raw digest,
//! the Merkle combine step, and lowercase hex encoding so the rest of
//! the crate never touches the hasher API directly.

use sha2::{Digest, Sha256};

/// Length in bytes of every SHA-256 digest used by the chain.
pub const DIGEST_LEN: usize = 32;

/// Computes the SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; DIGEST_LEN] {
    let digest = Sha256::digest(data);
    digest.into()
}

/// Encodes a digest (or any byte string) as lowercase hex.
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Computes the Merkle root of an ordered list of leaf hashes.
///
/// Adjacent pairs are combined as `SHA256(left ‖ right)`. When a level
/// has an odd trailing element it is promoted unchanged to the next
/// level (not duplicated). An empty list yields an empty root.
pub fn merkle_root(leaves: &[Vec<u8>]) -> Vec<u8> {
    if leaves.is_empty() {
        return Vec::new();
    }

    let mut level: Vec<Vec<u8>> = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        for pair in level.chunks(2) {
            if pair.len() == 2 {
                let mut combined = pair[0].clone();
                combined.extend_from_slice(&pair[1]);
                next.push(sha256(&combined).to_vec());
            } else {
                next.push(pair[0].clone());
            }
        }
        level = next;
    }
    level.swap_remove(0)
}
