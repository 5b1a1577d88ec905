//! Proof-of-work search and validation.
//!
//! The difficulty target is an ASCII string of zero characters; a
//! header wins when the lowercase hex encoding of
//! `SHA256(preimage ‖ big-endian nonce)` starts with that prefix. The
//! search is deterministic: it starts at nonce 0 and increments by 1.

use std::fmt;

use crate::hash;

/// Errors that can occur during the nonce search.
#[derive(Debug)]
pub enum PowError {
    /// The nonce space was exhausted. Fatal at the node level.
    NonceOverflow,
}

impl fmt::Display for PowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowError::NonceOverflow => write!(f, "nonce overflow, proof-of-work failed"),
        }
    }
}

impl std::error::Error for PowError {}

/// Appends the 8-byte big-endian nonce to the header preimage.
fn serialize_header(preimage: &[u8], nonce: u64) -> Vec<u8> {
    let mut out = preimage.to_vec();
    out.extend_from_slice(&nonce.to_be_bytes());
    out
}

/// Searches for a nonce whose hash satisfies the difficulty target.
///
/// Returns the winning nonce and the lowercase hex hash. The target
/// prefix is a run of `'0'` characters with the same length as
/// `difficulty`; an empty difficulty is satisfied immediately.
pub fn perform_proof_of_work(
    preimage: &[u8],
    difficulty: &str,
) -> Result<(u64, String), PowError> {
    let target = "0".repeat(difficulty.len());
    let mut nonce: u64 = 0;

    loop {
        let digest = hash::sha256(&serialize_header(preimage, nonce));
        let encoded = hash::to_hex(&digest);

        if encoded.starts_with(&target) {
            return Ok((nonce, encoded));
        }

        nonce = nonce.checked_add(1).ok_or(PowError::NonceOverflow)?;
    }
}

/// Recomputes the hash for `(preimage, nonce)` and checks the prefix.
pub fn validate_proof_of_work(preimage: &[u8], nonce: u64, difficulty: &str) -> bool {
    let digest = hash::sha256(&serialize_header(preimage, nonce));
    hash::to_hex(&digest).starts_with(difficulty)
}
