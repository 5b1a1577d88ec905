//! Object-store interface.
//!
//! The chain treats the content-addressed object store as an external
//! collaborator behind the [`ObjectStore`] trait: `fetch` resolves an
//! opaque content identifier to bytes, `upload` does the reverse, and
//! pinning controls retention. The reference backend is an IPFS HTTP
//! API ([`http::HttpGatewayClient`]); any backend satisfying the trait
//! can be substituted.

use std::fmt;
use std::path::Path;

pub mod http;

pub use http::HttpGatewayClient;

/// Errors that can occur while talking to the object store.
#[derive(Debug)]
pub enum StoreError {
    /// Transport-level failure (connection refused, TLS, etc.).
    Transport(String),
    /// The gateway answered with a non-success status or bad payload.
    Gateway(String),
    /// The object resolved to zero bytes.
    EmptyObject(String),
    /// The fetch deadline elapsed before the object arrived.
    Timeout(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Transport(msg) => write!(f, "store transport error: {msg}"),
            StoreError::Gateway(msg) => write!(f, "store gateway error: {msg}"),
            StoreError::EmptyObject(cid) => write!(f, "store returned empty object for {cid}"),
            StoreError::Timeout(cid) => write!(f, "store fetch timed out for {cid}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Abstract content-addressed object store.
///
/// Implementations must be shareable across tasks; fetches may block.
pub trait ObjectStore: Send + Sync {
    /// Resolves a dataset content identifier to its bytes.
    fn fetch_data(&self, cid: &str) -> Result<Vec<u8>, StoreError>;

    /// Resolves an algorithm content identifier to its bytes.
    fn fetch_algorithm(&self, cid: &str) -> Result<Vec<u8>, StoreError>;

    /// Resolves a transaction's dataset and algorithm in one call.
    ///
    /// A content-addressed store cannot resolve a transaction id, so
    /// this takes the two content identifiers directly and fails on
    /// the first unresolvable one.
    fn fetch_inputs(
        &self,
        data_cid: &str,
        algorithm_cid: &str,
    ) -> Result<(Vec<u8>, Vec<u8>), StoreError> {
        let data = self.fetch_data(data_cid)?;
        let algorithm = self.fetch_algorithm(algorithm_cid)?;
        Ok((data, algorithm))
    }

    /// Stores `data` and returns its content identifier.
    fn upload_data(&self, data: &[u8]) -> Result<String, StoreError>;

    /// Stores the file at `path` and returns its content identifier.
    fn upload_file(&self, path: &Path) -> Result<String, StoreError>;

    /// Pins `cid` so the backend retains it.
    fn pin(&self, cid: &str) -> Result<(), StoreError>;

    /// Removes the pin for `cid`.
    fn unpin(&self, cid: &str) -> Result<(), StoreError>;
}

/// Canned in-memory store.
///
/// Useful for tests and for isolating miner and validation logic from
/// a live gateway, in the same spirit as an accept-all validator.
pub struct MockStore {
    data: Vec<u8>,
    algorithm: Vec<u8>,
    fail: bool,
}

impl MockStore {
    /// A store whose fetches succeed with the given payloads.
    pub fn with_payloads(data: Vec<u8>, algorithm: Vec<u8>) -> Self {
        Self {
            data,
            algorithm,
            fail: false,
        }
    }

    /// A store whose fetches succeed with fixed placeholder payloads.
    pub fn valid() -> Self {
        Self::with_payloads(b"mock data".to_vec(), b"mock algorithm".to_vec())
    }

    /// A store whose every operation fails.
    pub fn failing() -> Self {
        Self {
            data: Vec::new(),
            algorithm: Vec::new(),
            fail: true,
        }
    }

    fn guard(&self, cid: &str) -> Result<(), StoreError> {
        if self.fail {
            Err(StoreError::Gateway(format!("mock failure for {cid}")))
        } else {
            Ok(())
        }
    }
}

impl ObjectStore for MockStore {
    fn fetch_data(&self, cid: &str) -> Result<Vec<u8>, StoreError> {
        self.guard(cid)?;
        Ok(self.data.clone())
    }

    fn fetch_algorithm(&self, cid: &str) -> Result<Vec<u8>, StoreError> {
        self.guard(cid)?;
        Ok(self.algorithm.clone())
    }

    fn upload_data(&self, data: &[u8]) -> Result<String, StoreError> {
        self.guard("upload")?;
        Ok(crate::hash::to_hex(&crate::hash::sha256(data)))
    }

    fn upload_file(&self, path: &Path) -> Result<String, StoreError> {
        self.guard("upload")?;
        Ok(crate::hash::to_hex(&crate::hash::sha256(
            path.to_string_lossy().as_bytes(),
        )))
    }

    fn pin(&self, cid: &str) -> Result<(), StoreError> {
        self.guard(cid)
    }

    fn unpin(&self, cid: &str) -> Result<(), StoreError> {
        self.guard(cid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_store_returns_configured_payloads() {
        let store = MockStore::with_payloads(b"d".to_vec(), b"a".to_vec());
        assert_eq!(store.fetch_data("cid").unwrap(), b"d");
        assert_eq!(store.fetch_algorithm("cid").unwrap(), b"a");
    }

    #[test]
    fn fetch_inputs_composes_both_fetches() {
        let store = MockStore::with_payloads(b"d".to_vec(), b"a".to_vec());
        let (data, algo) = store.fetch_inputs("cid1", "cid2").unwrap();
        assert_eq!(data, b"d");
        assert_eq!(algo, b"a");
    }

    #[test]
    fn failing_store_fails_every_operation() {
        let store = MockStore::failing();
        assert!(store.fetch_data("cid").is_err());
        assert!(store.fetch_inputs("a", "b").is_err());
        assert!(store.upload_data(b"x").is_err());
        assert!(store.pin("cid").is_err());
    }

    #[test]
    fn upload_ids_are_content_derived() {
        let store = MockStore::valid();
        let a = store.upload_data(b"same").unwrap();
        let b = store.upload_data(b"same").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn object_store_is_object_safe() {
        fn use_trait_object(store: &dyn ObjectStore) -> bool {
            store.fetch_data("cid").is_ok()
        }
        assert!(use_trait_object(&MockStore::valid()));
    }
}
