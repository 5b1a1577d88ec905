//! HTTP client for an IPFS-compatible object store.
//!
//! This implementation of [`crate::ipfs::ObjectStore`] talks to the
//! IPFS HTTP API:
//!
//! - `POST /api/v0/cat?arg=<cid>` resolves a content identifier,
//! - `POST /api/v0/add` stores bytes and returns `{"Name":..,"Hash":..}`,
//! - `POST /api/v0/pin/add?arg=<cid>` / `pin/rm` control retention.
//!
//! The client is thread-safe (`Send + Sync`) and keeps a read-through
//! cache of fetched objects. It uses the blocking `reqwest` client
//! internally; callers in async contexts can wrap fetches in blocking
//! tasks.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use std::thread;
use std::time::Duration;

use reqwest::blocking::{multipart, Client};
use serde::Deserialize;

use super::{ObjectStore, StoreError};

/// Blocking client for the IPFS HTTP API.
pub struct HttpGatewayClient {
    base_url: String,
    client: Client,
    cache: RwLock<HashMap<String, Vec<u8>>>,
}

/// Response payload of `POST /api/v0/add`.
#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

impl HttpGatewayClient {
    /// Constructs a new client pointing at `base_url`.
    ///
    /// `base_url` should be the root of the IPFS API, e.g.
    /// `"http://127.0.0.1:5001"` (without a trailing slash). `timeout`
    /// is the default per-request deadline.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into(),
            client,
            cache: RwLock::new(HashMap::new()),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        // Avoid accidental double slashes.
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn cache_get(&self, cid: &str) -> Option<Vec<u8>> {
        self.cache
            .read()
            .expect("object cache lock poisoned")
            .get(cid)
            .cloned()
    }

    fn cache_put(&self, cid: &str, bytes: &[u8]) {
        self.cache
            .write()
            .expect("object cache lock poisoned")
            .insert(cid.to_string(), bytes.to_vec());
    }

    fn cat(&self, cid: &str, deadline: Option<Duration>) -> Result<Vec<u8>, StoreError> {
        if let Some(bytes) = self.cache_get(cid) {
            return Ok(bytes);
        }

        let url = self.endpoint("/api/v0/cat");
        let mut request = self.client.post(&url).query(&[("arg", cid)]);
        if let Some(deadline) = deadline {
            request = request.timeout(deadline);
        }

        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                StoreError::Timeout(cid.to_string())
            } else {
                StoreError::Transport(format!("POST {url} failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Gateway(format!(
                "cat {cid} returned HTTP status {status}"
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|e| StoreError::Transport(format!("reading cat body failed: {e}")))?
            .to_vec();

        if bytes.is_empty() {
            return Err(StoreError::EmptyObject(cid.to_string()));
        }

        self.cache_put(cid, &bytes);
        Ok(bytes)
    }

    /// Fetches `cid` with an explicit per-request deadline.
    pub fn fetch_data_with_timeout(
        &self,
        cid: &str,
        deadline: Duration,
    ) -> Result<Vec<u8>, StoreError> {
        self.cat(cid, Some(deadline))
    }

    /// Fetches `cid`, retrying up to `retries` times with `delay`
    /// between attempts. Returns the last error when every attempt
    /// fails.
    pub fn fetch_data_with_retry(
        &self,
        cid: &str,
        retries: usize,
        delay: Duration,
    ) -> Result<Vec<u8>, StoreError> {
        let mut last = StoreError::Transport("no fetch attempts were made".to_string());
        for _ in 0..retries.max(1) {
            match self.cat(cid, None) {
                Ok(bytes) => return Ok(bytes),
                Err(e) => last = e,
            }
            thread::sleep(delay);
        }
        Err(last)
    }

    fn upload(&self, part: multipart::Part) -> Result<String, StoreError> {
        let url = self.endpoint("/api/v0/add");
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .map_err(|e| StoreError::Transport(format!("POST {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Gateway(format!(
                "add returned HTTP status {status}"
            )));
        }

        let body: AddResponse = response
            .json()
            .map_err(|e| StoreError::Gateway(format!("failed to parse add response: {e}")))?;

        Ok(body.hash)
    }

    fn pin_request(&self, path: &str, cid: &str) -> Result<(), StoreError> {
        let url = self.endpoint(path);
        let response = self
            .client
            .post(&url)
            .query(&[("arg", cid)])
            .send()
            .map_err(|e| StoreError::Transport(format!("POST {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Gateway(format!(
                "{path} for {cid} returned HTTP status {status}"
            )));
        }
        Ok(())
    }
}

impl ObjectStore for HttpGatewayClient {
    fn fetch_data(&self, cid: &str) -> Result<Vec<u8>, StoreError> {
        self.cat(cid, None)
    }

    fn fetch_algorithm(&self, cid: &str) -> Result<Vec<u8>, StoreError> {
        // Algorithms resolve the same way datasets do.
        self.cat(cid, None)
    }

    fn upload_data(&self, data: &[u8]) -> Result<String, StoreError> {
        tracing::debug!(bytes = data.len(), "uploading data to object store");
        let part = multipart::Part::bytes(data.to_vec()).file_name("data");
        self.upload(part)
    }

    fn upload_file(&self, path: &Path) -> Result<String, StoreError> {
        let bytes = std::fs::read(path)
            .map_err(|e| StoreError::Transport(format!("reading {} failed: {e}", path.display())))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let part = multipart::Part::bytes(bytes).file_name(name);
        self.upload(part)
    }

    fn pin(&self, cid: &str) -> Result<(), StoreError> {
        self.pin_request("/api/v0/pin/add", cid)
    }

    fn unpin(&self, cid: &str) -> Result<(), StoreError> {
        self.pin_request("/api/v0/pin/rm", cid)
    }
}
