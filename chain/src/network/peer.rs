//! Peer-list file handling.
//!
//! Peers are provided statically as a JSON array of `{host, port}`
//! objects; there is no discovery.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// A peer's address.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    pub host: String,
    pub port: String,
}

impl Peer {
    /// Returns the dialable `host:port` form.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Errors that can occur while reading or writing the peer list.
#[derive(Debug)]
pub enum PeerFileError {
    Io(std::io::Error),
    Codec(serde_json::Error),
}

impl From<std::io::Error> for PeerFileError {
    fn from(e: std::io::Error) -> Self {
        PeerFileError::Io(e)
    }
}

impl From<serde_json::Error> for PeerFileError {
    fn from(e: serde_json::Error) -> Self {
        PeerFileError::Codec(e)
    }
}

impl fmt::Display for PeerFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerFileError::Io(e) => write!(f, "peer list I/O error: {e}"),
            PeerFileError::Codec(e) => write!(f, "peer list codec error: {e}"),
        }
    }
}

impl std::error::Error for PeerFileError {}

/// Loads peers from a JSON file.
pub fn load_peers(path: &Path) -> Result<Vec<Peer>, PeerFileError> {
    let file = File::open(path)?;
    let peers = serde_json::from_reader(BufReader::new(file))?;
    Ok(peers)
}

/// Saves the peer list to a JSON file.
pub fn save_peers(path: &Path, peers: &[Peer]) -> Result<(), PeerFileError> {
    let file = File::create(path)?;
    serde_json::to_writer(BufWriter::new(file), peers)?;
    Ok(())
}
