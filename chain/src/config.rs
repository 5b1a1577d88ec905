//! Top-level configuration for a chain node.
//!
//! The JSON configuration file carries the node's tuning: gossip port,
//! mining difficulty target, object-store gateway, data directory, and
//! block limits. Field names are part of the on-disk format and must
//! not change. Metrics exporter settings are process-local and live in
//! [`MetricsConfig`].

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Nested network settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Gossip listen port, as a string.
    pub port: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: "8081".to_string(),
        }
    }
}

/// Node configuration, loaded from a JSON file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "networkPort")]
    pub network_port: u16,
    #[serde(rename = "miningDifficultyTarget")]
    pub mining_difficulty_target: String,
    #[serde(rename = "ipfsGatewayURL")]
    pub ipfs_gateway_url: String,
    #[serde(rename = "dataDir")]
    pub data_dir: String,
    #[serde(rename = "maxBlockTransactions")]
    pub max_block_transactions: usize,
    /// Object-store fetch deadline, in seconds.
    #[serde(rename = "vmExecutionTimeout")]
    pub vm_execution_timeout: u64,
    #[serde(rename = "datasetHash")]
    pub dataset_hash: String,
    #[serde(rename = "algorithmHash")]
    pub algorithm_hash: String,
    #[serde(rename = "network")]
    pub network: NetworkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network_port: 8081,
            mining_difficulty_target: "0000".to_string(),
            ipfs_gateway_url: "http://127.0.0.1:5001".to_string(),
            data_dir: "data".to_string(),
            max_block_transactions: 100,
            vm_execution_timeout: 10,
            dataset_hash: String::new(),
            algorithm_hash: String::new(),
            network: NetworkConfig::default(),
        }
    }
}

/// Errors that can occur while loading the configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Codec(serde_json::Error),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Codec(e)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Codec(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Loads the node configuration from a JSON file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let file = File::open(path)?;
    let config = serde_json::from_reader(BufReader::new(file))?;
    Ok(config)
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        // Safe to unwrap: this is a fixed, valid address literal.
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_values_are_expected() {
        let cfg = Config::default();

        assert_eq!(cfg.network_port, 8081);
        assert_eq!(cfg.mining_difficulty_target, "0000");
        assert_eq!(cfg.max_block_transactions, 100);
        assert_eq!(cfg.network.port, "8081");
    }

    #[test]
    fn file_field_names_are_honored() {
        let json = r#"{
            "networkPort": 9000,
            "miningDifficultyTarget": "000",
            "ipfsGatewayURL": "http://10.0.0.1:5001",
            "dataDir": "/var/lib/chain",
            "maxBlockTransactions": 25,
            "vmExecutionTimeout": 30,
            "datasetHash": "QmDataset",
            "algorithmHash": "QmAlgorithm",
            "network": {"port": "9000"}
        }"#;

        let cfg: Config = serde_json::from_str(json).expect("config should parse");
        assert_eq!(cfg.network_port, 9000);
        assert_eq!(cfg.mining_difficulty_target, "000");
        assert_eq!(cfg.ipfs_gateway_url, "http://10.0.0.1:5001");
        assert_eq!(cfg.data_dir, "/var/lib/chain");
        assert_eq!(cfg.max_block_transactions, 25);
        assert_eq!(cfg.vm_execution_timeout, 30);
        assert_eq!(cfg.dataset_hash, "QmDataset");
        assert_eq!(cfg.algorithm_hash, "QmAlgorithm");
        assert_eq!(cfg.network.port, "9000");
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"networkPort": 7000}"#).unwrap();
        assert_eq!(cfg.network_port, 7000);
        assert_eq!(cfg.mining_difficulty_target, "0000");
    }

    #[test]
    fn load_config_reads_a_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("config.json");
        let mut file = File::create(&path).unwrap();
        file.write_all(br#"{"miningDifficultyTarget": "00"}"#).unwrap();

        let cfg = load_config(&path).expect("load should succeed");
        assert_eq!(cfg.mining_difficulty_target, "00");
    }

    #[test]
    fn load_config_reports_missing_file_and_bad_json() {
        let err = load_config(Path::new("no-such-config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));

        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("config.json");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"{broken").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Codec(_)));
    }

    #[test]
    fn metrics_config_defaults_to_localhost_exporter() {
        let cfg = MetricsConfig::default();
        assert!(cfg.enabled);
        assert_eq!(cfg.listen_addr.port(), 9898);
    }
}
