//! Node configuration
//!
//! Operator settings only. Consensus parameters live in `constants` and are
//! never read from a file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::Hash;
use crate::node::GenesisSpec;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read or write config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// URL this node is reachable at; peers with the same endpoint are refused
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_url: Option<String>,
    /// Peer URLs registered at startup
    pub peers: Vec<String>,
    /// Run the mining loop
    pub mine: bool,
    /// Coinbase recipient; a fresh key is generated when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miner_public_key_hash: Option<Hash>,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_filter: String,
    pub genesis: GenesisSpec,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            self_url: None,
            peers: Vec::new(),
            mine: false,
            miner_public_key_hash: None,
            log_filter: "minichain=info".into(),
            genesis: GenesisSpec::default(),
        }
    }
}

impl NodeConfig {
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
