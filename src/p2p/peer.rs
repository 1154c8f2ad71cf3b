//! Peer management
//!
//! Keeps the small, fixed-size list of peer URLs announcements are
//! delivered to.

use thiserror::Error;
use tracing::info;

use crate::constants::MAX_PEER_COUNT;

/// Peer registration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PeerError {
    #[error("Peer list is full ({0} peers)")]
    TooManyPeers(usize),
    #[error("Invalid peer URL: {0}")]
    InvalidUrl(String),
    #[error("Peer URL points at this node: {0}")]
    SelfUrl(String),
    #[error("Peer already registered: {0}")]
    Duplicate(String),
}

/// Scheme and host of a peer URL
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    scheme: String,
    host: String,
}

impl Endpoint {
    /// Accepts `http://host[:port][/path]` and `https://...`
    fn parse(url: &str) -> Option<Self> {
        let (scheme, rest) = url.split_once("://")?;
        let scheme = scheme.to_ascii_lowercase();
        if scheme != "http" && scheme != "https" {
            return None;
        }

        let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if host.is_empty() || host.chars().any(char::is_whitespace) {
            return None;
        }

        Some(Self {
            scheme,
            host: host.to_ascii_lowercase(),
        })
    }
}

/// Peer registry
#[derive(Debug)]
pub struct PeerRegistry {
    /// Our own advertised URL, if any
    self_endpoint: Option<Endpoint>,
    /// Registered peer URLs, in registration order
    peers: Vec<(String, Endpoint)>,
    /// Maximum number of peers
    max_peers: usize,
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl PeerRegistry {
    /// Create a registry that refuses `self_url`
    pub fn new(self_url: Option<&str>) -> Self {
        Self {
            self_endpoint: self_url.and_then(Endpoint::parse),
            peers: Vec::new(),
            max_peers: MAX_PEER_COUNT,
        }
    }

    /// Add a peer URL
    pub fn register(&mut self, url: &str) -> Result<(), PeerError> {
        if self.peers.len() >= self.max_peers {
            return Err(PeerError::TooManyPeers(self.max_peers));
        }

        let endpoint = Endpoint::parse(url).ok_or_else(|| PeerError::InvalidUrl(url.to_string()))?;

        if self.self_endpoint.as_ref() == Some(&endpoint) {
            return Err(PeerError::SelfUrl(url.to_string()));
        }
        if self.peers.iter().any(|(_, known)| *known == endpoint) {
            return Err(PeerError::Duplicate(url.to_string()));
        }

        info!(peer = url, "peer registered");
        self.peers.push((url.to_string(), endpoint));
        Ok(())
    }

    /// Remove a peer URL, returning whether it was registered
    pub fn remove(&mut self, url: &str) -> bool {
        let before = self.peers.len();
        self.peers.retain(|(known, _)| known != url);
        self.peers.len() != before
    }

    /// All registered peer URLs
    pub fn urls(&self) -> Vec<String> {
        self.peers.iter().map(|(url, _)| url.clone()).collect()
    }

    /// Get number of registered peers
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
