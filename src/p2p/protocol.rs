//! P2P protocol messages
//!
//! What a node pushes to its peers, and the JSON form it travels in.

use serde::{Deserialize, Serialize};

use crate::consensus::Block;
use crate::crypto::Hash;
use crate::validation::Transaction;

/// Announcement pushed to every registered peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Announcement {
    /// A block this node accepted
    Block(Block),
    /// A transaction this node admitted to its pool
    Transaction(Transaction),
}

impl Announcement {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Announcement::Block(_) => "block",
            Announcement::Transaction(_) => "transaction",
        }
    }

    /// Hash of the announced item
    pub fn hash(&self) -> Hash {
        match self {
            Announcement::Block(block) => block.hash(),
            Announcement::Transaction(tx) => tx.hash(),
        }
    }

    /// Serialize message to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize message from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
