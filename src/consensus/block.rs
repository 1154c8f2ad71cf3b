//! Block structure
//!
//! A block is a header plus its ordered transactions. On the wire the
//! header fields are flattened next to `id` and `transactions`.

use serde::{Deserialize, Serialize};

use crate::crypto::{compute_merkle_root, Canonical, Hash};
use crate::validation::Transaction;

/// Block header containing all hashed metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    /// Protocol version
    pub version: u32,
    /// Hash of the previous block
    pub previous_block_hash: Hash,
    /// Merkle root of all transactions
    pub merkle_root: Hash,
    /// Block timestamp (milliseconds since Unix epoch)
    pub timestamp: u64,
    /// Required leading zero bits of the header hash
    pub bits: u32,
    /// Nonce used for PoW
    pub nonce: u64,
}

impl BlockHeader {
    /// Create a new block header
    pub fn new(
        version: u32,
        previous_block_hash: Hash,
        merkle_root: Hash,
        timestamp: u64,
        bits: u32,
        nonce: u64,
    ) -> Self {
        Self {
            version,
            previous_block_hash,
            merkle_root,
            timestamp,
            bits,
            nonce,
        }
    }

    /// Canonical encoding of the header
    pub fn encode(&self) -> Canonical {
        Canonical::new()
            .num(self.version)
            .hash(&self.previous_block_hash)
            .hash(&self.merkle_root)
            .num(self.timestamp)
            .num(self.bits)
            .num(self.nonce)
    }

    /// Calculate the hash of this header
    pub fn hash(&self) -> Hash {
        self.encode().digest()
    }
}

/// A complete block containing header and transactions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    /// Height of the block (genesis is 0)
    pub id: u64,
    /// Block header
    #[serde(flatten)]
    pub header: BlockHeader,
    /// List of transactions in this block, coinbase first
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Create a new block
    pub fn new(id: u64, header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            id,
            header,
            transactions,
        }
    }

    /// Get the block hash
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn previous_hash(&self) -> &Hash {
        &self.header.previous_block_hash
    }

    /// Check if this is the genesis block
    pub fn is_genesis(&self) -> bool {
        self.id == 0
    }

    /// Hashes of the contained transactions, in block order
    pub fn transaction_hashes(&self) -> Vec<Hash> {
        self.transactions.iter().map(Transaction::hash).collect()
    }

    /// Merkle root over the contained transactions
    pub fn compute_merkle_root(&self) -> Option<Hash> {
        compute_merkle_root(&self.transaction_hashes())
    }

    /// The leading coinbase, if the block has one
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }

    /// Parse a block from its JSON wire form
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Encode a block in its JSON wire form
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::double_hash;

    fn sample_block(nonce: u64) -> Block {
        let coinbase = Transaction::coinbase(double_hash(b"miner"), 3, 50, "cb", 1_000);
        let merkle_root = compute_merkle_root(&[coinbase.hash()]).unwrap();
        let header = BlockHeader::new(1, double_hash(b"parent"), merkle_root, 1_000, 4, nonce);
        Block::new(3, header, vec![coinbase])
    }

    #[test]
    fn test_header_encoding_layout() {
        let header = BlockHeader::new(1, Hash::zero(), Hash::zero(), 42, 10, 7);
        let zero = "0".repeat(64);
        assert_eq!(
            header.encode().as_str(),
            format!("1|{zero}|{zero}|42|10|7|")
        );
    }

    #[test]
    fn test_hash_changes_with_nonce() {
        assert_ne!(sample_block(0).hash(), sample_block(1).hash());
    }

    #[test]
    fn test_merkle_root_matches_transactions() {
        let block = sample_block(0);
        assert_eq!(block.compute_merkle_root(), Some(block.header.merkle_root));
        assert!(block.coinbase().is_some());
    }

    #[test]
    fn test_genesis_block_detection() {
        let mut block = sample_block(0);
        assert!(!block.is_genesis());
        block.id = 0;
        assert!(block.is_genesis());
    }

    #[test]
    fn test_json_is_flat() {
        let block = sample_block(9);
        let value: serde_json::Value = serde_json::from_str(&block.to_json().unwrap()).unwrap();
        for field in ["id", "version", "previousBlockHash", "merkleRoot", "timestamp", "bits", "nonce", "transactions"] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        assert!(value.get("header").is_none());
        assert_eq!(Block::from_json(&block.to_json().unwrap()).unwrap(), block);
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(Block::from_json(r#"{"id": "one"}"#).is_err());
        assert!(Block::from_json("not json").is_err());
    }
}
