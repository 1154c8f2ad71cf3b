//! Genesis block generation
//!
//! Creates the genesis block the whole chain is anchored to. The same
//! `GenesisSpec` always produces a byte-for-byte identical block.

use serde::{Deserialize, Serialize};

use crate::constants::{GENESIS_BITS, GENESIS_MEMO, GENESIS_RECIPIENT, GENESIS_TIMESTAMP, PROTOCOL_VERSION};
use crate::consensus::{calculate_block_reward, Block, BlockHeader};
use crate::crypto::{compute_merkle_root, Hash};
use crate::mining::mine_nonce;
use crate::validation::Transaction;

/// Parameters of the genesis block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenesisSpec {
    /// Public key hash receiving the genesis coinbase
    pub recipient: Hash,
    /// Genesis timestamp (milliseconds)
    pub timestamp: u64,
    /// Genesis difficulty
    pub bits: u32,
    /// Memo of the genesis coinbase
    pub memo: String,
}

impl Default for GenesisSpec {
    fn default() -> Self {
        Self {
            recipient: Hash::from_hex(GENESIS_RECIPIENT).unwrap_or_default(),
            timestamp: GENESIS_TIMESTAMP,
            bits: GENESIS_BITS,
            memo: GENESIS_MEMO.to_string(),
        }
    }
}

/// Create the genesis block
///
/// The coinbase pays the height-0 reward to `spec.recipient`; the nonce is
/// the smallest one meeting `spec.bits`.
pub fn create_genesis_block(spec: &GenesisSpec) -> Block {
    let coinbase = Transaction::coinbase(
        spec.recipient,
        0,
        calculate_block_reward(0),
        spec.memo.clone(),
        spec.timestamp,
    );

    let merkle_root = compute_merkle_root(&[coinbase.hash()]).unwrap_or_default();

    let mut header = BlockHeader::new(
        PROTOCOL_VERSION,
        Hash::zero(),
        merkle_root,
        spec.timestamp,
        spec.bits,
        0,
    );
    header.nonce = mine_nonce(&header);

    Block::new(0, header, vec![coinbase])
}
