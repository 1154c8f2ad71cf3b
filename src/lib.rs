//! Minichain core library
//!
//! A minimal proof-of-work cryptocurrency ledger: blocks of signed
//! value transfers, a difficulty-retargeted hash puzzle, UTXO accounting,
//! orphan handling and heaviest-chain fork choice.

pub mod config;
pub mod consensus;
pub mod crypto;
pub mod mempool;
pub mod mining;
pub mod node;
pub mod p2p;
pub mod storage;
pub mod validation;
pub mod wallet;

/// Protocol constants - HARD-CODED, NEVER CONFIGURABLE
pub mod constants {
    /// Only supported block version
    pub const PROTOCOL_VERSION: u32 = 1;

    /// Only supported transaction version
    pub const TRANSACTION_VERSION: u32 = 1;

    /// Target time between blocks (milliseconds)
    pub const BLOCK_GENERATION_INTERVAL_MS: u64 = 10_000;

    /// Difficulty adjustment interval (blocks)
    pub const BITS_ADJUSTMENT_INTERVAL: u64 = 2;

    /// Allowed clock drift for block timestamps (milliseconds)
    pub const TIMESTAMP_TOLERANCE_MS: u64 = 60_000;

    /// Pool submissions older than this are stale (milliseconds)
    pub const TRANSACTION_MAX_AGE_MS: u64 = 60_000;

    /// Byte budget for the non-coinbase transactions of a block (1 MiB)
    pub const MAX_TRANSACTIONS_SIZE: usize = 1024 * 1024;

    /// Coinbase reward before the first halving
    pub const INITIAL_REWARD: u64 = 50;

    /// Blocks between reward halvings
    pub const HALVING_INTERVAL: u64 = 210_000;

    /// Genesis block timestamp (2019-01-01T00:00:00Z, milliseconds)
    pub const GENESIS_TIMESTAMP: u64 = 1_546_300_800_000;

    /// Genesis difficulty (leading zero bits)
    pub const GENESIS_BITS: u32 = 10;

    /// Public key hash receiving the genesis coinbase
    pub const GENESIS_RECIPIENT: &str =
        "80bff131e960187c46fbbfef536ef86a1f4fd82fca9ff79713aa0ab6c560eb64";

    /// Memo carried by the genesis coinbase
    pub const GENESIS_MEMO: &str = "Genesis Block's Coinbase Transaction";

    /// Maximum number of registered peers
    pub const MAX_PEER_COUNT: usize = 5;

    /// Capacity of each of the branch and orphan block buffers
    pub const MAX_BUFFERED_BLOCKS: usize = 256;

    /// Capacity of the orphan transaction pool
    pub const MAX_ORPHAN_TRANSACTIONS: usize = 256;
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
