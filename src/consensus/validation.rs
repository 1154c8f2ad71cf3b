//! Block and chain validation
//!
//! Pure functions for validating blocks and chains. Nothing here mutates
//! ledger state; callers decide what to do with the verdict.

use thiserror::Error;

use crate::constants::{PROTOCOL_VERSION, TIMESTAMP_TOLERANCE_MS};
use crate::consensus::{calculate_block_reward, cumulative_difficulty, is_valid_pow, retarget, Block};
use crate::crypto::Hash;
use crate::storage::ChainIndex;
use crate::validation::{validate_transaction, CoinbaseContext, SpendRule};

/// Classification of a rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed shape or encoding
    Structural,
    /// Breaks a consensus rule (PoW, version, linkage, timing, difficulty)
    Consensus,
    /// Key or signature does not authorize the spend
    Authorization,
    /// Value rules violated
    Economic,
    /// Output already consumed, or claimed twice
    DoubleSpend,
    /// Referenced output does not exist
    NotFound,
}

/// Validation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Malformed: {0}")]
    Malformed(String),
    #[error("Block id {found} does not match its position {expected}")]
    HeightMismatch { expected: u64, found: u64 },
    #[error("Block has no coinbase transaction")]
    MissingCoinbase,
    #[error("Coinbase transaction outside position 0")]
    MisplacedCoinbase,
    #[error("Coinbase transaction outside a block")]
    UnexpectedCoinbase,

    #[error("Invalid proof of work for {bits} bits")]
    InvalidPoW { bits: u32 },
    #[error("Unsupported block version {0}")]
    UnsupportedVersion(u32),
    #[error("Invalid previous hash")]
    InvalidPrevHash,
    #[error("Invalid merkle root")]
    InvalidMerkleRoot,
    #[error("Timestamp {timestamp} outside [{min}, {max}]")]
    InvalidTimestamp { timestamp: u64, min: u64, max: u64 },
    #[error("Invalid difficulty: expected {expected} bits, found {found}")]
    InvalidDifficulty { expected: u32, found: u32 },
    #[error("Genesis block does not match")]
    InvalidGenesis,
    #[error("Genesis block cannot be resubmitted")]
    GenesisResubmitted,
    #[error("Unsupported transaction version {0}")]
    UnsupportedTransactionVersion(u32),
    #[error("Coinbase height {found} does not match block {expected}")]
    InvalidCoinbaseHeight { expected: u64, found: u64 },
    #[error("Transaction is stale ({age_ms} ms old)")]
    StaleTransaction { age_ms: u64 },

    #[error("Input {index} public key does not match the spent output")]
    PublicKeyMismatch { index: usize },
    #[error("Input {index} signature does not verify")]
    InvalidSignature { index: usize },

    #[error("Coinbase pays {found}, expected {expected}")]
    InvalidCoinbaseValue { expected: u64, found: u64 },
    #[error("Inputs {inputs} less than outputs {outputs}")]
    InsufficientInputs { inputs: u64, outputs: u64 },
    #[error("Value overflow")]
    ValueOverflow,

    #[error("Output {transaction_hash}:{output_index} already spent")]
    DoubleSpend { transaction_hash: Hash, output_index: i64 },

    #[error("Output {transaction_hash}:{output_index} not found")]
    MissingPreviousOutput { transaction_hash: Hash, output_index: i64 },
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        use ValidationError::*;
        match self {
            Malformed(_) | HeightMismatch { .. } | MissingCoinbase | MisplacedCoinbase
            | UnexpectedCoinbase => ErrorKind::Structural,
            InvalidPoW { .. }
            | UnsupportedVersion(_)
            | InvalidPrevHash
            | InvalidMerkleRoot
            | InvalidTimestamp { .. }
            | InvalidDifficulty { .. }
            | InvalidGenesis
            | GenesisResubmitted
            | UnsupportedTransactionVersion(_)
            | InvalidCoinbaseHeight { .. }
            | StaleTransaction { .. } => ErrorKind::Consensus,
            PublicKeyMismatch { .. } | InvalidSignature { .. } => ErrorKind::Authorization,
            InvalidCoinbaseValue { .. } | InsufficientInputs { .. } | ValueOverflow => {
                ErrorKind::Economic
            }
            DoubleSpend { .. } => ErrorKind::DoubleSpend,
            MissingPreviousOutput { .. } => ErrorKind::NotFound,
        }
    }
}

/// Block 0 must be exactly the ledger's genesis
pub fn validate_genesis(block: &Block, genesis: &Block) -> Result<(), ValidationError> {
    if block != genesis {
        return Err(ValidationError::InvalidGenesis);
    }
    Ok(())
}

/// Validate a non-genesis block header against the blocks before it
///
/// `predecessors` holds blocks `0..block.id`.
pub fn validate_block_header(
    block: &Block,
    predecessors: &[Block],
    now: u64,
) -> Result<(), ValidationError> {
    if block.id == 0 {
        return Err(ValidationError::GenesisResubmitted);
    }
    if predecessors.len() as u64 != block.id {
        return Err(ValidationError::HeightMismatch {
            expected: predecessors.len() as u64,
            found: block.id,
        });
    }
    let Some(previous) = predecessors.last() else {
        return Err(ValidationError::HeightMismatch { expected: 0, found: block.id });
    };
    let header = &block.header;

    if !is_valid_pow(&block.hash(), header.bits) {
        return Err(ValidationError::InvalidPoW { bits: header.bits });
    }

    if header.version != PROTOCOL_VERSION {
        return Err(ValidationError::UnsupportedVersion(header.version));
    }

    if header.previous_block_hash != previous.hash() {
        return Err(ValidationError::InvalidPrevHash);
    }

    if block.compute_merkle_root() != Some(header.merkle_root) {
        return Err(ValidationError::InvalidMerkleRoot);
    }

    let min = previous.header.timestamp.saturating_sub(TIMESTAMP_TOLERANCE_MS);
    let max = now.saturating_add(TIMESTAMP_TOLERANCE_MS);
    if header.timestamp < min || header.timestamp > max {
        return Err(ValidationError::InvalidTimestamp {
            timestamp: header.timestamp,
            min,
            max,
        });
    }

    let expected = retarget(block.id, header.timestamp, predecessors).ok_or(
        ValidationError::HeightMismatch {
            expected: predecessors.len() as u64,
            found: block.id,
        },
    )?;
    if header.bits != expected {
        return Err(ValidationError::InvalidDifficulty {
            expected,
            found: header.bits,
        });
    }

    Ok(())
}

/// Validate the transactions of a block.
///
/// `index` covers the predecessors of `block`; on return it also covers
/// `block` itself, so spends are checked under the spent-once rule.
pub fn validate_block_transactions<'a>(
    block: &'a Block,
    index: &mut ChainIndex<'a>,
) -> Result<(), ValidationError> {
    let (coinbase, rest) = block
        .transactions
        .split_first()
        .ok_or(ValidationError::MissingCoinbase)?;
    if !coinbase.is_coinbase() {
        return Err(ValidationError::MissingCoinbase);
    }
    if rest.iter().any(|tx| tx.is_coinbase()) {
        return Err(ValidationError::MisplacedCoinbase);
    }

    index.apply_block(block);

    for tx in rest {
        validate_transaction(tx, index, SpendRule::SpentOnce, None)?;
    }

    let fees = index.total_fees(rest).ok_or(ValidationError::ValueOverflow)?;
    let context = CoinbaseContext {
        height: block.id,
        value: calculate_block_reward(block.id)
            .checked_add(fees)
            .ok_or(ValidationError::ValueOverflow)?,
    };
    validate_transaction(coinbase, index, SpendRule::SpentOnce, Some(context))
}

/// Full validation of a block extending `predecessors`
pub fn validate_block(block: &Block, predecessors: &[Block], now: u64) -> Result<(), ValidationError> {
    validate_block_header(block, predecessors, now)?;
    let mut index = ChainIndex::from_chain(predecessors);
    validate_block_transactions(block, &mut index)
}

/// Chain validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainValidationResult {
    /// Total cumulative difficulty (work)
    pub cumulative_difficulty: u128,
    /// Height of the tip
    pub height: u64,
    /// Tip hash
    pub tip_hash: Hash,
}

/// Validate a whole chain from genesis
///
/// Block 0 must equal `genesis`; every later block must pass header and
/// transaction validation against the blocks before it.
pub fn validate_chain(
    chain: &[Block],
    genesis: &Block,
    now: u64,
) -> Result<ChainValidationResult, ValidationError> {
    let Some((first, _)) = chain.split_first() else {
        return Err(ValidationError::InvalidGenesis);
    };
    validate_genesis(first, genesis)?;

    let mut index = ChainIndex::new();
    index.apply_block(first);

    for (position, block) in chain.iter().enumerate().skip(1) {
        validate_block_header(block, &chain[..position], now)?;
        validate_block_transactions(block, &mut index)?;
    }

    let tip = &chain[chain.len() - 1];
    Ok(ChainValidationResult {
        cumulative_difficulty: cumulative_difficulty(chain),
        height: tip.id,
        tip_hash: tip.hash(),
    })
}
