//! Difficulty adjustment algorithm
//!
//! Difficulty is expressed as `bits`, the number of leading zero bits a
//! header hash must have. It moves by one step every
//! `BITS_ADJUSTMENT_INTERVAL` blocks.

use crate::constants::{BITS_ADJUSTMENT_INTERVAL, BLOCK_GENERATION_INTERVAL_MS};
use crate::consensus::Block;
use crate::crypto::Hash;

/// Time the adjustment interval is expected to take (milliseconds)
pub const EXPECTED_INTERVAL_MS: u64 = BLOCK_GENERATION_INTERVAL_MS * BITS_ADJUSTMENT_INTERVAL;

/// Check whether a hash meets the difficulty `bits`
pub fn is_valid_pow(hash: &Hash, bits: u32) -> bool {
    hash.leading_zero_bits() >= bits
}

/// Check if difficulty should be adjusted at this height
pub fn should_adjust_difficulty(height: u64) -> bool {
    height > 0 && height % BITS_ADJUSTMENT_INTERVAL == 0
}

/// Step `bits` given the time the last interval took.
///
/// Twice as fast (or faster) raises difficulty by one, twice as slow (or
/// slower) lowers it by one, never below zero.
pub fn calculate_next_bits(current_bits: u32, elapsed_ms: u64) -> u32 {
    if elapsed_ms <= EXPECTED_INTERVAL_MS / 2 {
        current_bits.saturating_add(1)
    } else if elapsed_ms >= EXPECTED_INTERVAL_MS * 2 {
        current_bits.saturating_sub(1)
    } else {
        current_bits
    }
}

/// Compute the required `bits` for a block at `height` with `timestamp`.
///
/// `chain` must hold at least the blocks `0..height`. Returns `None` when it
/// does not.
///
/// # Arguments
/// * `height` - Height of the block being checked or built
/// * `timestamp` - Timestamp of that block
/// * `chain` - Chain the block extends
pub fn retarget(height: u64, timestamp: u64, chain: &[Block]) -> Option<u32> {
    if height == 0 {
        return chain.first().map(|genesis| genesis.header.bits);
    }

    let previous = chain.get(usize::try_from(height - 1).ok()?)?;
    if !should_adjust_difficulty(height) {
        return Some(previous.header.bits);
    }

    let reference = chain.get(usize::try_from(height - BITS_ADJUSTMENT_INTERVAL).ok()?)?;
    let elapsed = timestamp.saturating_sub(reference.header.timestamp);
    Some(calculate_next_bits(previous.header.bits, elapsed))
}

/// Work contributed by one block of difficulty `bits`
pub fn block_work(bits: u32) -> u128 {
    if bits >= 128 {
        u128::MAX
    } else {
        1u128 << bits
    }
}

/// Total work of a chain, the sum of 2^bits over its blocks
pub fn cumulative_difficulty(chain: &[Block]) -> u128 {
    chain
        .iter()
        .fold(0u128, |acc, block| acc.saturating_add(block_work(block.header.bits)))
}
