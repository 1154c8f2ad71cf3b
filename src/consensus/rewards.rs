//! Block reward calculation
//!
//! Deterministic halving schedule: the coinbase subsidy starts at
//! `INITIAL_REWARD` and halves every `HALVING_INTERVAL` blocks.

use crate::constants::{HALVING_INTERVAL, INITIAL_REWARD};

/// Calculate block reward for a given height
///
/// This is a pure, deterministic function. The genesis block pays the
/// initial reward like any other block of the first era.
pub fn calculate_block_reward(height: u64) -> u64 {
    let halvings = height / HALVING_INTERVAL;
    if halvings >= u64::BITS as u64 {
        return 0;
    }
    INITIAL_REWARD >> halvings
}

/// Total subsidy issued by blocks `0..=height`
///
/// Sums whole halving eras instead of walking every block.
pub fn calculate_total_issued(height: u64) -> u64 {
    let mut total: u64 = 0;
    let mut era_start: u64 = 0;

    while era_start <= height {
        let reward = calculate_block_reward(era_start);
        if reward == 0 {
            break;
        }
        let era_end = era_start.saturating_add(HALVING_INTERVAL - 1).min(height);
        let blocks = era_end - era_start + 1;
        total = total.saturating_add(reward.saturating_mul(blocks));
        era_start = match era_end.checked_add(1) {
            Some(next) => next,
            None => break,
        };
    }

    total
}
