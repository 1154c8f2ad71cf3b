//! Property-based tests for minichain
//!
//! These tests verify invariants hold under random inputs.

use proptest::prelude::*;
use minichain::consensus::{
    block_work, calculate_block_reward, calculate_next_bits, cumulative_difficulty, is_valid_pow,
    Block, BlockHeader, EXPECTED_INTERVAL_MS,
};
use minichain::constants::{HALVING_INTERVAL, INITIAL_REWARD};
use minichain::crypto::{compute_merkle_root, double_hash, Hash, PrivateKey};
use minichain::mining::mine_nonce;

fn leaves(seed: u64, count: usize) -> Vec<Hash> {
    (0..count)
        .map(|i| double_hash(format!("{seed}-{i}").as_bytes()))
        .collect()
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

proptest! {
    /// Merkle root is deterministic
    #[test]
    fn prop_merkle_root_deterministic(seed in any::<u64>(), count in 1usize..16) {
        let hashes = leaves(seed, count);
        prop_assert_eq!(compute_merkle_root(&hashes), compute_merkle_root(&hashes.clone()));
    }

    /// Swapping two leaves changes the root
    #[test]
    fn prop_merkle_root_order_sensitive(
        seed in any::<u64>(),
        count in 2usize..16,
        a in any::<prop::sample::Index>(),
        b in any::<prop::sample::Index>(),
    ) {
        let (i, j) = (a.index(count), b.index(count));
        prop_assume!(i != j);

        let hashes = leaves(seed, count);
        let mut swapped = hashes.clone();
        swapped.swap(i, j);

        prop_assert_ne!(compute_merkle_root(&hashes), compute_merkle_root(&swapped));
    }

    /// mine_nonce returns the first nonce meeting the target
    #[test]
    fn prop_mined_nonce_is_smallest(timestamp in any::<u64>(), bits in 0u32..7) {
        let mut header = BlockHeader::new(1, double_hash(b"parent"), Hash::zero(), timestamp, bits, 0);
        let nonce = mine_nonce(&header);

        header.nonce = nonce;
        prop_assert!(is_valid_pow(&header.hash(), bits));
        for smaller in 0..nonce {
            header.nonce = smaller;
            prop_assert!(!is_valid_pow(&header.hash(), bits));
        }
    }

    /// Fast intervals raise difficulty by exactly one
    #[test]
    fn prop_fast_interval_raises_bits(bits in 0u32..255, elapsed in 0..=EXPECTED_INTERVAL_MS / 2) {
        prop_assert_eq!(calculate_next_bits(bits, elapsed), bits + 1);
    }

    /// Slow intervals lower difficulty by exactly one, never below zero
    #[test]
    fn prop_slow_interval_lowers_bits(bits in 0u32..255, extra in 0u64..1_000_000_000) {
        let next = calculate_next_bits(bits, EXPECTED_INTERVAL_MS * 2 + extra);
        prop_assert_eq!(next, bits.saturating_sub(1));
    }

    /// Anything in between leaves difficulty alone
    #[test]
    fn prop_normal_interval_keeps_bits(
        bits in 0u32..255,
        elapsed in (EXPECTED_INTERVAL_MS / 2 + 1)..(EXPECTED_INTERVAL_MS * 2),
    ) {
        prop_assert_eq!(calculate_next_bits(bits, elapsed), bits);
    }

    /// Appending a block always adds work
    #[test]
    fn prop_cumulative_difficulty_grows(bits in prop::collection::vec(0u32..64, 1..20)) {
        let chain: Vec<Block> = bits
            .iter()
            .enumerate()
            .map(|(id, bits)| {
                let header = BlockHeader::new(1, Hash::zero(), Hash::zero(), 0, *bits, 0);
                Block::new(id as u64, header, Vec::new())
            })
            .collect();

        for end in 1..chain.len() {
            prop_assert!(cumulative_difficulty(&chain[..end + 1]) > cumulative_difficulty(&chain[..end]));
        }
        let total: u128 = bits.iter().map(|b| block_work(*b)).sum();
        prop_assert_eq!(cumulative_difficulty(&chain), total);
    }

    /// Reward halves every era and never grows
    #[test]
    fn prop_reward_schedule(height in 0u64..(HALVING_INTERVAL * 70)) {
        let era = height / HALVING_INTERVAL;
        let expected = if era >= 64 { 0 } else { INITIAL_REWARD >> era };
        prop_assert_eq!(calculate_block_reward(height), expected);
        prop_assert!(calculate_block_reward(height + 1) <= calculate_block_reward(height));
    }

    /// A signature verifies for the message it was made over, and only that one
    #[test]
    fn prop_signature_binds_message(a in any::<[u8; 16]>(), b in any::<[u8; 16]>()) {
        prop_assume!(a != b);
        let key = PrivateKey::generate();
        let (msg_a, msg_b) = (double_hash(&a), double_hash(&b));
        let signature = key.sign(&msg_a);

        prop_assert!(key.public_key().verify(&msg_a, &signature));
        prop_assert!(!key.public_key().verify(&msg_b, &signature));
    }
}

// ============================================================================
// EDGE CASES
// ============================================================================

#[test]
fn test_retarget_exact_thresholds() {
    assert_eq!(calculate_next_bits(10, EXPECTED_INTERVAL_MS / 2), 11);
    assert_eq!(calculate_next_bits(10, EXPECTED_INTERVAL_MS * 2), 9);
    assert_eq!(calculate_next_bits(0, EXPECTED_INTERVAL_MS * 2), 0);
}

#[test]
fn test_block_work_saturates() {
    assert_eq!(block_work(0), 1);
    assert_eq!(block_work(127), 1u128 << 127);
    assert_eq!(block_work(128), u128::MAX);
}

#[test]
fn test_empty_merkle_root() {
    assert_eq!(compute_merkle_root(&[]), None);
    let single = double_hash(b"only");
    assert_eq!(compute_merkle_root(&[single]), Some(single));
}

#[test]
fn test_unsatisfiable_pow() {
    assert!(!is_valid_pow(&Hash::zero(), 257));
    assert!(is_valid_pow(&Hash::zero(), 256));
}
