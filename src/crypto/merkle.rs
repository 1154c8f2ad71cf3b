//! Merkle root construction
//!
//! Used for committing a block header to its ordered transaction list.

use super::{hash_pair, Hash};

/// Compute the merkle root of a list of hashes
///
/// If the list is empty, there is no root.
/// If a level has an odd number of elements, its last element is duplicated.
pub fn compute_merkle_root(hashes: &[Hash]) -> Option<Hash> {
    let mut current_level: Vec<Hash> = hashes.to_vec();

    while current_level.len() > 1 {
        // If odd number, duplicate last
        if current_level.len() % 2 == 1 {
            let last = current_level[current_level.len() - 1];
            current_level.push(last);
        }

        current_level = current_level
            .chunks(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
    }

    current_level.first().copied()
}
