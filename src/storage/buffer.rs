//! Buffered blocks
//!
//! Branch blocks (valid blocks off the main chain) and orphan blocks
//! (blocks whose parent is unknown) are kept in an arena, indexed by height
//! and by hash.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::consensus::Block;
use crate::crypto::Hash;

/// Height-indexed arena of blocks with a fixed capacity
#[derive(Debug)]
pub struct BlockBuffer {
    slots: Vec<Option<Block>>,
    free: Vec<usize>,
    by_height: BTreeMap<u64, Vec<usize>>,
    by_hash: HashMap<Hash, usize>,
    capacity: usize,
}

impl BlockBuffer {
    /// Create an empty buffer holding at most `capacity` blocks
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            by_height: BTreeMap::new(),
            by_hash: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn get(&self, hash: &Hash) -> Option<&Block> {
        self.by_hash.get(hash).and_then(|&slot| self.slots[slot].as_ref())
    }

    /// Block with `hash` stored at `height`
    pub fn find(&self, height: u64, hash: &Hash) -> Option<&Block> {
        self.get(hash).filter(|block| block.id == height)
    }

    /// Every buffered block at `height`
    pub fn at_height(&self, height: u64) -> impl Iterator<Item = &Block> {
        self.by_height
            .get(&height)
            .into_iter()
            .flatten()
            .filter_map(|&slot| self.slots[slot].as_ref())
    }

    /// Buffer a block. Returns `false` if it was already held.
    ///
    /// A full buffer evicts one of its lowest blocks first.
    pub fn insert(&mut self, block: Block) -> bool {
        let hash = block.hash();
        if self.by_hash.contains_key(&hash) {
            return false;
        }

        if self.len() >= self.capacity {
            self.evict_lowest();
        }

        let height = block.id;
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(block);
                slot
            }
            None => {
                self.slots.push(Some(block));
                self.slots.len() - 1
            }
        };
        self.by_height.entry(height).or_default().push(slot);
        self.by_hash.insert(hash, slot);
        true
    }

    /// Remove and return a block
    pub fn remove(&mut self, hash: &Hash) -> Option<Block> {
        let slot = self.by_hash.remove(hash)?;
        let block = self.slots[slot].take()?;
        if let Some(slots) = self.by_height.get_mut(&block.id) {
            slots.retain(|&s| s != slot);
            if slots.is_empty() {
                self.by_height.remove(&block.id);
            }
        }
        self.free.push(slot);
        Some(block)
    }

    /// Remove and return the blocks at `height` whose parent is `parent`
    pub fn take_children(&mut self, height: u64, parent: &Hash) -> Vec<Block> {
        let hashes: Vec<Hash> = self
            .at_height(height)
            .filter(|block| block.previous_hash() == parent)
            .map(Block::hash)
            .collect();

        hashes.iter().filter_map(|hash| self.remove(hash)).collect()
    }

    /// Drop every block for which `keep` returns false
    pub fn retain(&mut self, mut keep: impl FnMut(&Block) -> bool) {
        let doomed: Vec<Hash> = self
            .by_hash
            .iter()
            .filter(|(_, &slot)| self.slots[slot].as_ref().is_some_and(|b| !keep(b)))
            .map(|(hash, _)| *hash)
            .collect();

        for hash in doomed {
            self.remove(&hash);
        }
    }

    fn evict_lowest(&mut self) {
        let victim = self
            .by_height
            .values()
            .next()
            .and_then(|slots| slots.first())
            .and_then(|&slot| self.slots[slot].as_ref())
            .map(|block| (block.id, block.hash()));

        if let Some((height, hash)) = victim {
            debug!(height, %hash, "buffer full, evicting block");
            self.remove(&hash);
        }
    }
}
