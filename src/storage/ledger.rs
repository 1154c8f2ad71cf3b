//! Ledger state and fork choice
//!
//! The ledger is the single mutable unit of the node: the main chain, the
//! transaction pools and the branch and orphan block buffers change
//! together, under one lock held by the caller.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::constants::{MAX_BUFFERED_BLOCKS, MAX_TRANSACTIONS_SIZE, PROTOCOL_VERSION};
use crate::consensus::{
    calculate_block_reward, cumulative_difficulty, retarget, validate_block, validate_chain, Block,
    BlockHeader, ValidationError,
};
use crate::crypto::Hash;
use crate::mempool::{PoolAdmission, TransactionPool};
use crate::node::{create_genesis_block, GenesisSpec};
use crate::validation::Transaction;

use super::{BlockBuffer, ChainIndex, UTXO};

/// Memo of coinbases in assembled blocks
pub const COINBASE_MEMO: &str = "Coinbase Transaction";

/// How an offered block was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockAdmission {
    /// Extended the main chain; `connected` buffered orphans followed it
    Appended { height: u64, hash: Hash, connected: usize },
    /// Stored as a valid block of a lighter or equal branch
    Branched { height: u64, hash: Hash },
    /// Its branch outweighed the main chain and replaced it
    Reorganized { height: u64, hash: Hash },
    /// Parent unknown; parked until it arrives
    Orphaned { height: u64, hash: Hash },
    /// Already on the main chain or buffered
    AlreadyKnown { hash: Hash },
}

impl BlockAdmission {
    /// Whether the main chain changed
    pub fn moved_tip(&self) -> bool {
        matches!(self, Self::Appended { .. } | Self::Reorganized { .. })
    }
}

/// Why a candidate chain was not adopted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeepReason {
    Invalid(ValidationError),
    NotHeavier { current: u128, candidate: u128 },
}

/// Result of offering a whole chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Replaced { height: u64, cumulative_difficulty: u128 },
    Kept(KeepReason),
}

/// The chain, its pools and its buffered blocks
#[derive(Debug)]
pub struct Ledger {
    genesis: Block,
    chain: Arc<Vec<Block>>,
    pool: TransactionPool,
    branches: BlockBuffer,
    orphans: BlockBuffer,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Ledger anchored at the default genesis block
    pub fn new() -> Self {
        Self::with_genesis(&GenesisSpec::default())
    }

    /// Ledger anchored at the genesis block built from `spec`
    pub fn with_genesis(spec: &GenesisSpec) -> Self {
        let genesis = create_genesis_block(spec);
        info!(hash = %genesis.hash(), "ledger initialized at genesis");
        Self {
            chain: Arc::new(vec![genesis.clone()]),
            genesis,
            pool: TransactionPool::new(),
            branches: BlockBuffer::new(MAX_BUFFERED_BLOCKS),
            orphans: BlockBuffer::new(MAX_BUFFERED_BLOCKS),
        }
    }

    pub fn genesis(&self) -> &Block {
        &self.genesis
    }

    /// Snapshot of the main chain
    pub fn chain(&self) -> Arc<Vec<Block>> {
        Arc::clone(&self.chain)
    }

    pub fn tip(&self) -> &Block {
        // the chain always holds at least the genesis block
        &self.chain[self.chain.len() - 1]
    }

    pub fn height(&self) -> u64 {
        self.tip().id
    }

    pub fn cumulative_difficulty(&self) -> u128 {
        cumulative_difficulty(&self.chain)
    }

    pub fn pool(&self) -> &TransactionPool {
        &self.pool
    }

    pub fn branch_blocks(&self) -> &BlockBuffer {
        &self.branches
    }

    pub fn orphan_blocks(&self) -> &BlockBuffer {
        &self.orphans
    }

    pub fn block_by_id(&self, id: u64) -> Option<&Block> {
        self.chain.get(usize::try_from(id).ok()?)
    }

    pub fn block_by_hash(&self, hash: &Hash) -> Option<&Block> {
        self.chain.iter().find(|block| block.hash() == *hash)
    }

    /// Transaction on the main chain, or else in a pool
    pub fn transaction_by_hash(&self, hash: &Hash) -> Option<&Transaction> {
        self.chain
            .iter()
            .flat_map(|block| &block.transactions)
            .find(|tx| tx.hash() == *hash)
            .or_else(|| self.pool.find(hash))
    }

    pub fn balance(&self, recipient: &Hash) -> u64 {
        ChainIndex::from_chain(&self.chain).balance(recipient)
    }

    pub fn utxos(&self, recipient: &Hash) -> Vec<UTXO> {
        ChainIndex::from_chain(&self.chain).utxos_for(recipient)
    }

    /// Offer a transaction to the pool
    pub fn add_transaction(&mut self, tx: Transaction, now: u64) -> Result<PoolAdmission, ValidationError> {
        let hash = tx.hash();
        match self.pool.add(tx, &self.chain, now) {
            Ok(admission) => Ok(admission),
            Err(err) => {
                warn!(%hash, error = %err, "transaction rejected");
                Err(err)
            }
        }
    }

    /// Offer a block, from a peer or from the local miner.
    ///
    /// Buffered orphans that connect to an accepted block are processed
    /// right after it.
    pub fn add_block(&mut self, block: Block, now: u64) -> Result<BlockAdmission, ValidationError> {
        let admission = self.admit_block(block, now)?;

        Ok(match admission {
            BlockAdmission::Appended { height, hash, .. } => {
                let connected = self.connect_orphans(hash, height, now);
                BlockAdmission::Appended {
                    height,
                    hash,
                    connected,
                }
            }
            BlockAdmission::Branched { height, hash } | BlockAdmission::Reorganized { height, hash } => {
                self.connect_orphans(hash, height, now);
                admission
            }
            other => other,
        })
    }

    fn admit_block(&mut self, block: Block, now: u64) -> Result<BlockAdmission, ValidationError> {
        let hash = block.hash();
        let height = block.id;

        if block.is_genesis() {
            warn!(%hash, "genesis block resubmitted");
            return Err(ValidationError::GenesisResubmitted);
        }

        let on_chain = self.block_by_id(height).is_some_and(|b| b.hash() == hash);
        if on_chain || self.branches.contains(&hash) || self.orphans.contains(&hash) {
            debug!(height, %hash, "block already known");
            return Ok(BlockAdmission::AlreadyKnown { hash });
        }

        if height == self.height() + 1 && *block.previous_hash() == self.tip().hash() {
            return self.append(block, now).map(|()| BlockAdmission::Appended {
                height,
                hash,
                connected: 0,
            });
        }

        let Some(prefix) = self.branch_prefix(&block) else {
            debug!(height, %hash, "parent unknown, block parked as orphan");
            self.orphans.insert(block);
            return Ok(BlockAdmission::Orphaned { height, hash });
        };

        if let Err(err) = validate_block(&block, &prefix, now) {
            warn!(height, %hash, error = %err, "branch block rejected");
            return Err(err);
        }

        let mut candidate = prefix;
        candidate.push(block.clone());
        self.branches.insert(block);

        let current = self.cumulative_difficulty();
        let weight = cumulative_difficulty(&candidate);
        if weight <= current {
            debug!(height, %hash, weight, current, "block stored on a side branch");
            return Ok(BlockAdmission::Branched { height, hash });
        }

        match self.replace_chain(candidate, now) {
            ReplaceOutcome::Replaced { .. } => Ok(BlockAdmission::Reorganized { height, hash }),
            ReplaceOutcome::Kept(_) => Ok(BlockAdmission::Branched { height, hash }),
        }
    }

    /// Blocks `0..block.id` of the chain `block` builds on, if its ancestry
    /// is known through the main chain and buffered branch blocks
    fn branch_prefix(&self, block: &Block) -> Option<Vec<Block>> {
        let mut path: Vec<&Block> = Vec::new();
        let mut parent = *block.previous_hash();
        let mut height = block.id.checked_sub(1)?;

        loop {
            if let Some(main) = self.block_by_id(height).filter(|b| b.hash() == parent) {
                let fork_point = usize::try_from(main.id).ok()?;
                let mut prefix = self.chain[..=fork_point].to_vec();
                prefix.extend(path.into_iter().rev().cloned());
                return Some(prefix);
            }

            let branch = self.branches.find(height, &parent)?;
            path.push(branch);
            parent = *branch.previous_hash();
            height = height.checked_sub(1)?;
        }
    }

    fn append(&mut self, block: Block, now: u64) -> Result<(), ValidationError> {
        let hash = block.hash();
        if let Err(err) = validate_block(&block, &self.chain, now) {
            warn!(height = block.id, %hash, error = %err, "block rejected");
            return Err(err);
        }

        info!(height = block.id, %hash, transactions = block.transactions.len(), "block appended");
        Arc::make_mut(&mut self.chain).push(block);
        let report = self.pool.reconcile(&self.chain, now);
        debug!(?report, "pools reconciled");
        Ok(())
    }

    /// Feed buffered orphans descending from an accepted block back through
    /// admission; returns how many were accepted
    fn connect_orphans(&mut self, hash: Hash, height: u64, now: u64) -> usize {
        let mut work = vec![(hash, height)];
        let mut connected = 0;

        while let Some((parent, parent_height)) = work.pop() {
            for child in self.orphans.take_children(parent_height + 1, &parent) {
                let child_hash = child.hash();
                match self.admit_block(child, now) {
                    Ok(BlockAdmission::Orphaned { .. } | BlockAdmission::AlreadyKnown { .. }) => {}
                    Ok(_) => {
                        connected += 1;
                        work.push((child_hash, parent_height + 1));
                    }
                    Err(err) => debug!(hash = %child_hash, error = %err, "buffered orphan dropped"),
                }
            }
        }

        connected
    }

    /// Adopt `candidate` if it is valid from genesis and strictly heavier
    pub fn replace_chain(&mut self, candidate: Vec<Block>, now: u64) -> ReplaceOutcome {
        let result = match validate_chain(&candidate, &self.genesis, now) {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "candidate chain invalid, keeping current chain");
                return ReplaceOutcome::Kept(KeepReason::Invalid(err));
            }
        };

        let current = self.cumulative_difficulty();
        if result.cumulative_difficulty <= current {
            info!(
                current,
                candidate = result.cumulative_difficulty,
                "candidate chain not heavier, keeping current chain"
            );
            return ReplaceOutcome::Kept(KeepReason::NotHeavier {
                current,
                candidate: result.cumulative_difficulty,
            });
        }

        let old = std::mem::replace(&mut self.chain, Arc::new(candidate));
        let fork = old
            .iter()
            .zip(self.chain.iter())
            .take_while(|(a, b)| a.hash() == b.hash())
            .count();
        let abandoned: Vec<Transaction> = old[fork..]
            .iter()
            .flat_map(|block| block.transactions.iter().cloned())
            .collect();

        info!(
            height = result.height,
            tip = %result.tip_hash,
            fork_height = fork,
            "chain replaced"
        );

        let chain = Arc::clone(&self.chain);
        self.branches.retain(|block| {
            usize::try_from(block.id)
                .ok()
                .and_then(|id| chain.get(id))
                .map_or(true, |main| main.hash() != block.hash())
        });
        let report = self.pool.reconcile(&chain, now);
        let restored = self.pool.restore(abandoned, &chain);
        debug!(?report, restored, "pools reconciled after replacement");

        // the abandoned suffix may still be a useful branch
        for block in old[fork..].iter().cloned() {
            self.branches.insert(block);
        }

        ReplaceOutcome::Replaced {
            height: result.height,
            cumulative_difficulty: result.cumulative_difficulty,
        }
    }

    /// Build an unsealed block on the current tip paying `recipient`
    pub fn assemble_block(&self, recipient: Hash, now: u64) -> Block {
        let tip = self.tip();
        let id = tip.id + 1;

        let transactions = self.pool.select_for_block(&self.chain, MAX_TRANSACTIONS_SIZE, now);
        let fees = ChainIndex::from_chain(&self.chain)
            .total_fees(&transactions)
            .unwrap_or(0);
        let reward = calculate_block_reward(id).saturating_add(fees);

        let mut all = Vec::with_capacity(transactions.len() + 1);
        all.push(Transaction::coinbase(recipient, id, reward, COINBASE_MEMO, now));
        all.extend(transactions);

        let bits = retarget(id, now, &self.chain).unwrap_or(tip.header.bits);
        let header = BlockHeader::new(PROTOCOL_VERSION, tip.hash(), Hash::zero(), now, bits, 0);

        let mut block = Block::new(id, header, all);
        block.header.merkle_root = block.compute_merkle_root().unwrap_or_default();
        block
    }
}
