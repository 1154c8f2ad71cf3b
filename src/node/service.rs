//! Node facade
//!
//! Wraps the ledger in a single read/write lock and ties it to the miner
//! and the broadcast queue. Every mutation holds the write lock for its
//! whole duration; reads only copy out what they need.

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::{debug, info};

use crate::consensus::{Block, ValidationError};
use crate::crypto::Hash;
use crate::mempool::PoolAdmission;
use crate::mining::{Miner, MiningResult};
use crate::now_millis;
use crate::p2p::{Broadcaster, PeerError, PeerRegistry};
use crate::storage::{BlockAdmission, Ledger, ReplaceOutcome, UTXO};
use crate::validation::Transaction;

/// Node errors
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Peer(#[from] PeerError),
    #[error("mining interrupted")]
    MiningInterrupted,
    #[error("mining task failed: {0}")]
    MiningTask(String),
}

/// A running node
#[derive(Debug, Clone)]
pub struct Node {
    ledger: Arc<RwLock<Ledger>>,
    miner: Miner,
    broadcaster: Broadcaster,
    peers: Arc<Mutex<PeerRegistry>>,
}

impl Node {
    pub fn new(ledger: Ledger, miner: Miner, broadcaster: Broadcaster, peers: PeerRegistry) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
            miner,
            broadcaster,
            peers: Arc::new(Mutex::new(peers)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Ledger> {
        self.ledger.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Ledger> {
        self.ledger.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shared handle to the peer registry, for the broadcast dispatcher
    pub fn peer_registry(&self) -> Arc<Mutex<PeerRegistry>> {
        Arc::clone(&self.peers)
    }

    pub fn miner(&self) -> &Miner {
        &self.miner
    }

    // ---- reads ----

    pub fn chain(&self) -> Arc<Vec<Block>> {
        self.read().chain()
    }

    pub fn height(&self) -> u64 {
        self.read().height()
    }

    pub fn cumulative_difficulty(&self) -> u128 {
        self.read().cumulative_difficulty()
    }

    pub fn block_by_id(&self, id: u64) -> Option<Block> {
        self.read().block_by_id(id).cloned()
    }

    pub fn block_by_hash(&self, hash: &Hash) -> Option<Block> {
        self.read().block_by_hash(hash).cloned()
    }

    pub fn transaction_by_hash(&self, hash: &Hash) -> Option<Transaction> {
        self.read().transaction_by_hash(hash).cloned()
    }

    /// Valid-pool transactions
    pub fn pool(&self) -> Vec<Transaction> {
        self.read().pool().valid().to_vec()
    }

    /// Orphan-pool transactions
    pub fn orphan_pool(&self) -> Vec<Transaction> {
        self.read().pool().orphans().to_vec()
    }

    pub fn balance(&self, recipient: &Hash) -> u64 {
        self.read().balance(recipient)
    }

    pub fn utxos(&self, recipient: &Hash) -> Vec<UTXO> {
        self.read().utxos(recipient)
    }

    // ---- mutations ----

    /// Assemble a block paying `recipient`, search its nonce on a blocking
    /// task and offer the result to the ledger.
    ///
    /// Returns `MiningInterrupted` if `Miner::stop` was called meanwhile.
    pub async fn mine_next_block(&self, recipient: Hash) -> Result<BlockAdmission, NodeError> {
        let template = self.block_template(recipient);
        self.seal_block(template).await
    }

    /// Clear the stop flag, then build a template on the current tip.
    ///
    /// The flag is cleared first: a tip change seen after this point raises
    /// it again and interrupts the search on this template.
    fn block_template(&self, recipient: Hash) -> Block {
        self.miner.reset();
        let template = self.read().assemble_block(recipient, now_millis());
        debug!(height = template.id, bits = template.header.bits, "mining block");
        template
    }

    async fn seal_block(&self, template: Block) -> Result<BlockAdmission, NodeError> {
        let miner = self.miner.clone();
        let result = tokio::task::spawn_blocking(move || miner.mine_block(template))
            .await
            .map_err(|e| NodeError::MiningTask(e.to_string()))?;

        let block = match result {
            MiningResult::Success(block) => block,
            MiningResult::Interrupted => return Err(NodeError::MiningInterrupted),
        };

        let admission = self.write().add_block(block.clone(), now_millis())?;
        if admission.moved_tip() {
            info!(height = block.id, hash = %block.hash(), "mined block accepted");
            self.broadcaster.announce_block(&block);
        }
        Ok(admission)
    }

    /// Transaction from a local client
    pub fn submit_transaction(&self, tx: Transaction) -> Result<PoolAdmission, NodeError> {
        self.admit_transaction(tx)
    }

    /// Transaction announced by a peer
    pub fn receive_peer_transaction(&self, tx: Transaction) -> Result<PoolAdmission, NodeError> {
        self.admit_transaction(tx)
    }

    fn admit_transaction(&self, tx: Transaction) -> Result<PoolAdmission, NodeError> {
        let admission = self.write().add_transaction(tx.clone(), now_millis())?;
        if let PoolAdmission::Accepted(_) = admission {
            self.broadcaster.announce_transaction(&tx);
        }
        Ok(admission)
    }

    /// Block announced by a peer
    ///
    /// A block that moves the tip stops the local nonce search, which
    /// would otherwise finish a block on a stale parent.
    pub fn receive_peer_block(&self, block: Block) -> Result<BlockAdmission, NodeError> {
        let admission = self.write().add_block(block.clone(), now_millis())?;
        if admission.moved_tip() {
            self.miner.stop();
            self.broadcaster.announce_block(&block);
        }
        Ok(admission)
    }

    /// Whole chain offered by a peer
    pub fn receive_peer_chain(&self, chain: Vec<Block>) -> ReplaceOutcome {
        let outcome = self.write().replace_chain(chain, now_millis());
        if let ReplaceOutcome::Replaced { .. } = outcome {
            self.miner.stop();
        }
        outcome
    }

    pub fn register_peer_url(&self, url: &str) -> Result<(), NodeError> {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .register(url)?;
        Ok(())
    }
}
