//! Block miner implementation
//!
//! Performs the nonce search over assembled block templates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::consensus::{is_valid_pow, Block, BlockHeader};
use crate::crypto::Hash;

/// Mining result
#[derive(Debug)]
pub enum MiningResult {
    /// Successfully mined a block
    Success(Block),
    /// Mining was interrupted
    Interrupted,
}

/// Smallest nonce, counting up from zero, meeting the header's bits.
///
/// Every other header field is held fixed.
pub fn mine_nonce(header: &BlockHeader) -> u64 {
    let never = AtomicBool::new(false);
    // The u64 range is never exhausted at any satisfiable difficulty.
    search_nonce(header, &never).unwrap_or(u64::MAX)
}

/// Nonce search that gives up once `stop` is raised
///
/// The flag is polled before every attempt.
pub fn search_nonce(header: &BlockHeader, stop: &AtomicBool) -> Option<u64> {
    let mut candidate = header.clone();
    candidate.nonce = 0;

    loop {
        if stop.load(Ordering::SeqCst) {
            return None;
        }

        if is_valid_pow(&candidate.hash(), candidate.bits) {
            return Some(candidate.nonce);
        }

        candidate.nonce = candidate.nonce.checked_add(1)?;
    }
}

/// Block miner
#[derive(Debug, Clone)]
pub struct Miner {
    /// Miner's public key hash (for coinbase)
    miner_pubkey_hash: Hash,
    /// Stop signal
    stop_signal: Arc<AtomicBool>,
}

impl Miner {
    /// Create a new miner
    pub fn new(miner_pubkey_hash: Hash) -> Self {
        Self {
            miner_pubkey_hash,
            stop_signal: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Public key hash paid by this miner's coinbases
    pub fn recipient(&self) -> Hash {
        self.miner_pubkey_hash
    }

    /// Get a stop signal handle
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_signal)
    }

    /// Stop mining
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Reset stop signal
    pub fn reset(&self) {
        self.stop_signal.store(false, Ordering::SeqCst);
    }

    /// Mine a block (find valid nonce)
    ///
    /// This performs the PoW loop until a valid hash is found or mining is
    /// interrupted.
    pub fn mine_block(&self, mut block: Block) -> MiningResult {
        match search_nonce(&block.header, &self.stop_signal) {
            Some(nonce) => {
                block.header.nonce = nonce;
                debug!(height = block.id, nonce, hash = %block.hash(), "nonce found");
                MiningResult::Success(block)
            }
            None => {
                debug!(height = block.id, "mining interrupted");
                MiningResult::Interrupted
            }
        }
    }
}
