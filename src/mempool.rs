//! Transaction pool
//!
//! Two pools: `valid` holds transactions that pass validation against the
//! current chain and never conflict with each other, `orphans` holds
//! transactions spending outputs of transactions the chain does not have yet.

use std::collections::HashSet;

use tracing::debug;

use crate::constants::{MAX_ORPHAN_TRANSACTIONS, TRANSACTION_MAX_AGE_MS};
use crate::consensus::{Block, ValidationError};
use crate::crypto::Hash;
use crate::storage::{ChainIndex, OutPoint};
use crate::validation::{validate_structure, validate_transaction, SpendRule, Transaction};

/// Result of offering a transaction to the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolAdmission {
    /// Entered the valid pool
    Accepted(Hash),
    /// Parked until its inputs become known
    Orphaned(Hash),
}

/// What a reconciliation pass changed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Valid-pool entries dropped because they no longer validate
    pub dropped: usize,
    /// Orphans promoted into the valid pool
    pub promoted: usize,
    /// Orphans whose inputs resolved but failed validation
    pub discarded: usize,
    /// Unresolved orphans past the transaction age limit
    pub expired: usize,
}

#[derive(Debug)]
pub struct TransactionPool {
    valid: Vec<Transaction>,
    orphans: Vec<Transaction>,
    orphan_hashes: HashSet<Hash>,
    orphan_capacity: usize,
}

impl Default for TransactionPool {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::with_orphan_capacity(MAX_ORPHAN_TRANSACTIONS)
    }

    /// Pool holding at most `capacity` orphans
    pub fn with_orphan_capacity(capacity: usize) -> Self {
        Self {
            valid: Vec::new(),
            orphans: Vec::new(),
            orphan_hashes: HashSet::new(),
            orphan_capacity: capacity,
        }
    }

    pub fn valid(&self) -> &[Transaction] {
        &self.valid
    }

    pub fn orphans(&self) -> &[Transaction] {
        &self.orphans
    }

    pub fn len(&self) -> usize {
        self.valid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }

    /// Look up a transaction in either pool
    pub fn find(&self, hash: &Hash) -> Option<&Transaction> {
        self.valid
            .iter()
            .chain(&self.orphans)
            .find(|tx| tx.hash() == *hash)
    }

    /// Offer a transaction submitted at `now`
    pub fn add(
        &mut self,
        tx: Transaction,
        chain: &[Block],
        now: u64,
    ) -> Result<PoolAdmission, ValidationError> {
        let index = ChainIndex::from_chain(chain);
        self.admit(tx, &index, Some(now))
    }

    /// Put transactions from abandoned blocks back, skipping the age check
    pub fn restore(&mut self, transactions: Vec<Transaction>, chain: &[Block]) -> usize {
        let index = ChainIndex::from_chain(chain);
        transactions
            .into_iter()
            .filter(|tx| !tx.is_coinbase())
            .filter(|tx| matches!(self.admit(tx.clone(), &index, None), Ok(PoolAdmission::Accepted(_))))
            .count()
    }

    fn admit(
        &mut self,
        tx: Transaction,
        index: &ChainIndex<'_>,
        now: Option<u64>,
    ) -> Result<PoolAdmission, ValidationError> {
        if tx.is_coinbase() {
            return Err(ValidationError::UnexpectedCoinbase);
        }
        validate_structure(&tx)?;

        if let Some(now) = now {
            let age_ms = now.saturating_sub(tx.timestamp);
            if age_ms > TRANSACTION_MAX_AGE_MS {
                return Err(ValidationError::StaleTransaction { age_ms });
            }
        }

        let hash = tx.hash();
        let resolved = tx
            .inputs
            .iter()
            .all(|input| index.contains_transaction(&input.previous_transaction_hash));
        if !resolved {
            self.park_orphan(hash, tx);
            return Ok(PoolAdmission::Orphaned(hash));
        }

        validate_transaction(&tx, index, SpendRule::Unspent, None)?;

        if let Some((transaction_hash, output_index)) = self.conflict(&tx) {
            return Err(ValidationError::DoubleSpend {
                transaction_hash,
                output_index,
            });
        }

        debug!(%hash, "transaction accepted into pool");
        self.valid.push(tx);
        Ok(PoolAdmission::Accepted(hash))
    }

    /// Store an orphan, evicting the oldest one when full
    fn park_orphan(&mut self, hash: Hash, tx: Transaction) {
        if self.orphan_capacity == 0 || !self.orphan_hashes.insert(hash) {
            return;
        }

        if self.orphans.len() >= self.orphan_capacity {
            let oldest = self
                .orphans
                .iter()
                .enumerate()
                .min_by_key(|(_, o)| o.timestamp)
                .map(|(position, _)| position);
            if let Some(position) = oldest {
                let evicted = self.orphans.remove(position);
                self.orphan_hashes.remove(&evicted.hash());
                debug!(hash = %evicted.hash(), "orphan pool full, oldest evicted");
            }
        }

        debug!(%hash, "transaction parked as orphan");
        self.orphans.push(tx);
    }

    /// First output spent both by `tx` and by a valid-pool entry
    fn conflict(&self, tx: &Transaction) -> Option<OutPoint> {
        let claimed: HashSet<OutPoint> = self.valid.iter().flat_map(Transaction::outpoints).collect();
        tx.outpoints().find(|outpoint| claimed.contains(outpoint))
    }

    /// Bring both pools in line with a new chain.
    ///
    /// Valid entries that no longer validate are dropped; orphans whose
    /// inputs now resolve are admitted (or discarded if they fail), and
    /// unresolved orphans past the age limit expire.
    pub fn reconcile(&mut self, chain: &[Block], now: u64) -> Reconciliation {
        let index = ChainIndex::from_chain(chain);
        let mut report = Reconciliation::default();

        let before = self.valid.len();
        self.valid
            .retain(|tx| validate_transaction(tx, &index, SpendRule::Unspent, None).is_ok());
        report.dropped = before - self.valid.len();

        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.orphans)
            .into_iter()
            .partition(|tx| {
                tx.inputs
                    .iter()
                    .all(|input| index.contains_transaction(&input.previous_transaction_hash))
            });

        let before = waiting.len();
        self.orphans = waiting
            .into_iter()
            .filter(|tx| now.saturating_sub(tx.timestamp) <= TRANSACTION_MAX_AGE_MS)
            .collect();
        report.expired = before - self.orphans.len();
        self.orphan_hashes = self.orphans.iter().map(Transaction::hash).collect();

        for tx in ready {
            match self.admit(tx, &index, Some(now)) {
                Ok(PoolAdmission::Accepted(_)) => report.promoted += 1,
                Ok(PoolAdmission::Orphaned(_)) => {}
                Err(err) => {
                    debug!(error = %err, "orphan transaction discarded");
                    report.discarded += 1;
                }
            }
        }

        report
    }

    /// Choose valid-pool transactions for a block template
    ///
    /// Highest fee per byte first until half of `limit` is used, then oldest
    /// first (never future-dated) while the next one still fits.
    pub fn select_for_block(&self, chain: &[Block], limit: usize, now: u64) -> Vec<Transaction> {
        let index = ChainIndex::from_chain(chain);
        let sized: Vec<(&Transaction, usize, u64)> = self
            .valid
            .iter()
            .map(|tx| (tx, tx.size(), index.transaction_fee(tx).unwrap_or(0)))
            .collect();

        let mut by_fee_rate: Vec<usize> = (0..sized.len()).collect();
        // a/sa > b/sb compared without division
        by_fee_rate.sort_by(|&a, &b| {
            let (_, size_a, fee_a) = sized[a];
            let (_, size_b, fee_b) = sized[b];
            (fee_b as u128 * size_a as u128).cmp(&(fee_a as u128 * size_b as u128))
        });

        let mut taken: HashSet<usize> = HashSet::new();
        let mut selected = Vec::new();
        let mut total = 0usize;

        for position in by_fee_rate {
            if total >= limit / 2 {
                break;
            }
            let (tx, size, _) = sized[position];
            if total + size > limit {
                continue;
            }
            total += size;
            taken.insert(position);
            selected.push(tx.clone());
        }

        let mut by_age: Vec<usize> = (0..sized.len())
            .filter(|p| !taken.contains(p))
            .filter(|&p| sized[p].0.timestamp <= now)
            .collect();
        by_age.sort_by_key(|&p| sized[p].0.timestamp);

        for position in by_age {
            let (tx, size, _) = sized[position];
            if total + size > limit {
                continue;
            }
            total += size;
            selected.push(tx.clone());
        }

        selected
    }
}
