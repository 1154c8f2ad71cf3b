//! Unspent output accounting
//!
//! Nothing here is primary state. A `ChainIndex` is built by scanning a
//! chain (plus, optionally, a block being checked) and answers output and
//! spend queries over exactly that segment.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::consensus::Block;
use crate::crypto::Hash;
use crate::validation::{Transaction, TxOutput};

/// Key for output lookup: (transaction hash, output index)
pub type OutPoint = (Hash, i64);

/// Unspent transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UTXO {
    pub transaction_hash: Hash,
    pub output_index: i64,
    pub recipient_public_key_hash: Hash,
    pub value: u64,
    /// Height of the block that created the output
    pub height: u64,
}

#[derive(Debug, Clone, Copy)]
struct Indexed<'a> {
    transaction: &'a Transaction,
    height: u64,
}

/// Transactions and spend counts of a chain segment
#[derive(Debug, Default, Clone)]
pub struct ChainIndex<'a> {
    transactions: HashMap<Hash, Indexed<'a>>,
    /// Transaction hashes in chain order
    order: Vec<Hash>,
    spends: HashMap<OutPoint, usize>,
}

impl<'a> ChainIndex<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every block of `chain`
    pub fn from_chain(chain: &'a [Block]) -> Self {
        let mut index = Self::new();
        for block in chain {
            index.apply_block(block);
        }
        index
    }

    /// Add a block's transactions to the index
    pub fn apply_block(&mut self, block: &'a Block) {
        for tx in &block.transactions {
            self.apply_transaction(tx, block.id);
        }
    }

    /// Add a transaction: record its outputs and count its spends
    pub fn apply_transaction(&mut self, tx: &'a Transaction, height: u64) {
        let hash = tx.hash();
        if !self.transactions.contains_key(&hash) {
            self.transactions.insert(hash, Indexed { transaction: tx, height });
            self.order.push(hash);
        }

        if !tx.is_coinbase() {
            for outpoint in tx.outpoints() {
                *self.spends.entry(outpoint).or_insert(0) += 1;
            }
        }
    }

    pub fn contains_transaction(&self, hash: &Hash) -> bool {
        self.transactions.contains_key(hash)
    }

    pub fn find_transaction(&self, hash: &Hash) -> Option<&'a Transaction> {
        self.transactions.get(hash).map(|entry| entry.transaction)
    }

    /// Look up the output `index` of transaction `hash`
    pub fn find_output(&self, hash: &Hash, index: i64) -> Option<&'a TxOutput> {
        let position = usize::try_from(index).ok()?;
        self.find_transaction(hash)?.outputs.get(position)
    }

    /// Number of inputs in the segment referencing the output
    pub fn spend_count(&self, hash: &Hash, index: i64) -> usize {
        self.spends.get(&(*hash, index)).copied().unwrap_or(0)
    }

    /// Output is never referenced by an input in the segment
    pub fn is_unspent(&self, hash: &Hash, index: i64) -> bool {
        self.spend_count(hash, index) == 0
    }

    /// Output is referenced by exactly one input in the segment
    pub fn is_spent_once(&self, hash: &Hash, index: i64) -> bool {
        self.spend_count(hash, index) == 1
    }

    /// Unspent outputs paying `recipient`, ascending by value
    ///
    /// Ties keep chain order.
    pub fn utxos_for(&self, recipient: &Hash) -> Vec<UTXO> {
        let mut utxos: Vec<UTXO> = self
            .order
            .iter()
            .filter_map(|hash| self.transactions.get(hash).map(|entry| (hash, entry)))
            .flat_map(|(hash, entry)| {
                entry
                    .transaction
                    .outputs
                    .iter()
                    .enumerate()
                    .map(move |(i, output)| (*hash, i as i64, output, entry.height))
            })
            .filter(|(hash, i, output, _)| {
                output.recipient_public_key_hash == *recipient && self.is_unspent(hash, *i)
            })
            .map(|(hash, i, output, height)| UTXO {
                transaction_hash: hash,
                output_index: i,
                recipient_public_key_hash: output.recipient_public_key_hash,
                value: output.value,
                height,
            })
            .collect();

        utxos.sort_by_key(|utxo| utxo.value);
        utxos
    }

    /// Sum of the unspent outputs paying `recipient`
    pub fn balance(&self, recipient: &Hash) -> u64 {
        self.utxos_for(recipient)
            .iter()
            .fold(0u64, |acc, utxo| acc.saturating_add(utxo.value))
    }

    /// Sum of the values a transaction's inputs spend, `None` if an
    /// output is missing or the sum overflows
    pub fn input_value(&self, tx: &Transaction) -> Option<u64> {
        tx.outpoints().try_fold(0u64, |acc, (hash, index)| {
            acc.checked_add(self.find_output(&hash, index)?.value)
        })
    }

    /// Inputs minus outputs
    pub fn transaction_fee(&self, tx: &Transaction) -> Option<u64> {
        self.input_value(tx)?.checked_sub(tx.total_output_value()?)
    }

    /// Fees of every non-coinbase transaction in `transactions`
    pub fn total_fees<'t>(&self, transactions: impl IntoIterator<Item = &'t Transaction>) -> Option<u64> {
        transactions
            .into_iter()
            .filter(|tx| !tx.is_coinbase())
            .try_fold(0u64, |acc, tx| acc.checked_add(self.transaction_fee(tx)?))
    }
}

/// Unspent outputs of `recipient` on `chain`, ascending by value
pub fn find_unspent_outputs(chain: &[Block], recipient: &Hash) -> Vec<UTXO> {
    ChainIndex::from_chain(chain).utxos_for(recipient)
}

/// Balance of `recipient` on `chain`
pub fn balance(chain: &[Block], recipient: &Hash) -> u64 {
    ChainIndex::from_chain(chain).balance(recipient)
}
