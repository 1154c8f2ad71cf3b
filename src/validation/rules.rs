//! Transaction validation rules
//!
//! The same checks serve pool admission and block validation; they differ
//! only in the spend rule applied to each input.

use crate::constants::TRANSACTION_VERSION;
use crate::consensus::ValidationError;
use crate::crypto::Hash;
use crate::storage::ChainIndex;

use super::Transaction;

/// How an input's previous output must appear in the checked segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendRule {
    /// Never referenced (pool and standalone transactions)
    Unspent,
    /// Referenced exactly once (transactions inside a block, where the
    /// segment includes the block itself)
    SpentOnce,
}

/// Expected coinbase contents for the block being validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinbaseContext {
    /// Height of the block
    pub height: u64,
    /// Block reward plus the fees of the block's other transactions
    pub value: u64,
}

/// Shape checks that need no chain context
pub fn validate_structure(tx: &Transaction) -> Result<(), ValidationError> {
    if tx.inputs.is_empty() {
        return Err(ValidationError::Malformed("transaction has no inputs".into()));
    }
    if tx.outputs.is_empty() {
        return Err(ValidationError::Malformed("transaction has no outputs".into()));
    }

    let coinbase = tx.is_coinbase();
    for (index, input) in tx.inputs.iter().enumerate() {
        // DER: the second element is the length of what follows it
        let declared = input.signature.get(1).copied();
        if declared.and_then(|len| len.checked_add(2)) != Some(input.signature.len() as u64) {
            return Err(ValidationError::Malformed(format!(
                "input {index} signature length does not match its header"
            )));
        }

        if coinbase {
            continue;
        }
        if input.output_index < 0 {
            return Err(ValidationError::Malformed(format!(
                "input {index} has negative output index"
            )));
        }
        if input.signature_bytes().is_none() {
            return Err(ValidationError::Malformed(format!(
                "input {index} signature element exceeds a byte"
            )));
        }
    }

    Ok(())
}

/// Validate a transaction against a chain segment.
///
/// A coinbase is only acceptable with a `CoinbaseContext`; everything else
/// must spend outputs found in `index`, signed by their owners, under
/// `rule`.
pub fn validate_transaction(
    tx: &Transaction,
    index: &ChainIndex<'_>,
    rule: SpendRule,
    coinbase: Option<CoinbaseContext>,
) -> Result<(), ValidationError> {
    validate_structure(tx)?;

    if tx.version != TRANSACTION_VERSION {
        return Err(ValidationError::UnsupportedTransactionVersion(tx.version));
    }

    if tx.is_coinbase() {
        let context = coinbase.ok_or(ValidationError::UnexpectedCoinbase)?;
        return validate_coinbase(tx, context);
    }

    let mut spent = Vec::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        let output = index
            .find_output(&input.previous_transaction_hash, input.output_index)
            .ok_or(ValidationError::MissingPreviousOutput {
                transaction_hash: input.previous_transaction_hash,
                output_index: input.output_index,
            })?;
        spent.push(output);
    }

    let recipients: Vec<Hash> = spent.iter().map(|o| o.recipient_public_key_hash).collect();
    let message = tx.signing_message(&recipients);

    for (position, (input, output)) in tx.inputs.iter().zip(&spent).enumerate() {
        if input.sender_public_key.hash() != output.recipient_public_key_hash {
            return Err(ValidationError::PublicKeyMismatch { index: position });
        }

        let signature = input
            .signature_bytes()
            .ok_or(ValidationError::InvalidSignature { index: position })?;
        if !input.sender_public_key.verify(&message, &signature) {
            return Err(ValidationError::InvalidSignature { index: position });
        }

        let (hash, output_index) = input.outpoint();
        let spendable = match rule {
            SpendRule::Unspent => index.is_unspent(&hash, output_index),
            SpendRule::SpentOnce => index.is_spent_once(&hash, output_index),
        };
        if !spendable {
            return Err(ValidationError::DoubleSpend {
                transaction_hash: hash,
                output_index,
            });
        }
    }

    let inputs = spent
        .iter()
        .try_fold(0u64, |acc, o| acc.checked_add(o.value))
        .ok_or(ValidationError::ValueOverflow)?;
    let outputs = tx.total_output_value().ok_or(ValidationError::ValueOverflow)?;
    if inputs < outputs {
        return Err(ValidationError::InsufficientInputs { inputs, outputs });
    }

    Ok(())
}

fn validate_coinbase(tx: &Transaction, context: CoinbaseContext) -> Result<(), ValidationError> {
    let height = tx.coinbase_height().unwrap_or(u64::MAX);
    if height != context.height {
        return Err(ValidationError::InvalidCoinbaseHeight {
            expected: context.height,
            found: height,
        });
    }

    let value = tx.total_output_value().ok_or(ValidationError::ValueOverflow)?;
    if value != context.value {
        return Err(ValidationError::InvalidCoinbaseValue {
            expected: context.value,
            found: value,
        });
    }

    Ok(())
}
