//! Wallet implementation
//!
//! Handles key generation, coin selection and transaction signing.
//! The wallet does NOT affect consensus - every transaction it builds is
//! validated like any other.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consensus::Block;
use crate::crypto::{Hash, PrivateKey, PublicKey};
use crate::storage::find_unspent_outputs;
use crate::validation::{Transaction, TxInput, TxOutput};

/// Wallet errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },
    #[error("Transfer request has no recipients")]
    EmptyTransfer,
    #[error("Transfer amount overflows")]
    Overflow,
    #[error("Invalid private key")]
    InvalidKey,
}

/// A wallet key pair
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// Private key (for signing)
    private_key: PrivateKey,
    /// Public key
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        Self::from_private_key(PrivateKey::generate())
    }

    fn from_private_key(private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();
        Self {
            private_key,
            public_key,
        }
    }

    /// Import from a hex-encoded private key
    pub fn from_private_key_hex(hex: &str) -> Result<Self, WalletError> {
        PrivateKey::from_hex(hex)
            .map(Self::from_private_key)
            .map_err(|_| WalletError::InvalidKey)
    }

    /// Export private key bytes
    pub fn private_key_bytes(&self) -> [u8; 32] {
        self.private_key.to_bytes()
    }

    /// Get the public key hash (used in outputs)
    pub fn pubkey_hash(&self) -> Hash {
        self.public_key.hash()
    }

    /// Sign a message, returning the DER bytes widened for the wire
    pub fn sign(&self, message: &Hash) -> Vec<u64> {
        self.private_key
            .sign(message)
            .into_iter()
            .map(u64::from)
            .collect()
    }
}

/// One payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub recipient_public_key_hash: Hash,
    pub value: u64,
}

/// One payment or several, with the fee paid for the whole transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferRequest {
    One { transfer: Transfer, fee: u64 },
    Many { transfers: Vec<Transfer>, fee: u64 },
}

impl TransferRequest {
    pub fn one(recipient: Hash, value: u64, fee: u64) -> Self {
        Self::One {
            transfer: Transfer {
                recipient_public_key_hash: recipient,
                value,
            },
            fee,
        }
    }

    /// Normalize to the list form
    pub fn into_parts(self) -> (Vec<Transfer>, u64) {
        match self {
            Self::One { transfer, fee } => (vec![transfer], fee),
            Self::Many { transfers, fee } => (transfers, fee),
        }
    }
}

/// Create and sign a transaction paying `request` from `keypair`'s outputs
/// on `chain`.
///
/// Outputs are consumed smallest first until the transfers plus the fee are
/// covered; any excess returns to the sender as a change output.
pub fn create_transaction(
    keypair: &KeyPair,
    request: TransferRequest,
    chain: &[Block],
    memo: &str,
    now: u64,
) -> Result<Transaction, WalletError> {
    let (transfers, fee) = request.into_parts();
    if transfers.is_empty() {
        return Err(WalletError::EmptyTransfer);
    }

    let total_needed = transfers
        .iter()
        .try_fold(fee, |acc, t| acc.checked_add(t.value))
        .ok_or(WalletError::Overflow)?;

    let sender = keypair.pubkey_hash();
    let available = find_unspent_outputs(chain, &sender);

    // Collect UTXOs until we have enough
    let mut selected = Vec::new();
    let mut total_input: u64 = 0;
    for utxo in available {
        if total_input >= total_needed {
            break;
        }
        total_input = total_input.checked_add(utxo.value).ok_or(WalletError::Overflow)?;
        selected.push(utxo);
    }

    if total_input < total_needed {
        return Err(WalletError::InsufficientFunds {
            have: total_input,
            need: total_needed,
        });
    }

    let mut outputs: Vec<TxOutput> = transfers
        .iter()
        .map(|t| TxOutput {
            recipient_public_key_hash: t.recipient_public_key_hash,
            value: t.value,
        })
        .collect();

    // Add change output if needed
    let change = total_input - total_needed;
    if change > 0 {
        outputs.push(TxOutput {
            recipient_public_key_hash: sender,
            value: change,
        });
    }

    let inputs: Vec<TxInput> = selected
        .iter()
        .map(|utxo| TxInput {
            previous_transaction_hash: utxo.transaction_hash,
            output_index: utxo.output_index,
            signature: Vec::new(),
            sender_public_key: keypair.public_key,
        })
        .collect();

    let mut tx = Transaction::new(inputs, outputs, memo, now);

    // Sign each input
    let recipients: Vec<Hash> = selected.iter().map(|u| u.recipient_public_key_hash).collect();
    let message = tx.signing_message(&recipients);
    for input in &mut tx.inputs {
        input.signature = keypair.sign(&message);
    }

    debug!(hash = %tx.hash(), inputs = selected.len(), change, "transaction created");
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::BlockHeader;
    use crate::storage::ChainIndex;
    use crate::validation::{validate_transaction, SpendRule};

    fn funded_chain(owner: &KeyPair, values: &[u64]) -> Vec<Block> {
        let header = BlockHeader::new(1, Hash::zero(), Hash::zero(), 0, 0, 0);
        values
            .iter()
            .enumerate()
            .map(|(id, value)| {
                let cb = Transaction::coinbase(owner.pubkey_hash(), id as u64, *value, "", 0);
                Block::new(id as u64, header.clone(), vec![cb])
            })
            .collect()
    }

    #[test]
    fn test_keypair_export_import() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::from_private_key_hex(&hex::encode(kp1.private_key_bytes())).unwrap();

        assert_eq!(kp1.public_key, kp2.public_key);
        assert_eq!(kp1.pubkey_hash(), kp2.pubkey_hash());
        assert_eq!(KeyPair::from_private_key_hex("zz").unwrap_err(), WalletError::InvalidKey);
    }

    #[test]
    fn test_pays_with_change() {
        let owner = KeyPair::generate();
        let bob = KeyPair::generate().pubkey_hash();
        let chain = funded_chain(&owner, &[50, 50]);

        let tx = create_transaction(&owner, TransferRequest::one(bob, 30, 1), &chain, "hi", 5).unwrap();

        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.inputs[0].previous_transaction_hash, chain[0].transactions[0].hash());
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!((tx.outputs[0].recipient_public_key_hash, tx.outputs[0].value), (bob, 30));
        assert_eq!(
            (tx.outputs[1].recipient_public_key_hash, tx.outputs[1].value),
            (owner.pubkey_hash(), 19)
        );

        let index = ChainIndex::from_chain(&chain);
        assert_eq!(validate_transaction(&tx, &index, SpendRule::Unspent, None), Ok(()));
        assert_eq!(index.transaction_fee(&tx), Some(1));
    }

    #[test]
    fn test_smallest_outputs_first_and_exact_amount() {
        let owner = KeyPair::generate();
        let bob = KeyPair::generate().pubkey_hash();
        let chain = funded_chain(&owner, &[40, 5, 10]);

        let request = TransferRequest::Many {
            transfers: vec![
                Transfer { recipient_public_key_hash: bob, value: 10 },
                Transfer { recipient_public_key_hash: bob, value: 4 },
            ],
            fee: 1,
        };
        let tx = create_transaction(&owner, request, &chain, "", 5).unwrap();

        // 5 + 10 covers exactly 15, no change
        assert_eq!(tx.inputs.len(), 2);
        assert_eq!(tx.outputs.len(), 2);
        let index = ChainIndex::from_chain(&chain);
        assert_eq!(index.input_value(&tx), Some(15));
        assert_eq!(validate_transaction(&tx, &index, SpendRule::Unspent, None), Ok(()));
    }

    #[test]
    fn test_insufficient_funds() {
        let owner = KeyPair::generate();
        let chain = funded_chain(&owner, &[50]);

        let result = create_transaction(&owner, TransferRequest::one(Hash::zero(), 50, 1), &chain, "", 0);
        assert_eq!(result, Err(WalletError::InsufficientFunds { have: 50, need: 51 }));
    }

    #[test]
    fn test_empty_request() {
        let owner = KeyPair::generate();
        let chain = funded_chain(&owner, &[50]);
        let request = TransferRequest::Many { transfers: vec![], fee: 0 };
        assert_eq!(
            create_transaction(&owner, request, &chain, "", 0),
            Err(WalletError::EmptyTransfer)
        );
    }
}
