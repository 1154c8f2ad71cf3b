//! Transaction structure
//!
//! UTXO-based transactions with ECDSA signatures.

use serde::{Deserialize, Serialize};

use crate::constants::TRANSACTION_VERSION;
use crate::crypto::{Canonical, Hash, PublicKey};

/// Output index carried by the coinbase input
pub const COINBASE_OUTPUT_INDEX: i64 = -1;

/// A transaction input referencing a previous output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxInput {
    /// Hash of the transaction containing the output
    pub previous_transaction_hash: Hash,
    /// Index of the output in that transaction
    pub output_index: i64,
    /// DER signature bytes; `[height, 0]` for a coinbase
    pub signature: Vec<u64>,
    /// Public key of the signer
    pub sender_public_key: PublicKey,
}

/// A transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutput {
    /// Hash of the recipient's public key
    pub recipient_public_key_hash: Hash,
    /// Amount in base units
    pub value: u64,
}

/// A complete transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction version
    pub version: u32,
    /// Creation time (milliseconds since epoch)
    pub timestamp: u64,
    /// Transaction inputs
    pub inputs: Vec<TxInput>,
    /// Transaction outputs
    pub outputs: Vec<TxOutput>,
    /// Free-form note
    pub memo: String,
}

impl TxInput {
    /// Signature as raw bytes, if every element fits in a byte
    pub fn signature_bytes(&self) -> Option<Vec<u8>> {
        self.signature
            .iter()
            .map(|b| u8::try_from(*b).ok())
            .collect()
    }

    /// Reference to the spent output
    pub fn outpoint(&self) -> (Hash, i64) {
        (self.previous_transaction_hash, self.output_index)
    }
}

impl Transaction {
    /// Create a new unsigned transaction
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>, memo: impl Into<String>, timestamp: u64) -> Self {
        Self {
            version: TRANSACTION_VERSION,
            timestamp,
            inputs,
            outputs,
            memo: memo.into(),
        }
    }

    /// Create a coinbase transaction (mining reward) for the block at `height`
    pub fn coinbase(
        miner_pubkey_hash: Hash,
        height: u64,
        value: u64,
        memo: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            version: TRANSACTION_VERSION,
            timestamp,
            inputs: vec![TxInput {
                previous_transaction_hash: Hash::zero(),
                output_index: COINBASE_OUTPUT_INDEX,
                signature: vec![height, 0],
                sender_public_key: PublicKey::zero(),
            }],
            outputs: vec![TxOutput {
                recipient_public_key_hash: miner_pubkey_hash,
                value,
            }],
            memo: memo.into(),
        }
    }

    /// Check if this has the coinbase shape
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && self.outputs.len() == 1
            && self.inputs[0].previous_transaction_hash.is_zero()
            && self.inputs[0].output_index == COINBASE_OUTPUT_INDEX
            && self.inputs[0].sender_public_key.is_zero()
    }

    /// Block height embedded in a coinbase signature
    pub fn coinbase_height(&self) -> Option<u64> {
        if !self.is_coinbase() {
            return None;
        }
        self.inputs[0].signature.first().copied()
    }

    /// Calculate transaction hash (covers signatures)
    pub fn hash(&self) -> Hash {
        let mut enc = Canonical::new().num(self.version).num(self.inputs.len());
        for input in &self.inputs {
            enc = enc
                .hash(&input.previous_transaction_hash)
                .num(input.output_index)
                .list(&input.signature)
                .bytes(&input.sender_public_key.0);
        }
        self.encode_tail(enc).digest()
    }

    /// Message signed by every input.
    ///
    /// Each input's signature is replaced by the recipient hash of the
    /// output it spends, in input order.
    pub fn signing_message(&self, spent_recipients: &[Hash]) -> Hash {
        let mut enc = Canonical::new().num(self.version).num(self.inputs.len());
        for (input, recipient) in self.inputs.iter().zip(spent_recipients) {
            enc = enc
                .hash(&input.previous_transaction_hash)
                .num(input.output_index)
                .hash(recipient);
        }
        self.encode_tail(enc).digest()
    }

    fn encode_tail(&self, mut enc: Canonical) -> Canonical {
        enc = enc.num(self.outputs.len());
        for output in &self.outputs {
            enc = enc.hash(&output.recipient_public_key_hash).num(output.value);
        }
        enc.num(self.timestamp).text(&self.memo)
    }

    /// Byte size of the JSON wire form
    pub fn size(&self) -> usize {
        serde_json::to_vec(self).map(|bytes| bytes.len()).unwrap_or(0)
    }

    /// Calculate total output value, `None` on overflow
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.value))
    }

    /// Every output reference spent by this transaction
    pub fn outpoints(&self) -> impl Iterator<Item = (Hash, i64)> + '_ {
        self.inputs.iter().map(TxInput::outpoint)
    }
}
