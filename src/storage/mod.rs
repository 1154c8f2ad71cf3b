//! Storage module - Derived UTXO view, block buffers and the ledger

mod buffer;
mod ledger;
mod utxo;

pub use buffer::*;
pub use ledger::*;
pub use utxo::*;
