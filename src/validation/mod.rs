//! Validation module - Transaction model and transaction rules

mod rules;
mod transaction;

pub use rules::*;
pub use transaction::*;
