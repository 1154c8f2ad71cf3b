//! Mining module - Nonce search and the cancellable miner

mod miner;

pub use miner::*;
