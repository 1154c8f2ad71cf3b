//! Node module - Genesis and the node facade

mod genesis;
mod service;

pub use genesis::*;
pub use service::*;
