//! P2P module - Peer registry, announcements and the broadcast queue

mod broadcast;
mod peer;
mod protocol;

pub use broadcast::*;
pub use peer::*;
pub use protocol::*;
