//! Fire-and-forget broadcast
//!
//! The consensus path only enqueues announcements. A dispatcher task drains
//! the queue and hands each announcement to every registered peer through a
//! `PeerTransport`. Failed deliveries are logged and not retried.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::consensus::Block;
use crate::validation::Transaction;

use super::{Announcement, PeerRegistry};

/// Delivery failure reported by a transport
#[derive(Debug, Error)]
#[error("delivery to {peer} failed: {reason}")]
pub struct TransportError {
    pub peer: String,
    pub reason: String,
}

/// Moves announcements to a peer
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn deliver(&self, peer: &str, announcement: &Announcement) -> Result<(), TransportError>;
}

/// Sending half of the broadcast queue
#[derive(Debug, Clone)]
pub struct Broadcaster {
    sender: mpsc::UnboundedSender<Announcement>,
}

/// Receiving half of the broadcast queue
#[derive(Debug)]
pub struct BroadcastQueue {
    receiver: mpsc::UnboundedReceiver<Announcement>,
}

impl Broadcaster {
    /// Create a broadcaster and the queue it feeds
    pub fn channel() -> (Self, BroadcastQueue) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, BroadcastQueue { receiver })
    }

    /// A broadcaster whose announcements go nowhere
    pub fn disabled() -> Self {
        Self::channel().0
    }

    pub fn announce_block(&self, block: &Block) {
        self.enqueue(Announcement::Block(block.clone()));
    }

    pub fn announce_transaction(&self, tx: &Transaction) {
        self.enqueue(Announcement::Transaction(tx.clone()));
    }

    fn enqueue(&self, announcement: Announcement) {
        let kind = announcement.kind();
        let hash = announcement.hash();
        if self.sender.send(announcement).is_err() {
            debug!(kind, %hash, "no dispatcher running, announcement dropped");
        }
    }
}

impl BroadcastQueue {
    /// Next queued announcement; `None` once every broadcaster is gone
    pub async fn next(&mut self) -> Option<Announcement> {
        self.receiver.recv().await
    }
}

/// Deliver queued announcements to the registered peers until the queue
/// closes
pub async fn run_dispatcher<T: PeerTransport>(
    mut queue: BroadcastQueue,
    transport: T,
    peers: Arc<Mutex<PeerRegistry>>,
) {
    while let Some(announcement) = queue.next().await {
        let targets = peers.lock().unwrap_or_else(PoisonError::into_inner).urls();
        let hash = announcement.hash();

        for peer in targets {
            match transport.deliver(&peer, &announcement).await {
                Ok(()) => debug!(kind = announcement.kind(), %hash, peer, "announcement delivered"),
                Err(err) => warn!(kind = announcement.kind(), %hash, error = %err, "broadcast failed"),
            }
        }
    }
    debug!("broadcast queue closed");
}
