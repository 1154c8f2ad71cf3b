//! Minichain node
//!
//! Loads the node configuration, starts the broadcast dispatcher and, when
//! enabled, mines on top of the local chain until Ctrl+C.

use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use minichain::config::NodeConfig;
use minichain::mining::Miner;
use minichain::node::{Node, NodeError};
use minichain::p2p::{run_dispatcher, Announcement, Broadcaster, PeerRegistry, PeerTransport, TransportError};
use minichain::storage::Ledger;
use minichain::wallet::KeyPair;

#[derive(Parser)]
#[command(name = "minichain-node")]
#[command(about = "Minimal proof-of-work ledger node", version, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Mine blocks regardless of the config file
    #[arg(short, long)]
    mine: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

/// Transport that records announcements in the log instead of sending them
struct LogTransport;

#[async_trait]
impl PeerTransport for LogTransport {
    async fn deliver(&self, peer: &str, announcement: &Announcement) -> Result<(), TransportError> {
        let body = announcement.to_json().map_err(|e| TransportError {
            peer: peer.to_string(),
            reason: e.to_string(),
        })?;
        info!(peer, kind = announcement.kind(), bytes = body.len(), "announcement ready");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_file(path)?,
        None => NodeConfig::default(),
    };
    config.mine |= cli.mine;

    let default_filter = if cli.debug {
        "minichain=debug".to_string()
    } else {
        config.log_filter.clone()
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let ledger = Ledger::with_genesis(&config.genesis);
    info!(
        hash = %ledger.genesis().hash(),
        bits = ledger.genesis().header.bits,
        "genesis block loaded"
    );

    let recipient = match config.miner_public_key_hash {
        Some(hash) => hash,
        None => {
            let keypair = KeyPair::generate();
            warn!(
                public_key_hash = %keypair.pubkey_hash(),
                "no miner key configured, generated a fresh one"
            );
            // the secret stays out of the log pipeline
            eprintln!(
                "miner private key (store it to keep the rewards): {}",
                hex::encode(keypair.private_key_bytes())
            );
            keypair.pubkey_hash()
        }
    };

    let (broadcaster, queue) = Broadcaster::channel();
    let node = Node::new(
        ledger,
        Miner::new(recipient),
        broadcaster,
        PeerRegistry::new(config.self_url.as_deref()),
    );
    for url in &config.peers {
        if let Err(err) = node.register_peer_url(url) {
            warn!(peer = url, error = %err, "skipping configured peer");
        }
    }

    tokio::spawn(run_dispatcher(queue, LogTransport, node.peer_registry()));

    if !config.mine {
        info!("node started, mining disabled. Press Ctrl+C to stop.");
        tokio::signal::ctrl_c().await?;
        info!("shutdown signal received");
        return Ok(());
    }

    info!(%recipient, "node started, mining enabled. Press Ctrl+C to stop.");
    let mining = node.clone();
    tokio::select! {
        _ = async move {
            loop {
                match mining.mine_next_block(recipient).await {
                    Ok(admission) => {
                        info!(
                            ?admission,
                            balance = mining.balance(&recipient),
                            pool = mining.pool().len(),
                            "mining round finished"
                        );
                    }
                    Err(NodeError::MiningInterrupted) => {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                    Err(err) => {
                        error!(error = %err, "mined block rejected");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        } => {},
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, stopping miner");
            node.miner().stop();
        }
    }

    Ok(())
}
