//! Messenger daemon — runs the P2P engine as a standalone process.
//!
//! The hosting web application would normally own the engine; this binary
//! wires the same composition root with logging collaborators, useful for
//! running overlay nodes directly.

mod sinks;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use messenger_core::MessengerConfig;
use messenger_engine::{Collaborators, Engine};
use messenger_network::MemoryUserStore;

use crate::sinks::LoggingUiSink;

/// P2P messenger overlay node.
#[derive(Parser, Debug)]
#[command(name = "messenger-node", version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the P2P listen port.
    #[arg(long)]
    port: Option<u16>,

    /// Bootstrap peer multiaddrs, repeatable.
    #[arg(long = "bootstrap")]
    bootstrap_peers: Vec<String>,

    /// Override the log level.
    #[arg(long)]
    log_level: Option<String>,

    /// Usernames with a local session on this node, repeatable.
    #[arg(long = "session")]
    sessions: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => MessengerConfig::load(path)?,
        None => MessengerConfig::default(),
    };
    if let Some(port) = cli.port {
        config.listen_port = port;
    }
    if !cli.bootstrap_peers.is_empty() {
        config.bootstrap_peers = cli.bootstrap_peers.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let ui = Arc::new(LoggingUiSink::new());
    for username in &cli.sessions {
        ui.register_session(username);
    }

    let store = Arc::new(MemoryUserStore::new());
    let collaborators = Collaborators {
        peer_events: ui.clone(),
        ui,
        store,
    };

    let engine = Engine::new(config, collaborators);
    engine.start();

    if let Some(info) = engine.node_info() {
        tracing::info!(peer_id = %info.peer_id, "node identity");
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    engine.stop();

    Ok(())
}
