//! libp2p transport stack construction for the messenger network.
//!
//! Builds a swarm using TCP + Noise (encryption) + Yamux (multiplexing)
//! with the JSON chat protocol as the only behaviour. Each envelope gets
//! its own substream, bounded by a fixed per-request deadline.

use libp2p::identity::Keypair;
use libp2p::request_response::{self, ProtocolSupport};
use std::time::Duration;

use crate::error::NetworkError;
use crate::protocol::{ChatBehaviour, CHAT_PROTOCOL};

/// Deadline for a single envelope send (open stream, write, await ack).
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How long idle connections are kept before closing. Streams are per
/// message, so the connection itself should outlive quiet periods.
const IDLE_CONNECTION_TIMEOUT: Duration = Duration::from_secs(300);

/// Build a libp2p Swarm with the chat behaviour using TCP + Noise + Yamux.
pub fn build_swarm(keypair: Keypair) -> Result<libp2p::Swarm<ChatBehaviour>, NetworkError> {
    let swarm = libp2p::SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_tcp(
            libp2p::tcp::Config::default(),
            libp2p::noise::Config::new,
            libp2p::yamux::Config::default,
        )
        .map_err(|e| NetworkError::Transport(e.to_string()))?
        .with_behaviour(|_key| {
            ChatBehaviour::new(
                [(CHAT_PROTOCOL, ProtocolSupport::Full)],
                request_response::Config::default().with_request_timeout(REQUEST_TIMEOUT),
            )
        })
        .map_err(|e| NetworkError::Transport(e.to_string()))?
        .with_swarm_config(|cfg: libp2p::swarm::Config| {
            cfg.with_idle_connection_timeout(IDLE_CONNECTION_TIMEOUT)
        })
        .build();

    Ok(swarm)
}
