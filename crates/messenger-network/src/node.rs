//! The messenger transport node.
//!
//! `MessengerNode` owns the libp2p swarm and the connected-peer set. It
//! listens for inbound envelopes on the chat protocol, opens one substream
//! per outbound envelope, and reports peer lifecycle changes through the
//! [`PeerEventSink`] supplied at construction.

use futures::StreamExt;
use libp2p::identity::Keypair;
use libp2p::multiaddr::Protocol;
use libp2p::request_response::{self, Message};
use libp2p::swarm::SwarmEvent;
use libp2p::{Multiaddr, PeerId, Swarm};
use std::collections::HashSet;
use std::net::UdpSocket;
use std::str::FromStr;
use std::sync::Arc;

use messenger_core::Envelope;

use crate::error::NetworkError;
use crate::events::PeerEventSink;
use crate::protocol::{ChatBehaviour, DeliveryAck};
use crate::router::GossipRouter;
use crate::transport;

/// Swarm-level events surfaced by the chat behaviour.
pub type ChatEvent = SwarmEvent<request_response::Event<Envelope, DeliveryAck>>;

/// Transport settings for the node.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    /// TCP port the listener binds to. 0 picks an ephemeral port.
    pub listen_port: u16,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self { listen_port: 0 }
    }
}

/// Snapshot of the node's identity and addresses.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub peer_id: String,
    /// Raw listener addresses as reported by the swarm.
    pub addresses: Vec<String>,
    /// Shareable `/p2p/`-suffixed addresses, loopback filtered out.
    pub full_addresses: Vec<String>,
}

/// The messenger P2P transport node.
pub struct MessengerNode {
    keypair: Keypair,
    local_peer_id: PeerId,
    settings: NodeSettings,
    /// The libp2p swarm (set after start).
    swarm: Option<Swarm<ChatBehaviour>>,
    /// Peers currently considered reachable. Add on connect, announce, or
    /// first inbound stream; remove on send failure only.
    connected_peers: HashSet<PeerId>,
    /// Listener addresses reported by the swarm.
    listen_addrs: Vec<Multiaddr>,
    peer_events: Arc<dyn PeerEventSink>,
}

impl MessengerNode {
    /// Create a new node with the given identity keypair and settings.
    pub fn new(keypair: Keypair, settings: NodeSettings, peer_events: Arc<dyn PeerEventSink>) -> Self {
        let local_peer_id = PeerId::from(keypair.public());
        tracing::info!(%local_peer_id, "creating messenger node");

        Self {
            keypair,
            local_peer_id,
            settings,
            swarm: None,
            connected_peers: HashSet::new(),
            listen_addrs: Vec::new(),
            peer_events,
        }
    }

    /// Get the local PeerId.
    pub fn local_peer_id(&self) -> &PeerId {
        &self.local_peer_id
    }

    /// Get the set of currently connected peers.
    pub fn connected_peers(&self) -> &HashSet<PeerId> {
        &self.connected_peers
    }

    /// Check if the node's swarm has been started.
    pub fn is_running(&self) -> bool {
        self.swarm.is_some()
    }

    /// Build the swarm and bind the listener. Listening failures are the
    /// only fatal startup errors; everything later is per-connection.
    pub fn start(&mut self) -> Result<(), NetworkError> {
        if self.swarm.is_some() {
            return Err(NetworkError::AlreadyRunning);
        }

        tracing::info!(
            listen_port = self.settings.listen_port,
            peer_id = %self.local_peer_id,
            "starting messenger node"
        );

        let mut swarm = transport::build_swarm(self.keypair.clone())?;

        let listen_addr = Multiaddr::from_str(&format!("/ip4/0.0.0.0/tcp/{}", self.settings.listen_port))
            .map_err(|e| NetworkError::Listen(format!("invalid listen address: {e}")))?;
        swarm
            .listen_on(listen_addr)
            .map_err(|e| NetworkError::Listen(e.to_string()))?;

        self.swarm = Some(swarm);
        Ok(())
    }

    /// Drop the swarm and forget connected peers.
    pub fn stop(&mut self) {
        self.swarm = None;
        self.connected_peers.clear();
        tracing::info!(peer_id = %self.local_peer_id, "messenger node stopped");
    }

    /// Dial a peer by its full multiaddr (`/ip4/../tcp/../p2p/<peer>`).
    ///
    /// Registration and the handshake announce happen once the connection
    /// is established.
    pub fn connect(&mut self, peer_addr: &str) -> Result<PeerId, NetworkError> {
        let maddr = Multiaddr::from_str(peer_addr)?;
        let peer_id = maddr
            .iter()
            .find_map(|proto| match proto {
                Protocol::P2p(id) => Some(id),
                _ => None,
            })
            .ok_or_else(|| {
                NetworkError::InvalidAddress(format!("no /p2p component in {peer_addr}"))
            })?;

        let swarm = self.swarm.as_mut().ok_or(NetworkError::NotStarted)?;
        swarm
            .dial(maddr)
            .map_err(|e| NetworkError::Dial(e.to_string()))?;

        tracing::info!(%peer_id, addr = %peer_addr, "dialing peer");
        Ok(peer_id)
    }

    /// Send one envelope to one peer on a fresh substream.
    ///
    /// The call only queues the request; a failure surfaces later as an
    /// outbound-failure event, which evicts the peer.
    pub fn send_to(&mut self, peer_id: &PeerId, envelope: Envelope) -> Result<(), NetworkError> {
        let swarm = self.swarm.as_mut().ok_or(NetworkError::NotStarted)?;
        let request_id = swarm.behaviour_mut().send_request(peer_id, envelope);
        tracing::debug!(%peer_id, ?request_id, "envelope queued");
        Ok(())
    }

    /// Send an envelope to every connected peer, sequentially.
    ///
    /// Per-peer failures are isolated; they never abort the remaining
    /// sends. Returns the number of peers targeted.
    pub fn broadcast(&mut self, envelope: Envelope) -> Result<usize, NetworkError> {
        if self.swarm.is_none() {
            return Err(NetworkError::NotStarted);
        }

        let targets: Vec<PeerId> = self.connected_peers.iter().copied().collect();
        for peer_id in &targets {
            if let Err(e) = self.send_to(peer_id, envelope.clone()) {
                tracing::warn!(%peer_id, error = %e, "broadcast send failed");
            }
        }

        tracing::debug!(id = %envelope.id, peers = targets.len(), "broadcast envelope");
        Ok(targets.len())
    }

    /// Shareable addresses: listener addrs minus unspecified/loopback
    /// forms, `/p2p/<peer>`-suffixed. Falls back to a detected routable
    /// local address, then to loopback.
    pub fn advertised_addresses(&self) -> Vec<String> {
        let peer_id = self.local_peer_id;
        let mut full = Vec::new();

        for addr in &self.listen_addrs {
            let addr = addr.to_string();
            if addr.contains("/ip4/0.0.0.0/") || addr.contains("/ip4/127.0.0.1/") {
                continue;
            }
            if addr.contains("/p2p/") {
                full.push(addr);
            } else {
                full.push(format!("{addr}/p2p/{peer_id}"));
            }
        }

        if full.is_empty() {
            let port = self.bound_port();
            match detect_local_ip() {
                Some(ip) => full.push(format!("/ip4/{ip}/tcp/{port}/p2p/{peer_id}")),
                None => full.push(format!("/ip4/127.0.0.1/tcp/{port}/p2p/{peer_id}")),
            }
        }

        full
    }

    /// Snapshot of identity and addresses for cross-thread readers.
    pub fn info(&self) -> NodeInfo {
        NodeInfo {
            peer_id: self.local_peer_id.to_string(),
            addresses: self.listen_addrs.iter().map(|a| a.to_string()).collect(),
            full_addresses: self.advertised_addresses(),
        }
    }

    /// Handle one swarm event, dispatching inbound envelopes to the router.
    pub fn handle_swarm_event(&mut self, event: ChatEvent, router: &mut GossipRouter) {
        match event {
            SwarmEvent::Behaviour(chat_event) => self.handle_chat_event(chat_event, router),
            SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                if self.register_peer(peer_id) {
                    self.send_handshake(peer_id);
                }
            }
            SwarmEvent::ConnectionClosed { peer_id, .. } => {
                // Idle closes are expected; eviction happens on send failure.
                tracing::debug!(%peer_id, "connection closed");
            }
            SwarmEvent::NewListenAddr { address, .. } => {
                tracing::info!(%address, "listening on new address");
                self.listen_addrs.push(address);
            }
            SwarmEvent::IncomingConnection { .. } => {
                tracing::debug!("incoming connection");
            }
            SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                tracing::warn!(?peer_id, error = %error, "outgoing connection error");
            }
            SwarmEvent::IncomingConnectionError { error, .. } => {
                tracing::warn!(error = %error, "incoming connection error");
            }
            SwarmEvent::ListenerError { error, .. } => {
                tracing::error!(error = %error, "listener error");
            }
            _ => {}
        }
    }

    /// Handle a request-response event from the chat behaviour.
    fn handle_chat_event(
        &mut self,
        event: request_response::Event<Envelope, DeliveryAck>,
        router: &mut GossipRouter,
    ) {
        match event {
            request_response::Event::Message { peer, message, .. } => match message {
                Message::Request { request, channel, .. } => {
                    if let Some(swarm) = self.swarm.as_mut() {
                        let _ = swarm.behaviour_mut().send_response(channel, DeliveryAck);
                    }
                    // A first inbound stream from an unseen peer counts as a
                    // connection, covering nodes that receive before dialing.
                    self.register_peer(peer);
                    router.on_inbound(request, &peer.to_string());
                }
                Message::Response { request_id, .. } => {
                    tracing::debug!(%peer, ?request_id, "delivery acknowledged");
                }
            },
            request_response::Event::OutboundFailure { peer, error, .. } => {
                tracing::warn!(%peer, error = %error, "send failed, evicting peer");
                self.evict_peer(&peer);
            }
            request_response::Event::InboundFailure { peer, error, .. } => {
                // Undecodable or aborted inbound stream; no penalty to the
                // peer's connection state.
                tracing::warn!(%peer, error = %error, "inbound stream failed");
            }
            request_response::Event::ResponseSent { .. } => {}
        }
    }

    /// Add a peer to the connected set. Fires "peer connected" only on the
    /// first registration; returns whether the peer was new.
    pub fn register_peer(&mut self, peer_id: PeerId) -> bool {
        let added = self.connected_peers.insert(peer_id);
        if added {
            tracing::info!(
                %peer_id,
                total_connected = self.connected_peers.len(),
                "peer connected"
            );
            self.peer_events.on_peer_connected(&peer_id);
        }
        added
    }

    /// Remove a peer after a send failure and fire "peer disconnected".
    pub fn evict_peer(&mut self, peer_id: &PeerId) {
        if self.connected_peers.remove(peer_id) {
            tracing::info!(
                %peer_id,
                total_connected = self.connected_peers.len(),
                "peer disconnected"
            );
            self.peer_events.on_peer_disconnected(peer_id);
        }
    }

    /// Await the next swarm event. Pends forever when not started, so it
    /// is safe inside a `select!` loop.
    pub async fn next_event(&mut self) -> ChatEvent {
        match self.swarm.as_mut() {
            Some(swarm) => swarm.select_next_some().await,
            None => futures::future::pending().await,
        }
    }

    /// Announce our own addresses to a freshly connected peer.
    fn send_handshake(&mut self, peer_id: PeerId) {
        let announce = Envelope::peer_announce(
            &self.local_peer_id.to_string(),
            self.advertised_addresses(),
        );
        if let Err(e) = self.send_to(&peer_id, announce) {
            tracing::warn!(%peer_id, error = %e, "handshake send failed");
        } else {
            tracing::info!(%peer_id, "handshake sent");
        }
    }

    /// The actually bound TCP port, falling back to the configured one
    /// before the first listener address arrives.
    fn bound_port(&self) -> u16 {
        self.listen_addrs
            .iter()
            .flat_map(|addr| addr.iter())
            .find_map(|proto| match proto {
                Protocol::Tcp(port) => Some(port),
                _ => None,
            })
            .unwrap_or(self.settings.listen_port)
    }
}

/// Detect the host's routable local address via a throwaway UDP probe.
/// Connecting a datagram socket sends no packets.
fn detect_local_ip() -> Option<std::net::IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    if ip.is_loopback() {
        None
    } else {
        Some(ip)
    }
}
