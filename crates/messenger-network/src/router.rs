//! The gossip router: envelope dispatch, dedup, and the peer directory.
//!
//! Inbound envelopes are deduplicated by id before any application effect,
//! then dispatched by type. Outbound builders stamp a deterministic id,
//! mark it seen (so a node never re-processes its own flood), and hand the
//! envelope to the transport node for fan-out.
//!
//! Propagation is single-hop: a received message is delivered locally and
//! never re-broadcast to other peers.

use base64::Engine as _;
use std::collections::HashMap;
use std::sync::Arc;

use messenger_core::{Envelope, MessageKind};

use crate::directory::{KnownPeerRecord, PeerDirectory};
use crate::error::NetworkError;
use crate::events::UiSink;
use crate::node::MessengerNode;
use crate::seen::SeenMessageCache;
use crate::store::UserStore;

/// Expected decoded length of an announced public key.
const PUBLIC_KEY_LEN: usize = 32;

/// Application-level router over the transport node.
pub struct GossipRouter {
    seen: SeenMessageCache,
    directory: PeerDirectory,
    ui: Arc<dyn UiSink>,
    store: Arc<dyn UserStore>,
}

impl GossipRouter {
    pub fn new(ui: Arc<dyn UiSink>, store: Arc<dyn UserStore>, seen_capacity: usize) -> Self {
        Self {
            seen: SeenMessageCache::new(seen_capacity),
            directory: PeerDirectory::new(),
            ui,
            store,
        }
    }

    /// Process one inbound envelope from `peer_id`.
    ///
    /// Duplicates are dropped before any effect; every processed envelope
    /// is marked seen regardless of downstream (store) failures.
    pub fn on_inbound(&mut self, envelope: Envelope, peer_id: &str) {
        if !self.seen.insert(&envelope.id) {
            tracing::debug!(id = %envelope.id, "duplicate message ignored");
            return;
        }

        match envelope.kind {
            MessageKind::Chat => self.handle_chat(envelope, peer_id),
            MessageKind::DirectMessage => self.handle_direct_message(envelope, peer_id),
            MessageKind::PeerDiscovery => {
                tracing::info!(%peer_id, "peer discovery request received");
            }
            MessageKind::PeerAnnounce => self.handle_peer_announce(envelope, peer_id),
            MessageKind::KeyAnnounce => self.handle_key_announce(envelope, peer_id),
            MessageKind::Unknown => {
                tracing::warn!(id = %envelope.id, %peer_id, "unknown message type ignored");
            }
        }
    }

    fn handle_chat(&mut self, envelope: Envelope, peer_id: &str) {
        let Some(content) = envelope.content else {
            tracing::warn!(%peer_id, "chat envelope without content");
            return;
        };
        tracing::info!(%peer_id, sender = %envelope.sender, "chat message received");
        self.ui.notify_chat_message(
            &envelope.sender,
            &content,
            &envelope.timestamp,
            envelope.encrypted,
        );
    }

    fn handle_direct_message(&mut self, envelope: Envelope, peer_id: &str) {
        let Some(content) = envelope.content else {
            tracing::warn!(%peer_id, "direct message without content");
            return;
        };
        let Some(recipient) = envelope.recipient else {
            tracing::warn!(%peer_id, "direct message without recipient");
            return;
        };

        // Delivery is single-hop: if the recipient has no session here the
        // message is dropped, never relayed onward.
        if self.ui.has_session(&recipient) {
            tracing::info!(%peer_id, %recipient, "direct message delivered");
            self.ui.notify_direct_message(
                &envelope.sender,
                &recipient,
                &content,
                &envelope.timestamp,
                envelope.encrypted,
            );
        } else {
            tracing::debug!(%recipient, "recipient has no local session, dropping");
        }
    }

    fn handle_peer_announce(&mut self, envelope: Envelope, peer_id: &str) {
        let addresses = envelope.addresses.unwrap_or_default();
        let known_before = self.directory.get(peer_id).is_some();
        self.directory.upsert(peer_id, addresses);

        if known_before {
            tracing::debug!(%peer_id, "peer announce refreshed directory entry");
        } else {
            tracing::info!(%peer_id, "new peer announced");
        }
    }

    fn handle_key_announce(&mut self, envelope: Envelope, peer_id: &str) {
        let Some(username) = envelope.username else {
            tracing::warn!(%peer_id, "key announce without username");
            return;
        };
        let Some(public_key) = envelope.public_key else {
            tracing::warn!(%peer_id, %username, "key announce without public key");
            return;
        };
        if !is_valid_public_key(&public_key) {
            tracing::warn!(%peer_id, %username, "key announce with malformed key");
            return;
        }

        // Store failures are logged only; the envelope stays seen.
        match self.store.find_by_username(&username) {
            Ok(Some(record)) => {
                if record.public_key.as_deref() == Some(public_key.as_str()) {
                    tracing::debug!(%username, "announced key unchanged, no write");
                } else if let Err(e) = self.store.update_public_key(&username, &public_key) {
                    tracing::warn!(%username, error = %e, "failed to update public key");
                } else {
                    tracing::info!(%username, "public key updated from announce");
                }
            }
            Ok(None) => {
                if let Err(e) = self.store.create_remote_identity(&username, &public_key) {
                    tracing::warn!(%username, error = %e, "failed to record remote identity");
                } else {
                    tracing::info!(%username, %peer_id, "remote identity recorded");
                }
            }
            Err(e) => {
                tracing::warn!(%username, error = %e, "user lookup failed");
            }
        }
    }

    /// Build a chat envelope and mark its id seen.
    pub fn build_chat(
        &mut self,
        sender: &str,
        content: &str,
        timestamp: Option<String>,
        encrypted: bool,
    ) -> Envelope {
        let envelope = Envelope::chat(sender, content, timestamp, encrypted);
        self.seen.insert(&envelope.id);
        envelope
    }

    /// Build a direct-message envelope and mark its id seen.
    pub fn build_direct(
        &mut self,
        sender: &str,
        recipient: &str,
        content: &str,
        timestamp: Option<String>,
        encrypted: bool,
    ) -> Envelope {
        let envelope = Envelope::direct_message(sender, recipient, content, timestamp, encrypted);
        self.seen.insert(&envelope.id);
        envelope
    }

    /// Build a key-announce envelope and mark its id seen.
    pub fn build_key_announce(
        &mut self,
        sender_peer_id: &str,
        username: &str,
        public_key: &str,
    ) -> Envelope {
        let envelope = Envelope::key_announce(sender_peer_id, username, public_key);
        self.seen.insert(&envelope.id);
        envelope
    }

    /// Broadcast a chat message to every connected peer.
    pub fn send_chat(
        &mut self,
        node: &mut MessengerNode,
        sender: &str,
        content: &str,
        timestamp: Option<String>,
        encrypted: bool,
    ) -> Result<usize, NetworkError> {
        let envelope = self.build_chat(sender, content, timestamp, encrypted);
        tracing::info!(id = %envelope.id, %sender, "broadcasting chat message");
        node.broadcast(envelope)
    }

    /// Broadcast a direct message; only the node hosting the recipient's
    /// session will surface it.
    pub fn send_direct(
        &mut self,
        node: &mut MessengerNode,
        sender: &str,
        recipient: &str,
        content: &str,
        timestamp: Option<String>,
        encrypted: bool,
    ) -> Result<usize, NetworkError> {
        let envelope = self.build_direct(sender, recipient, content, timestamp, encrypted);
        tracing::info!(id = %envelope.id, %sender, %recipient, "broadcasting direct message");
        node.broadcast(envelope)
    }

    /// Announce a user's public key to every connected peer.
    pub fn announce_key(
        &mut self,
        node: &mut MessengerNode,
        username: &str,
        public_key: &str,
    ) -> Result<usize, NetworkError> {
        let sender = node.local_peer_id().to_string();
        let envelope = self.build_key_announce(&sender, username, public_key);
        tracing::info!(id = %envelope.id, %username, "broadcasting key announce");
        node.broadcast(envelope)
    }

    /// Point-in-time copy of the known-peer directory.
    pub fn known_peers(&self) -> HashMap<String, KnownPeerRecord> {
        self.directory.snapshot()
    }

    /// Whether an id has already been processed.
    pub fn has_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }
}

/// An announced key must be base64 for exactly 32 bytes.
fn is_valid_public_key(key: &str) -> bool {
    base64::engine::general_purpose::STANDARD
        .decode(key)
        .map(|bytes| bytes.len() == PUBLIC_KEY_LEN)
        .unwrap_or(false)
}
