//! The wire envelope exchanged between messenger peers.
//!
//! Exactly one envelope travels per stream, serialized as a JSON object.
//! The `id` field is derived deterministically from the sender, the content
//! (or key prefix) and the timestamp, so the same logical message always
//! carries the same id. Receivers use it as the dedup key.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Hex characters kept from the full content hash when forming a message id.
const MESSAGE_ID_LEN: usize = 16;

/// Message types understood by the gossip layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Room-wide chat message, fanned out to every connected peer.
    Chat,
    /// One-to-one message addressed to a username on some node.
    DirectMessage,
    /// Request for the sender's view of the network. Informational.
    PeerDiscovery,
    /// Handshake carrying the sender's reachable addresses.
    PeerAnnounce,
    /// Distribution of a user's public encryption key.
    KeyAnnounce,
    /// Any type this version does not understand. Dispatched to a logged
    /// no-op rather than failing the decode.
    #[serde(other)]
    Unknown,
}

/// A single gossip message as transmitted on the wire.
///
/// Optional fields are omitted from the serialized form when absent, so
/// a chat envelope stays as small as the original JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Deterministic dedup key, see [`message_id`].
    pub id: String,
    /// Message type, `type` on the wire.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Username (chat, direct message, key announce) or peer id (announce).
    pub sender: String,
    /// Message body for chat and direct messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Target username for direct messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    /// Advertised multiaddrs, present on peer announces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<String>>,
    /// Username owning the announced key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Base64-encoded 32-byte public key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// RFC 3339 creation time, stamped by the sender.
    pub timestamp: String,
    /// Whether `content` is end-to-end encrypted.
    #[serde(default)]
    pub encrypted: bool,
}

impl Envelope {
    /// Build a room-wide chat envelope.
    pub fn chat(sender: &str, content: &str, timestamp: Option<String>, encrypted: bool) -> Self {
        let timestamp = timestamp.unwrap_or_else(now);
        Self {
            id: message_id(sender, content, &timestamp),
            kind: MessageKind::Chat,
            sender: sender.to_owned(),
            content: Some(content.to_owned()),
            recipient: None,
            addresses: None,
            username: None,
            public_key: None,
            timestamp,
            encrypted,
        }
    }

    /// Build a direct message addressed to `recipient`.
    pub fn direct_message(
        sender: &str,
        recipient: &str,
        content: &str,
        timestamp: Option<String>,
        encrypted: bool,
    ) -> Self {
        let timestamp = timestamp.unwrap_or_else(now);
        Self {
            id: message_id(sender, content, &timestamp),
            kind: MessageKind::DirectMessage,
            sender: sender.to_owned(),
            content: Some(content.to_owned()),
            recipient: Some(recipient.to_owned()),
            addresses: None,
            username: None,
            public_key: None,
            timestamp,
            encrypted,
        }
    }

    /// Build the handshake announce carrying this node's reachable addresses.
    pub fn peer_announce(sender_peer_id: &str, addresses: Vec<String>) -> Self {
        let timestamp = now();
        let joined = addresses.join(",");
        Self {
            id: message_id(sender_peer_id, &joined, &timestamp),
            kind: MessageKind::PeerAnnounce,
            sender: sender_peer_id.to_owned(),
            content: None,
            recipient: None,
            addresses: Some(addresses),
            username: None,
            public_key: None,
            timestamp,
            encrypted: false,
        }
    }

    /// Build a key announce distributing `username`'s public key.
    ///
    /// The id hashes a prefix of the key rather than the whole value, which
    /// keeps the derivation uniform with content-bearing messages.
    pub fn key_announce(sender_peer_id: &str, username: &str, public_key: &str) -> Self {
        let timestamp = now();
        let prefix: String = public_key.chars().take(MESSAGE_ID_LEN).collect();
        Self {
            id: message_id(sender_peer_id, &prefix, &timestamp),
            kind: MessageKind::KeyAnnounce,
            sender: sender_peer_id.to_owned(),
            content: None,
            recipient: None,
            addresses: None,
            username: Some(username.to_owned()),
            public_key: Some(public_key.to_owned()),
            timestamp,
            encrypted: false,
        }
    }
}

/// Derive the deterministic message id for a (sender, content, timestamp)
/// triple: blake3 of `sender:content:timestamp`, hex, truncated to 16 chars.
pub fn message_id(sender: &str, content: &str, timestamp: &str) -> String {
    let digest = blake3::hash(format!("{sender}:{content}:{timestamp}").as_bytes());
    let mut id = digest.to_hex().to_string();
    id.truncate(MESSAGE_ID_LEN);
    id
}

/// Current time as an RFC 3339 string.
pub fn now() -> String {
    Utc::now().to_rfc3339()
}
