//! Collaborator seams for peer lifecycle and UI notifications.
//!
//! Both sinks are supplied at construction time and invoked synchronously
//! from the engine task, so implementations must not block.

use libp2p::PeerId;

/// Receives peer lifecycle notifications from the transport node.
pub trait PeerEventSink: Send + Sync {
    /// A peer entered the connected set.
    fn on_peer_connected(&self, peer_id: &PeerId);
    /// A peer was evicted from the connected set after a send failure.
    fn on_peer_disconnected(&self, peer_id: &PeerId);
}

/// Pushes gossip events to the hosting process's UI/session layer.
pub trait UiSink: Send + Sync {
    fn notify_peer_connected(&self, peer_id: &str);
    fn notify_peer_disconnected(&self, peer_id: &str);
    /// Room-wide chat message from a remote peer.
    fn notify_chat_message(&self, sender: &str, content: &str, timestamp: &str, encrypted: bool);
    /// Direct message for a locally-registered session.
    fn notify_direct_message(
        &self,
        sender: &str,
        recipient: &str,
        content: &str,
        timestamp: &str,
        encrypted: bool,
    );
    /// Whether `username` currently has a UI session on this node. Direct
    /// messages for absent users are dropped, never relayed.
    fn has_session(&self, username: &str) -> bool;
}
