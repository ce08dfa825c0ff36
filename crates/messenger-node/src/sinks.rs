//! Collaborator implementations for the standalone daemon.
//!
//! The daemon has no web UI attached, so gossip events are surfaced as
//! structured log lines. A session registry stands in for the hosting
//! process's UI socket sessions.

use std::collections::HashSet;
use std::sync::Mutex;

use messenger_network::{PeerEventSink, PeerId, UiSink};

/// UI sink that logs every notification and tracks local sessions.
#[derive(Debug, Default)]
pub struct LoggingUiSink {
    sessions: Mutex<HashSet<String>>,
}

impl LoggingUiSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a username as having a live session on this node.
    pub fn register_session(&self, username: &str) {
        self.sessions.lock().unwrap().insert(username.to_owned());
    }

    pub fn unregister_session(&self, username: &str) {
        self.sessions.lock().unwrap().remove(username);
    }
}

impl PeerEventSink for LoggingUiSink {
    fn on_peer_connected(&self, peer_id: &PeerId) {
        tracing::info!(%peer_id, "peer joined the overlay");
    }

    fn on_peer_disconnected(&self, peer_id: &PeerId) {
        tracing::info!(%peer_id, "peer left the overlay");
    }
}

impl UiSink for LoggingUiSink {
    fn notify_peer_connected(&self, peer_id: &str) {
        tracing::info!(peer_id, "ui: peer connected");
    }

    fn notify_peer_disconnected(&self, peer_id: &str) {
        tracing::info!(peer_id, "ui: peer disconnected");
    }

    fn notify_chat_message(&self, sender: &str, content: &str, timestamp: &str, encrypted: bool) {
        tracing::info!(sender, content, timestamp, encrypted, "chat message");
    }

    fn notify_direct_message(
        &self,
        sender: &str,
        recipient: &str,
        content: &str,
        timestamp: &str,
        encrypted: bool,
    ) {
        tracing::info!(sender, recipient, content, timestamp, encrypted, "direct message");
    }

    fn has_session(&self, username: &str) -> bool {
        self.sessions.lock().unwrap().contains(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_registry() {
        let sink = LoggingUiSink::new();
        assert!(!sink.has_session("alice"));

        sink.register_session("alice");
        assert!(sink.has_session("alice"));

        sink.unregister_session("alice");
        assert!(!sink.has_session("alice"));
    }
}
