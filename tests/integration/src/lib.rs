//! Shared harness for end-to-end loopback tests.
//!
//! Each [`TestNode`] runs a full engine (transport node, gossip router,
//! worker thread) listening on an ephemeral loopback port, with recording
//! collaborators so tests can observe what reached the application layer.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use messenger_core::MessengerConfig;
use messenger_engine::{Collaborators, Engine};
use messenger_network::{MemoryUserStore, NodeInfo, PeerEventSink, PeerId, UiSink};

/// A chat notification as delivered to the UI sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRecord {
    pub sender: String,
    pub content: String,
    pub encrypted: bool,
}

/// A direct-message notification as delivered to the UI sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectRecord {
    pub sender: String,
    pub recipient: String,
    pub content: String,
    pub encrypted: bool,
}

/// Records every collaborator callback for later assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    sessions: Mutex<HashSet<String>>,
    peer_connected: Mutex<Vec<String>>,
    peer_disconnected: Mutex<Vec<String>>,
    chats: Mutex<Vec<ChatRecord>>,
    directs: Mutex<Vec<DirectRecord>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_session(&self, username: &str) {
        self.sessions.lock().unwrap().insert(username.to_owned());
    }

    /// Peer ids that entered the connected set, in arrival order.
    pub fn peers_connected(&self) -> Vec<String> {
        self.peer_connected.lock().unwrap().clone()
    }

    pub fn peers_disconnected(&self) -> Vec<String> {
        self.peer_disconnected.lock().unwrap().clone()
    }

    pub fn chats(&self) -> Vec<ChatRecord> {
        self.chats.lock().unwrap().clone()
    }

    pub fn directs(&self) -> Vec<DirectRecord> {
        self.directs.lock().unwrap().clone()
    }
}

impl PeerEventSink for RecordingSink {
    fn on_peer_connected(&self, peer_id: &PeerId) {
        self.peer_connected.lock().unwrap().push(peer_id.to_string());
    }

    fn on_peer_disconnected(&self, peer_id: &PeerId) {
        self.peer_disconnected
            .lock()
            .unwrap()
            .push(peer_id.to_string());
    }
}

impl UiSink for RecordingSink {
    fn notify_peer_connected(&self, _peer_id: &str) {}
    fn notify_peer_disconnected(&self, _peer_id: &str) {}

    fn notify_chat_message(&self, sender: &str, content: &str, _ts: &str, encrypted: bool) {
        self.chats.lock().unwrap().push(ChatRecord {
            sender: sender.to_owned(),
            content: content.to_owned(),
            encrypted,
        });
    }

    fn notify_direct_message(
        &self,
        sender: &str,
        recipient: &str,
        content: &str,
        _ts: &str,
        encrypted: bool,
    ) {
        self.directs.lock().unwrap().push(DirectRecord {
            sender: sender.to_owned(),
            recipient: recipient.to_owned(),
            content: content.to_owned(),
            encrypted,
        });
    }

    fn has_session(&self, username: &str) -> bool {
        self.sessions.lock().unwrap().contains(username)
    }
}

/// A running engine on an ephemeral loopback port.
pub struct TestNode {
    pub engine: Engine,
    pub sink: Arc<RecordingSink>,
    pub store: Arc<MemoryUserStore>,
}

impl TestNode {
    /// Start a node with the given usernames registered as local sessions.
    pub fn start(sessions: &[&str]) -> Self {
        let sink = Arc::new(RecordingSink::new());
        for username in sessions {
            sink.register_session(username);
        }
        let store = Arc::new(MemoryUserStore::new());

        let collaborators = Collaborators {
            peer_events: sink.clone(),
            ui: sink.clone(),
            store: store.clone(),
        };
        let config = MessengerConfig {
            listen_port: 0,
            ..Default::default()
        };

        let engine = Engine::new(config, collaborators);
        engine.start();
        Self {
            engine,
            sink,
            store,
        }
    }

    /// Identity/address snapshot, waiting for the worker to publish it.
    pub fn info(&self) -> NodeInfo {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(info) = self.engine.node_info() {
                return info;
            }
            assert!(Instant::now() < deadline, "node never published its info");
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    pub fn peer_id(&self) -> String {
        self.info().peer_id
    }

    /// Dialable `/ip4/127.0.0.1/tcp/<port>/p2p/<peer>` address, waiting for
    /// the loopback listener to come up.
    pub fn loopback_addr(&self) -> String {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let info = self.info();
            if let Some(addr) = info
                .addresses
                .iter()
                .find(|a| a.starts_with("/ip4/127.0.0.1/"))
            {
                return format!("{addr}/p2p/{}", info.peer_id);
            }
            assert!(
                Instant::now() < deadline,
                "loopback listener never reported"
            );
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}

impl Drop for TestNode {
    fn drop(&mut self) {
        self.engine.stop();
    }
}

/// Poll `pred` until it holds or a 10s deadline passes.
pub fn assert_eventually(mut pred: impl FnMut() -> bool, what: &str) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !pred() {
        assert!(Instant::now() < deadline, "timed out waiting: {what}");
        std::thread::sleep(Duration::from_millis(25));
    }
}

/// Connect `from` to `to` and wait until both sides saw the peer.
pub fn connect(from: &TestNode, to: &TestNode) {
    let to_id = to.peer_id();
    let from_id = from.peer_id();
    from.engine.connect_to_peer(&to.loopback_addr());
    assert_eventually(
        || {
            from.sink.peers_connected().contains(&to_id)
                && to.sink.peers_connected().contains(&from_id)
        },
        "peers never connected",
    );
    // "Peer connected" fires on connection establishment, before the
    // handshake announce round-trips. Wait it out so a node dropped right
    // after connect() doesn't abort an in-flight handshake request, which
    // would surface as a send failure rather than an idle close.
    std::thread::sleep(Duration::from_millis(500));
}
