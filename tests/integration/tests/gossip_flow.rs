//! Two- and three-node loopback scenarios exercising the full stack:
//! engine worker thread, transport node, and gossip router together.

use std::time::Duration;

use base64::Engine as _;
use messenger_integration_tests::{assert_eventually, connect, TestNode};

/// Settle time after the positive signal, to catch late duplicates.
const SETTLE: Duration = Duration::from_millis(500);

#[test]
fn test_chat_broadcast_reaches_connected_peer() {
    let a = TestNode::start(&[]);
    let b = TestNode::start(&[]);
    connect(&a, &b);

    a.engine.send_message("alice", "hello room", None, false);

    assert_eventually(
        || {
            b.sink
                .chats()
                .iter()
                .any(|c| c.sender == "alice" && c.content == "hello room" && !c.encrypted)
        },
        "chat never reached the remote node",
    );
    // The sender's own UI is not notified through the gossip path.
    assert!(a.sink.chats().is_empty());
}

#[test]
fn test_duplicate_sends_deliver_exactly_once() {
    let a = TestNode::start(&[]);
    let b = TestNode::start(&[]);
    connect(&a, &b);

    // A fixed timestamp makes both sends carry the same message id.
    let ts = "2024-06-01T12:00:00+00:00".to_owned();
    a.engine.send_message("alice", "once", Some(ts.clone()), false);
    a.engine.send_message("alice", "once", Some(ts), false);

    let delivered = || {
        b.sink
            .chats()
            .iter()
            .filter(|c| c.content == "once")
            .count()
    };
    assert_eventually(|| delivered() >= 1, "chat never delivered");
    std::thread::sleep(SETTLE);
    assert_eq!(delivered(), 1);
}

#[test]
fn test_direct_message_delivered_only_where_session_lives() {
    let a = TestNode::start(&[]);
    let b = TestNode::start(&["bob"]);
    let c = TestNode::start(&[]);
    connect(&a, &b);
    connect(&a, &c);

    a.engine
        .send_direct_message("alice", "bob", "psst", None, true);

    assert_eventually(
        || {
            b.sink
                .directs()
                .iter()
                .any(|d| d.sender == "alice" && d.recipient == "bob" && d.encrypted)
        },
        "direct message never reached bob's node",
    );
    std::thread::sleep(SETTLE);
    assert!(c.sink.directs().is_empty());
}

#[test]
fn test_peer_connected_fires_once_per_peer() {
    let a = TestNode::start(&[]);
    let b = TestNode::start(&[]);
    connect(&a, &b);

    // The handshake announce and the connection event must not double up.
    std::thread::sleep(SETTLE);
    let b_id = b.peer_id();
    let a_id = a.peer_id();
    assert_eq!(
        a.sink
            .peers_connected()
            .iter()
            .filter(|id| **id == b_id)
            .count(),
        1
    );
    assert_eq!(
        b.sink
            .peers_connected()
            .iter()
            .filter(|id| **id == a_id)
            .count(),
        1
    );
}

#[test]
fn test_key_announce_creates_remote_identity() {
    use messenger_network::UserStore;

    let a = TestNode::start(&[]);
    let b = TestNode::start(&[]);
    connect(&a, &b);

    let key = base64::engine::general_purpose::STANDARD.encode([7u8; 32]);
    a.engine.broadcast_public_key("alice", &key);

    assert_eventually(
        || {
            b.store
                .find_by_username("alice")
                .expect("store read")
                .is_some()
        },
        "remote identity never recorded",
    );
    let record = b
        .store
        .find_by_username("alice")
        .expect("store read")
        .expect("record");
    assert!(record.remote);
    assert_eq!(record.public_key.as_deref(), Some(key.as_str()));
}

#[test]
fn test_malformed_key_announce_is_dropped() {
    use messenger_network::UserStore;

    let a = TestNode::start(&[]);
    let b = TestNode::start(&[]);
    connect(&a, &b);

    a.engine.broadcast_public_key("mallory", "not-a-key!");
    // A valid announce after it acts as a completion marker.
    let key = base64::engine::general_purpose::STANDARD.encode([9u8; 32]);
    a.engine.broadcast_public_key("alice", &key);

    assert_eventually(
        || {
            b.store
                .find_by_username("alice")
                .expect("store read")
                .is_some()
        },
        "marker announce never arrived",
    );
    std::thread::sleep(SETTLE);
    assert!(b
        .store
        .find_by_username("mallory")
        .expect("store read")
        .is_none());
}

#[test]
fn test_send_failure_evicts_peer_and_spares_others() {
    let a = TestNode::start(&[]);
    let b = TestNode::start(&[]);
    let c = TestNode::start(&[]);
    connect(&a, &b);
    connect(&a, &c);
    let c_id = c.peer_id();

    // Take C down. The closed connection alone must not evict it.
    drop(c);
    std::thread::sleep(SETTLE);
    assert!(a.sink.peers_disconnected().is_empty());

    a.engine.send_message("alice", "survivors", None, false);

    assert_eventually(
        || b.sink.chats().iter().any(|m| m.content == "survivors"),
        "broadcast never reached the surviving peer",
    );
    assert_eventually(
        || a.sink.peers_disconnected().contains(&c_id),
        "failed send never evicted the dead peer",
    );
    std::thread::sleep(SETTLE);
    assert_eq!(
        a.sink
            .peers_disconnected()
            .iter()
            .filter(|id| **id == c_id)
            .count(),
        1
    );
}

#[test]
fn test_bidirectional_chat_after_single_dial() {
    let a = TestNode::start(&[]);
    let b = TestNode::start(&[]);
    connect(&a, &b);

    // B never dialed A; the handshake registered A on B's side, so B's
    // broadcasts flow back over the same connection.
    b.engine.send_message("bob", "right back", None, false);

    assert_eventually(
        || a.sink.chats().iter().any(|c| c.sender == "bob"),
        "reverse-direction chat never arrived",
    );
}
