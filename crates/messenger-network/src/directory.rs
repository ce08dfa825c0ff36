//! Directory of peers this node has heard about.

use chrono::Utc;
use std::collections::HashMap;

/// A directory entry for a peer learned from a `peer_announce`.
#[derive(Debug, Clone, PartialEq)]
pub struct KnownPeerRecord {
    pub peer_id: String,
    pub addresses: Vec<String>,
    /// RFC 3339 time of the most recent announce.
    pub last_seen: String,
}

/// The known-peer directory, a superset of the connected set.
///
/// Owned and mutated only by the engine task; other threads receive cloned
/// snapshots.
#[derive(Debug, Default)]
pub struct PeerDirectory {
    peers: HashMap<String, KnownPeerRecord>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh the record for `peer_id`, stamping `last_seen`.
    pub fn upsert(&mut self, peer_id: &str, addresses: Vec<String>) {
        self.peers.insert(
            peer_id.to_owned(),
            KnownPeerRecord {
                peer_id: peer_id.to_owned(),
                addresses,
                last_seen: Utc::now().to_rfc3339(),
            },
        );
    }

    pub fn get(&self, peer_id: &str) -> Option<&KnownPeerRecord> {
        self.peers.get(peer_id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Point-in-time copy of the directory.
    pub fn snapshot(&self) -> HashMap<String, KnownPeerRecord> {
        self.peers.clone()
    }
}
