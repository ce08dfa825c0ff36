//! Commands crossing the thread boundary into the engine worker.

/// A request enqueued by an arbitrary caller thread and executed on the
/// engine thread. Fire-and-forget: there is no reply channel, and callers
/// cannot observe delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Dial a peer by full multiaddr.
    Connect { address: String },
    /// Broadcast a chat message to all connected peers.
    SendChat {
        sender: String,
        content: String,
        timestamp: Option<String>,
        encrypted: bool,
    },
    /// Broadcast a direct message; only the recipient's node surfaces it.
    SendDirect {
        sender: String,
        recipient: String,
        content: String,
        timestamp: Option<String>,
        encrypted: bool,
    },
    /// Announce a user's public key to all connected peers.
    BroadcastKey { username: String, public_key: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_debug_names() {
        let cmd = Command::Connect {
            address: "/ip4/127.0.0.1/tcp/8000/p2p/12D3KooWpeer".into(),
        };
        assert!(format!("{cmd:?}").starts_with("Connect"));
    }
}
