//! Messenger P2P Networking Crate
//!
//! This crate provides the peer-to-peer networking layer for the messenger.
//! Built on top of libp2p, it implements:
//!
//! - **Transport node** — TCP + Noise + Yamux, one JSON envelope per
//!   short-lived stream on the versioned chat protocol
//! - **Gossip router** — envelope dispatch, message deduplication, and the
//!   known-peer directory
//! - **Collaborator seams** — traits for the UI sink, the user/key store,
//!   and peer lifecycle notifications, supplied at construction time
//!
//! All mutable network state lives on the single engine task; other threads
//! only ever see snapshots.

pub mod directory;
pub mod error;
pub mod events;
pub mod node;
pub mod protocol;
pub mod router;
pub mod seen;
pub mod store;
pub mod transport;

// Re-exports for convenience.
pub use directory::{KnownPeerRecord, PeerDirectory};
pub use error::NetworkError;
pub use events::{PeerEventSink, UiSink};
pub use node::{MessengerNode, NodeInfo, NodeSettings};
pub use protocol::{ChatBehaviour, DeliveryAck, CHAT_PROTOCOL};
pub use router::GossipRouter;
pub use seen::SeenMessageCache;
pub use store::{MemoryUserStore, StoreError, UserRecord, UserStore};

// Re-export commonly used libp2p types for downstream convenience.
pub use libp2p::{identity::Keypair, Multiaddr, PeerId};
