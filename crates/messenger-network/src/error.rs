//! Network error types for the messenger P2P layer.

use libp2p::{noise, TransportError};

/// Errors that can occur in the messenger network layer.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Transport-level error (TCP, Noise, Yamux).
    #[error("transport error: {0}")]
    Transport(String),

    /// Failed to dial a peer.
    #[error("dial error: {0}")]
    Dial(String),

    /// Error listening on an address.
    #[error("listen error: {0}")]
    Listen(String),

    /// A peer address string could not be parsed or lacks a peer id.
    #[error("invalid peer address: {0}")]
    InvalidAddress(String),

    /// Serialization / deserialization error.
    #[error("codec error: {0}")]
    Codec(String),

    /// The node has not been started yet.
    #[error("node not started")]
    NotStarted,

    /// The node is already running.
    #[error("node already running")]
    AlreadyRunning,

    /// Error from the core layer.
    #[error("core error: {0}")]
    Core(#[from] messenger_core::CoreError),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<noise::Error> for NetworkError {
    fn from(err: noise::Error) -> Self {
        NetworkError::Transport(err.to_string())
    }
}

impl<T: std::fmt::Debug> From<TransportError<T>> for NetworkError {
    fn from(err: TransportError<T>) -> Self {
        NetworkError::Transport(format!("{:?}", err))
    }
}

impl From<libp2p::multiaddr::Error> for NetworkError {
    fn from(err: libp2p::multiaddr::Error) -> Self {
        NetworkError::InvalidAddress(err.to_string())
    }
}
