//! The messenger chat stream protocol.
//!
//! Every envelope travels on its own substream: the sender opens a stream on
//! [`CHAT_PROTOCOL`], writes one JSON [`Envelope`], and the receiver answers
//! with a [`DeliveryAck`] before the stream closes. Any incompatible change
//! to the envelope requires a version bump in the protocol string.

use libp2p::{request_response, StreamProtocol};
use serde::{Deserialize, Serialize};

use messenger_core::Envelope;

/// The versioned chat protocol identifier.
pub const CHAT_PROTOCOL: StreamProtocol = StreamProtocol::new("/p2p-messenger/chat/1.0.0");

/// Transport-level acknowledgement that an envelope was read off the stream.
///
/// Says nothing about application effects; delivery stays at-most-once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAck;

/// The request-response behaviour carrying chat envelopes as JSON.
pub type ChatBehaviour = request_response::json::Behaviour<Envelope, DeliveryAck>;
