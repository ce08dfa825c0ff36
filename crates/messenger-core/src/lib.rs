pub mod config;
pub mod envelope;
pub mod error;

pub use config::MessengerConfig;
pub use envelope::{message_id, Envelope, MessageKind};
pub use error::CoreError;
