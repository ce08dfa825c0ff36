//! Messenger Engine Crate
//!
//! The concurrency bridge between synchronous callers (web handlers, UI
//! event code) and the asynchronous network engine. One engine per
//! process, owned by the composition root: it runs the transport node and
//! gossip router on a single dedicated worker thread and accepts commands
//! through a bounded, non-blocking queue.

pub mod command;
pub mod engine;

pub use command::Command;
pub use engine::{Collaborators, Engine, EngineState};
