//! Process configuration for a messenger node.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CoreError;

/// Configuration for a messenger node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessengerConfig {
    /// Port the P2P listener binds to. 0 picks an ephemeral port.
    pub listen_port: u16,
    /// Bootstrap peer multiaddrs dialed at startup.
    pub bootstrap_peers: Vec<String>,
    /// Capacity of the seen-message dedup cache.
    pub seen_cache_capacity: usize,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            listen_port: 8000,
            bootstrap_peers: Vec::new(),
            seen_cache_capacity: 1000,
            log_level: "info".into(),
        }
    }
}

impl MessengerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)?;
        let config = toml::from_str(&raw)?;
        Ok(config)
    }

    /// The local listen multiaddr for the configured port.
    pub fn listen_multiaddr(&self) -> String {
        format!("/ip4/0.0.0.0/tcp/{}", self.listen_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MessengerConfig::default();
        assert_eq!(config.listen_port, 8000);
        assert!(config.bootstrap_peers.is_empty());
        assert_eq!(config.seen_cache_capacity, 1000);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_listen_multiaddr() {
        let config = MessengerConfig {
            listen_port: 9000,
            ..Default::default()
        };
        assert_eq!(config.listen_multiaddr(), "/ip4/0.0.0.0/tcp/9000");
    }

    #[test]
    fn test_parse_toml() {
        let raw = r#"
            listen_port = 8100
            bootstrap_peers = ["/ip4/10.0.0.5/tcp/8000/p2p/12D3KooWpeer"]
            seen_cache_capacity = 500
            log_level = "debug"
        "#;
        let config: MessengerConfig = toml::from_str(raw).expect("parse");
        assert_eq!(config.listen_port, 8100);
        assert_eq!(config.bootstrap_peers.len(), 1);
        assert_eq!(config.seen_cache_capacity, 500);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_load_missing_file() {
        let result = MessengerConfig::load(Path::new("/nonexistent/messenger.toml"));
        assert!(matches!(result, Err(CoreError::Io(_))));
    }
}
