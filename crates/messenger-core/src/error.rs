//! Core protocol errors.

/// Errors raised by the core data model.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("envelope serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
