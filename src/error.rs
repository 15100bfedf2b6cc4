//! Wolfelect Error Types

use thiserror::Error;

/// Result type alias for wolfelect operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wolfelect error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Coordination-service errors
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Protocol error: unexpected response {status}: {body}")]
    Protocol { status: u16, body: String },

    #[error("Session creation gave up after {tries} tries")]
    ExhaustedRetries { tries: u32 },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Controlled-unit errors
    #[error("Controlled unit error: {0}")]
    ControlledUnit(String),
}

impl Error {
    /// Check if this error is retryable on a later tick
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Protocol { .. })
    }
}
