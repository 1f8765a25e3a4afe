//! Error types for the aria client

use thiserror::Error;

/// Result type alias for aria operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the aria client
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio capture/playback error
    #[error("audio error: {0}")]
    Audio(String),

    /// Service temporarily unavailable (transient, retryable)
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Transport-level error (connection, framing, protocol)
    #[error("transport error: {0}")]
    Transport(String),

    /// Per-turn deadline exceeded
    #[error("deadline exceeded after {0}s")]
    DeadlineExceeded(u64),

    /// Device action error (malformed payload or handler failure)
    #[error("device action error: {0}")]
    DeviceAction(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this failure is a transient service-unavailability condition
    /// worth retrying. Everything else (including deadline expiry) is fatal
    /// for the turn.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
