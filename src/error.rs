//! # Error Types
//!
//! Custom error types for Robofish using `thiserror`.

use thiserror::Error;

/// Main error type for Robofish
#[derive(Debug, Error)]
pub enum RobofishError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Serial port errors (open, read, write)
    #[error("Serial error: {0}")]
    Serial(String),

    /// Telemetry record serialization errors
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Robofish
pub type Result<T> = std::result::Result<T, RobofishError>;
