//! # Error Types
//!
//! Custom error types for the field node using `thiserror`.

use thiserror::Error;

/// Main error type for the field node
#[derive(Debug, Error)]
pub enum FieldNodeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("Serial port not found (tried: {0})")]
    SerialPortNotFound(String),

    /// Uplink payload encoding/decoding errors
    #[error("Payload error: {0}")]
    Payload(String),

    /// A single sensor transaction failed
    #[error("Sensor error: {0}")]
    Sensor(String),

    /// Network service errors after startup
    #[error("Network error: {0}")]
    Network(String),

    /// Stack initialization, configuration or identity failures before dispatch
    #[error("Fatal initialization error: {0}")]
    FatalInit(String),

    /// The network rejected the join request
    #[error("Network join failed: {0}")]
    JoinFailed(String),
}

/// Result type alias for the field node
pub type Result<T> = std::result::Result<T, FieldNodeError>;
