//! # Error Types
//!
//! Custom error types for HID+ Bridge using `thiserror`.
//!
//! Module-level failures keep their own enums ([`DecodeError`](crate::protocol::DecodeError),
//! [`AttachError`](crate::device::AttachError), [`PushError`](crate::device::PushError));
//! this type covers what can stop the service from starting.

use thiserror::Error;

use crate::device::AttachError;

/// Main error type for HID+ Bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Virtual controller registration failed
    #[error("Device attach failed: {0}")]
    Attach(#[from] AttachError),

    /// Command transport could not be brought up
    #[error("Transport error: {0}")]
    Transport(String),

    /// A service task ended abnormally
    #[error("Task failed: {0}")]
    Task(String),
}

/// Result type alias for HID+ Bridge
pub type Result<T> = std::result::Result<T, BridgeError>;
