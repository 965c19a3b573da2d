//! Protocol error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Header too short: expected {expected} bytes, got {got}")]
    HeaderTooShort { expected: usize, got: usize },

    #[error("Envelope version mismatch: expected {expected:#04x}, got {got:#04x}")]
    VersionMismatch { expected: u8, got: u8 },

    #[error("Invalid frame count: expected {expected}, got {got}")]
    InvalidFrameCount { expected: usize, got: usize },

    #[error("Payload length mismatch: header says {expected}, got {got}")]
    PayloadLengthMismatch { expected: usize, got: usize },

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Destination frame is not valid UTF-8")]
    InvalidDestination,

    #[error("Missing msg_type in message")]
    MissingMessageType,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
