//! Error types for the PITCH decoder and book engine

use thiserror::Error;

/// Errors raised while decoding the feed or reconstructing books.
///
/// Every variant except the I/O and output wrappers is a data-integrity failure:
/// the stream cannot be trusted past the offending record, so processing stops.
#[derive(Error, Debug)]
pub enum PitchError {
    #[error("Framing error: {reason}")]
    Framing { reason: String },

    #[error("Unknown message type: 0x{0:02X}")]
    UnknownMessageType(u8),

    #[error("Invalid side indicator: 0x{0:02X}")]
    InvalidSide(u8),

    #[error("Unknown order reference: {0}")]
    UnknownOrderReference(u64),

    #[error("Duplicate order id: {0}")]
    DuplicateOrder(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl PitchError {
    pub(crate) fn framing(reason: impl Into<String>) -> Self {
        PitchError::Framing {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for PitchError {
    fn from(err: serde_json::Error) -> Self {
        PitchError::SerializationError(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for PitchError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        PitchError::SerializationError(err.to_string())
    }
}

impl From<prometheus::Error> for PitchError {
    fn from(err: prometheus::Error) -> Self {
        PitchError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PitchError>;
