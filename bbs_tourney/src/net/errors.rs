//! Error types for wire framing and bus delivery.

use thiserror::Error;

/// Errors that can occur while encoding or decoding a wire frame
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame was not a valid message
    #[error("Malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame size exceeded maximum allowed
    #[error("Frame size {actual} exceeds maximum {max}")]
    FrameTooLarge { actual: usize, max: usize },
}

/// Result type for framing operations
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// Errors from publishing to or reading from the bus
#[derive(Debug, Error)]
pub enum BusError {
    /// Nobody is listening; the frame was dropped
    #[error("No subscribers, frame dropped")]
    NoSubscribers,

    /// Subscriber fell behind and missed frames
    #[error("Subscriber lagged, {0} frames skipped")]
    Lagged(u64),

    /// Bus shut down
    #[error("Bus closed")]
    Closed,

    /// Frame could not be encoded
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Result type for bus operations
pub type BusResult<T> = std::result::Result<T, BusError>;
