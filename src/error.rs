//! Error types for bglink.

use thiserror::Error;

/// Main error type for all link operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// I/O error from the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol error (malformed payload, duplicate category, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Outbound payload does not fit the 11-bit length field.
    #[error("Payload length {len} exceeds maximum of 2047 bytes")]
    PayloadTooLarge {
        /// Length of the rejected payload.
        len: usize,
    },

    /// Transport closed while a frame was partially received.
    #[error("Transport closed mid-frame with {buffered} byte(s) of an incomplete frame")]
    TruncatedFrame {
        /// Bytes of the incomplete frame received before the close.
        buffered: usize,
    },

    /// Transport closed; outstanding requests cannot complete.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using LinkError.
pub type Result<T> = std::result::Result<T, LinkError>;
