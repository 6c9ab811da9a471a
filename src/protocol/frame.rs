//! Frame struct with typed accessors.
//!
//! Represents one complete decoded protocol message. Uses `bytes::Bytes`
//! for zero-copy payload sharing; a frame is immutable once constructed and
//! carries no reference back to the connection that produced it.
//!
//! # Example
//!
//! ```
//! use bglink::protocol::{Frame, FrameKind, Header};
//! use bytes::Bytes;
//!
//! let header = Header::new(FrameKind::Event, 0, 5, 0x04, 0x02);
//! let frame = Frame::new(header, Bytes::from_static(b"hello"));
//!
//! assert_eq!(frame.category(), 0x04);
//! assert_eq!(frame.payload(), b"hello");
//! assert!(frame.is_event());
//! ```

use bytes::Bytes;

use super::wire_format::{FrameKind, Header, HEADER_SIZE};

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from header and payload.
    pub fn new(header: Header, payload: Bytes) -> Self {
        debug_assert_eq!(header.length as usize, payload.len());
        Self { header, payload }
    }

    /// Create a frame from header and raw bytes (copies data).
    pub fn from_parts(header: Header, payload: &[u8]) -> Self {
        Self::new(header, Bytes::copy_from_slice(payload))
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get a clone of the payload as Bytes (cheap, zero-copy).
    #[inline]
    pub fn payload_bytes(&self) -> Bytes {
        self.payload.clone()
    }

    /// Get the payload length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Get the frame kind.
    #[inline]
    pub fn kind(&self) -> FrameKind {
        self.header.kind
    }

    /// Get the technology tag.
    #[inline]
    pub fn technology(&self) -> u8 {
        self.header.technology
    }

    /// Get the category id.
    #[inline]
    pub fn category(&self) -> u8 {
        self.header.category
    }

    /// Get the operation id.
    #[inline]
    pub fn operation(&self) -> u8 {
        self.header.operation
    }

    /// Check if this is an unsolicited event.
    #[inline]
    pub fn is_event(&self) -> bool {
        self.header.is_event()
    }

    /// Check if this is a command/response frame.
    #[inline]
    pub fn is_response(&self) -> bool {
        self.header.is_response()
    }
}

/// Build a complete frame as a single byte vector.
///
/// Encodes the 4-byte header and appends the payload into a contiguous
/// buffer, ready for the writer task.
pub fn build_frame(header: &Header, payload: &[u8]) -> Vec<u8> {
    debug_assert_eq!(header.length as usize, payload.len());
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}
