//! Wire format encoding and decoding.
//!
//! Implements the 4-byte header format:
//! ```text
//! ┌─────────────────────────────┬──────────┬──────────┬───────────┐
//! │ Byte 0                      │ Byte 1   │ Byte 2   │ Byte 3    │
//! │ bit 7: kind                 │ length   │ category │ operation │
//! │ bits 6-3: technology        │ low 8    │          │           │
//! │ bits 2-0: length high 3     │ bits     │          │           │
//! └─────────────────────────────┴──────────┴──────────┴───────────┘
//! ```
//!
//! `length` is an 11-bit field (0–2047) giving the exact payload size.

/// Header size in bytes (fixed, exactly 4).
pub const HEADER_SIZE: usize = 4;

/// Maximum payload length representable in the 11-bit length field.
pub const MAX_PAYLOAD_LEN: usize = 2047;

/// Maximum value of the 4-bit technology tag.
pub const MAX_TECHNOLOGY: u8 = 0x0F;

/// Category whose frames are delivered to every registered channel.
pub const SYSTEM_CATEGORY: u8 = 0x00;

/// Whether a frame is a command/response or an unsolicited event.
///
/// The wire carries a single bit: 0 on an outbound frame means command,
/// 0 on an inbound frame means response to an earlier command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Command (outbound) or response to a command (inbound).
    CommandResponse,
    /// Unsolicited event from the remote controller.
    Event,
}

impl FrameKind {
    /// Decode from the high bit of header byte 0.
    #[inline]
    pub fn from_bit(bit: bool) -> Self {
        if bit {
            FrameKind::Event
        } else {
            FrameKind::CommandResponse
        }
    }

    /// Encode as the high bit of header byte 0.
    #[inline]
    pub fn as_bit(self) -> u8 {
        match self {
            FrameKind::CommandResponse => 0,
            FrameKind::Event => 1,
        }
    }
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Command/response vs event.
    pub kind: FrameKind,
    /// 4-bit sub-protocol family tag (e.g. classic BT vs BLE vs mesh).
    pub technology: u8,
    /// Exact payload length in bytes (0–2047).
    pub length: u16,
    /// Functional group id.
    pub category: u8,
    /// Command/event id within the category.
    pub operation: u8,
}

impl Header {
    /// Create a new header.
    ///
    /// `technology` is masked to 4 bits and `length` to 11 bits; callers
    /// that need rejection instead of masking validate before constructing
    /// (see [`crate::hub::LinkHub`] for the outbound path).
    pub fn new(kind: FrameKind, technology: u8, length: u16, category: u8, operation: u8) -> Self {
        Self {
            kind,
            technology: technology & MAX_TECHNOLOGY,
            length: length & 0x07FF,
            category,
            operation,
        }
    }

    /// Encode header to its 4 wire bytes.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        [
            (self.kind.as_bit() << 7)
                | ((self.technology & MAX_TECHNOLOGY) << 3)
                | ((self.length >> 8) as u8 & 0x07),
            (self.length & 0xFF) as u8,
            self.category,
            self.operation,
        ]
    }

    /// Decode a header from wire bytes.
    ///
    /// Returns `None` if the buffer holds fewer than 4 bytes. Every 4-byte
    /// buffer decodes successfully: all bit patterns are meaningful.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            kind: FrameKind::from_bit(buf[0] & 0x80 != 0),
            technology: (buf[0] >> 3) & MAX_TECHNOLOGY,
            length: (((buf[0] & 0x07) as u16) << 8) | buf[1] as u16,
            category: buf[2],
            operation: buf[3],
        })
    }

    /// Check if this is an unsolicited event.
    #[inline]
    pub fn is_event(&self) -> bool {
        self.kind == FrameKind::Event
    }

    /// Check if this is a command/response frame.
    #[inline]
    pub fn is_response(&self) -> bool {
        self.kind == FrameKind::CommandResponse
    }
}
