//! Protocol module - wire format, framing, and frame types.
//!
//! Implements the binary protocol layer:
//! - 4-byte header encoding/decoding
//! - Incremental framer for arbitrarily-chunked input
//! - Frame struct with typed accessors

mod frame;
mod framer;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use framer::Framer;
pub use wire_format::{
    FrameKind, Header, HEADER_SIZE, MAX_PAYLOAD_LEN, MAX_TECHNOLOGY, SYSTEM_CATEGORY,
};
