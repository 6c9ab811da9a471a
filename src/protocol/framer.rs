//! Incremental framer for the incoming byte stream.
//!
//! Reconstructs discrete frames from an arbitrarily-chunked byte stream.
//! The framer is a pure state machine with no I/O: the owner feeds it raw
//! chunks and collects completed frames. State is a single owned value, so
//! one framer belongs to exactly one reader task.
//!
//! States:
//! - `Header`: fewer than 4 header bytes seen so far
//! - `Payload`: header decoded, waiting for `header.length` payload bytes
//!
//! A `length == 0` frame completes immediately after its 4th header byte.
//!
//! # Example
//!
//! ```
//! use bglink::protocol::Framer;
//!
//! let mut framer = Framer::new();
//!
//! // Chunks arrive with no frame alignment
//! let frames = framer.push(&[0x00, 0x03, 0x01]);
//! assert!(frames.is_empty());
//!
//! let frames = framer.push(&[0x02, 0xAA, 0xBB, 0xCC]);
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].payload(), &[0xAA, 0xBB, 0xCC]);
//! ```

use bytes::BytesMut;

use super::frame::Frame;
use super::wire_format::{Header, HEADER_SIZE};

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for a complete 4-byte header.
    Header,
    /// Header decoded, waiting for `header.length` payload bytes.
    Payload { header: Header },
}

/// Accumulates incoming bytes and extracts complete frames.
///
/// Strictly one frame is in flight at a time; after each emission the
/// state resets before the next byte is considered. `push` never emits a
/// partial frame and never blocks.
pub struct Framer {
    /// Bytes received but not yet consumed by a completed frame.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
}

impl Framer {
    /// Create a new framer between frames.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(HEADER_SIZE + 2048),
            state: State::Header,
        }
    }

    /// Feed a chunk of raw bytes and extract all frames it completes.
    ///
    /// No assumption is made about chunk boundaries: a single byte, a
    /// partial header, or many frames may arrive in one call. Partial data
    /// is held internally for the next call. Infallible: every 4-byte
    /// header is valid and the length field cannot exceed 2047.
    pub fn push(&mut self, data: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one() {
            frames.push(frame);
        }
        frames
    }

    /// Try to extract a single frame, advancing the state machine.
    fn try_extract_one(&mut self) -> Option<Frame> {
        loop {
            match &self.state {
                State::Header => {
                    if self.buffer.len() < HEADER_SIZE {
                        return None;
                    }
                    let header = Header::decode(&self.buffer[..HEADER_SIZE])
                        .expect("buffer holds a full header");
                    let _ = self.buffer.split_to(HEADER_SIZE);

                    if header.length == 0 {
                        // Zero-length payload: complete without reading
                        // further bytes.
                        return Some(Frame::new(header, bytes::Bytes::new()));
                    }
                    self.state = State::Payload { header };
                }

                State::Payload { header } => {
                    let needed = header.length as usize;
                    if self.buffer.len() < needed {
                        return None;
                    }
                    let payload = self.buffer.split_to(needed).freeze();
                    let header = *header;
                    self.state = State::Header;
                    return Some(Frame::new(header, payload));
                }
            }
        }
    }

    /// Whether a frame is partially received.
    ///
    /// True when buffered bytes or decoded header state would be lost if
    /// the stream ended now. The hub uses this to report a transport that
    /// closed mid-frame instead of silently discarding the partial frame.
    pub fn is_mid_frame(&self) -> bool {
        !self.buffer.is_empty() || matches!(self.state, State::Payload { .. })
    }

    /// Bytes of the in-flight frame received so far.
    pub fn buffered(&self) -> usize {
        match self.state {
            State::Header => self.buffer.len(),
            State::Payload { .. } => HEADER_SIZE + self.buffer.len(),
        }
    }

    /// Discard any partial frame and return to the between-frames state.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = State::Header;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::Header => "Header",
            State::Payload { .. } => "Payload",
        }
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::super::frame::build_frame;
    use super::super::wire_format::FrameKind;
    use super::*;

    /// Helper to build one wire frame.
    fn make_frame_bytes(kind: FrameKind, category: u8, operation: u8, payload: &[u8]) -> Vec<u8> {
        let header = Header::new(kind, 0, payload.len() as u16, category, operation);
        build_frame(&header, payload)
    }

    #[test]
    fn test_single_complete_frame() {
        let mut framer = Framer::new();
        let bytes = make_frame_bytes(FrameKind::CommandResponse, 1, 2, b"hello");

        let frames = framer.push(&bytes);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].category(), 1);
        assert_eq!(frames[0].operation(), 2);
        assert_eq!(frames[0].payload(), b"hello");
        assert!(!framer.is_mid_frame());
    }

    #[test]
    fn test_spec_response_scenario() {
        // [0x00, 0x03, 0x01, 0x02] + payload [0xAA, 0xBB, 0xCC]
        let mut framer = Framer::new();
        let frames = framer.push(&[0x00, 0x03, 0x01, 0x02, 0xAA, 0xBB, 0xCC]);

        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame.kind(), FrameKind::CommandResponse);
        assert_eq!(frame.technology(), 0);
        assert_eq!(frame.category(), 1);
        assert_eq!(frame.operation(), 2);
        assert_eq!(frame.payload(), &[0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_zero_length_event_completes_immediately() {
        // [0x80, 0x00, 0x05, 0x10]: event with empty payload, complete
        // after the 4th header byte with no further bytes consumed.
        let mut framer = Framer::new();
        let frames = framer.push(&[0x80, 0x00, 0x05, 0x10]);

        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame.kind(), FrameKind::Event);
        assert_eq!(frame.category(), 5);
        assert_eq!(frame.operation(), 0x10);
        assert!(frame.payload().is_empty());
        assert!(!framer.is_mid_frame());

        // The next byte starts a fresh header.
        let frames = framer.push(&[0x00]);
        assert!(frames.is_empty());
        assert_eq!(framer.buffered(), 1);
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut framer = Framer::new();
        let mut combined = make_frame_bytes(FrameKind::CommandResponse, 1, 1, b"first");
        combined.extend(make_frame_bytes(FrameKind::Event, 2, 2, b""));
        combined.extend(make_frame_bytes(FrameKind::CommandResponse, 3, 3, b"third"));

        let frames = framer.push(&combined);

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].category(), 1);
        assert_eq!(frames[1].category(), 2);
        assert_eq!(frames[2].category(), 3);
        assert!(!framer.is_mid_frame());
    }

    #[test]
    fn test_fragmented_header() {
        let mut framer = Framer::new();
        let bytes = make_frame_bytes(FrameKind::CommandResponse, 1, 2, b"test");

        let frames = framer.push(&bytes[..2]);
        assert!(frames.is_empty());
        assert_eq!(framer.state_name(), "Header");
        assert!(framer.is_mid_frame());

        let frames = framer.push(&bytes[2..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"test");
    }

    #[test]
    fn test_fragmented_payload() {
        let mut framer = Framer::new();
        let payload = b"a longer payload that arrives in pieces";
        let bytes = make_frame_bytes(FrameKind::CommandResponse, 1, 2, payload);

        let frames = framer.push(&bytes[..HEADER_SIZE + 10]);
        assert!(frames.is_empty());
        assert_eq!(framer.state_name(), "Payload");

        let frames = framer.push(&bytes[HEADER_SIZE + 10..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), payload);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut framer = Framer::new();
        let bytes = make_frame_bytes(FrameKind::Event, 4, 9, b"hi");

        let mut all = Vec::new();
        for byte in &bytes {
            all.extend(framer.push(&[*byte]));
        }

        assert_eq!(all.len(), 1);
        assert_eq!(all[0].payload(), b"hi");
    }

    #[test]
    fn test_chunk_boundary_invariance() {
        // The same stream split at every possible boundary yields the same
        // frame sequence as one big push.
        let mut stream = make_frame_bytes(FrameKind::CommandResponse, 1, 2, b"alpha");
        stream.extend(make_frame_bytes(FrameKind::Event, 2, 3, b""));
        stream.extend(make_frame_bytes(FrameKind::CommandResponse, 1, 4, b"beta!"));

        let mut whole = Framer::new();
        let expected = whole.push(&stream);
        assert_eq!(expected.len(), 3);

        for split in 1..stream.len() {
            let mut framer = Framer::new();
            let mut got = framer.push(&stream[..split]);
            got.extend(framer.push(&stream[split..]));

            assert_eq!(got.len(), expected.len(), "split at {}", split);
            for (a, b) in got.iter().zip(expected.iter()) {
                assert_eq!(a.header, b.header, "split at {}", split);
                assert_eq!(a.payload(), b.payload(), "split at {}", split);
            }
        }
    }

    #[test]
    fn test_max_length_payload() {
        let payload = vec![0xAB; 2047];
        let mut framer = Framer::new();
        let bytes = make_frame_bytes(FrameKind::CommandResponse, 1, 1, &payload);

        let frames = framer.push(&bytes);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload_len(), 2047);
        assert!(frames[0].payload().iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_partial_frame_not_emitted_on_close() {
        // 2 of 5 payload bytes received when the transport closes: no frame
        // comes out, and the partial state is visible to the caller.
        let mut framer = Framer::new();
        let bytes = make_frame_bytes(FrameKind::CommandResponse, 1, 2, b"12345");

        let frames = framer.push(&bytes[..HEADER_SIZE + 2]);
        assert!(frames.is_empty());
        assert!(framer.is_mid_frame());
        assert_eq!(framer.buffered(), HEADER_SIZE + 2);

        framer.reset();
        assert!(!framer.is_mid_frame());
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_mixed_complete_and_partial() {
        let mut framer = Framer::new();
        let frame1 = make_frame_bytes(FrameKind::CommandResponse, 1, 1, b"first");
        let frame2 = make_frame_bytes(FrameKind::CommandResponse, 2, 2, b"second");

        let mut data = frame1.clone();
        data.extend_from_slice(&frame2[..3]);

        let frames = framer.push(&data);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].category(), 1);
        assert!(framer.is_mid_frame());

        let frames = framer.push(&frame2[3..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].category(), 2);
    }
}
