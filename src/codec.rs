//! Fixed-layout payload encoding helpers.
//!
//! Command and event payloads are fixed-layout little-endian records whose
//! shapes are defined per operation by the feature-wrapper layer. These
//! helpers keep wrappers from hand-rolling byte twiddling; the core itself
//! never interprets payload contents.
//!
//! # Example
//!
//! ```
//! use bglink::codec::{PayloadReader, PayloadWriter};
//!
//! let payload = PayloadWriter::new()
//!     .u8(0x01)
//!     .u16_le(0x1234)
//!     .u8_array(b"key")
//!     .finish();
//!
//! let mut reader = PayloadReader::new(&payload);
//! assert_eq!(reader.u8().unwrap(), 0x01);
//! assert_eq!(reader.u16_le().unwrap(), 0x1234);
//! assert_eq!(reader.u8_array().unwrap(), b"key");
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{LinkError, Result};

/// Builder for a fixed-layout payload.
#[derive(Debug, Default)]
pub struct PayloadWriter {
    buf: BytesMut,
}

impl PayloadWriter {
    /// Start an empty payload.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    /// Append an unsigned byte.
    pub fn u8(mut self, value: u8) -> Self {
        self.buf.put_u8(value);
        self
    }

    /// Append a signed byte.
    pub fn i8(mut self, value: i8) -> Self {
        self.buf.put_i8(value);
        self
    }

    /// Append a little-endian u16.
    pub fn u16_le(mut self, value: u16) -> Self {
        self.buf.put_u16_le(value);
        self
    }

    /// Append a little-endian u32.
    pub fn u32_le(mut self, value: u32) -> Self {
        self.buf.put_u32_le(value);
        self
    }

    /// Append raw bytes with no length prefix.
    pub fn bytes(mut self, value: &[u8]) -> Self {
        self.buf.put_slice(value);
        self
    }

    /// Append a one-byte-length-prefixed byte array (max 255 bytes).
    ///
    /// # Panics
    ///
    /// Panics if `value` is longer than 255 bytes; prefixed arrays are a
    /// wire-format construct with a one-byte length.
    pub fn u8_array(mut self, value: &[u8]) -> Self {
        assert!(value.len() <= u8::MAX as usize, "u8_array longer than 255");
        self.buf.put_u8(value.len() as u8);
        self.buf.put_slice(value);
        self
    }

    /// Finish into an immutable payload.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Cursor over a fixed-layout payload.
///
/// Every read checks the remaining length; underrun is a
/// [`LinkError::Protocol`] so a short payload surfaces as an error instead
/// of a panic.
#[derive(Debug)]
pub struct PayloadReader<'a> {
    buf: &'a [u8],
    at: usize,
}

impl<'a> PayloadReader<'a> {
    /// Start reading at the front of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, at: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.at
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(LinkError::Protocol(format!(
                "Payload underrun: wanted {} byte(s), {} left",
                n,
                self.remaining()
            )));
        }
        let slice = &self.buf[self.at..self.at + n];
        self.at += n;
        Ok(slice)
    }

    /// Read an unsigned byte.
    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a signed byte.
    pub fn i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    /// Read a little-endian u16.
    pub fn u16_le(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a little-endian u32.
    pub fn u32_le(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read `n` raw bytes.
    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Read a one-byte-length-prefixed byte array.
    pub fn u8_array(&mut self) -> Result<&'a [u8]> {
        let len = self.u8()? as usize;
        self.take(len)
    }

    /// Everything left, consuming the reader.
    pub fn rest(mut self) -> &'a [u8] {
        let slice = &self.buf[self.at..];
        self.at = self.buf.len();
        slice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_layout_is_little_endian() {
        let payload = PayloadWriter::new().u16_le(0x1234).u32_le(0xAABBCCDD).finish();
        assert_eq!(&payload[..], &[0x34, 0x12, 0xDD, 0xCC, 0xBB, 0xAA]);
    }

    #[test]
    fn test_round_trip_mixed_fields() {
        let payload = PayloadWriter::new()
            .u8(0x7F)
            .i8(-2)
            .u16_le(513)
            .u32_le(70000)
            .u8_array(b"abc")
            .bytes(b"tail")
            .finish();

        let mut reader = PayloadReader::new(&payload);
        assert_eq!(reader.u8().unwrap(), 0x7F);
        assert_eq!(reader.i8().unwrap(), -2);
        assert_eq!(reader.u16_le().unwrap(), 513);
        assert_eq!(reader.u32_le().unwrap(), 70000);
        assert_eq!(reader.u8_array().unwrap(), b"abc");
        assert_eq!(reader.rest(), b"tail");
    }

    #[test]
    fn test_underrun_is_an_error() {
        let mut reader = PayloadReader::new(&[0x01]);
        assert_eq!(reader.u8().unwrap(), 0x01);
        assert!(matches!(reader.u16_le(), Err(LinkError::Protocol(_))));
    }

    #[test]
    fn test_prefixed_array_underrun() {
        // Prefix claims 5 bytes but only 2 follow.
        let mut reader = PayloadReader::new(&[0x05, 0xAA, 0xBB]);
        assert!(reader.u8_array().is_err());
    }

    #[test]
    fn test_error_code_at_payload_front() {
        // A response payload beginning with a non-zero 16-bit status, the
        // feature-wrapper convention for protocol-level errors.
        let payload = PayloadWriter::new().u16_le(0x0181).finish();
        let mut reader = PayloadReader::new(&payload);
        assert_eq!(reader.u16_le().unwrap(), 0x0181);
    }

    #[test]
    fn test_empty_payload() {
        let payload = PayloadWriter::new().finish();
        assert!(payload.is_empty());
        let reader = PayloadReader::new(&payload);
        assert_eq!(reader.remaining(), 0);
        assert!(reader.rest().is_empty());
    }
}
