//! Transport abstraction - the byte source/sink the hub drives.
//!
//! The core makes no assumption about the underlying medium (serial port,
//! socket, in-memory pipe); it only requires ordered, non-duplicated bytes
//! in each direction. Opening and configuring the physical link is the
//! caller's concern.
//!
//! Any duplex stream that implements both [`AsyncRead`] and [`AsyncWrite`]
//! is a transport via the blanket impl, which splits it with
//! [`tokio::io::split`]. Pre-split reader/writer pairs attach through
//! [`crate::LinkHubBuilder::attach_split`].

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};

/// A byte-oriented duplex link to the remote controller.
pub trait Transport {
    /// Incoming byte source.
    type Reader: AsyncRead + Unpin + Send + 'static;
    /// Outgoing byte sink.
    type Writer: AsyncWrite + Unpin + Send + 'static;

    /// Split into independent read and write halves.
    fn split(self) -> (Self::Reader, Self::Writer);
}

impl<T> Transport for T
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Reader = ReadHalf<T>;
    type Writer = WriteHalf<T>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        tokio::io::split(self)
    }
}
