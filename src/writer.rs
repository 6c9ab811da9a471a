//! Dedicated writer task enforcing single-writer discipline.
//!
//! Every outbound frame funnels through one mpsc channel into a single
//! task that owns the transport's write half. Nothing else writes to the
//! transport, so two commands' bytes can never interleave on the wire.
//!
//! ```text
//! Channel A ─┐
//! Channel B ─┼─► mpsc::Sender<OutboundFrame> ─► writer task ─► transport
//! Hub       ─┘
//! ```
//!
//! Frames already queued when the task wakes are coalesced into one
//! contiguous buffer and written with a single `write_all` + `flush`.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{LinkError, Result};
use crate::protocol::{Header, HEADER_SIZE};

/// Default capacity of the outbound frame queue.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Maximum frames coalesced into a single write.
const MAX_BATCH_SIZE: usize = 16;

/// A frame ready to be written to the transport.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Pre-encoded 4-byte header.
    pub header: [u8; HEADER_SIZE],
    /// Payload bytes (may be empty).
    pub payload: Bytes,
}

impl OutboundFrame {
    /// Create a new outbound frame.
    #[inline]
    pub fn new(header: &Header, payload: Bytes) -> Self {
        Self {
            header: header.encode(),
            payload,
        }
    }

    /// Total wire size of this frame.
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Capacity of the outbound frame queue.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Handle for submitting frames to the writer task.
///
/// Cheaply cloneable; shared by the hub and every channel.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Submit a frame for writing.
    ///
    /// Waits for queue space if the writer is behind. Fails with
    /// [`LinkError::ConnectionClosed`] once the writer task has exited.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| LinkError::ConnectionClosed)
    }
}

/// Spawn the writer task and return a handle for submitting frames.
pub fn spawn_writer_task<W>(
    writer: W,
    config: WriterConfig,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

/// Main writer loop: receive frames, coalesce, write.
async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        let first = match rx.recv().await {
            Some(frame) => frame,
            // All handles dropped: clean shutdown.
            None => return Ok(()),
        };

        buf.clear();
        buf.extend_from_slice(&first.header);
        buf.extend_from_slice(&first.payload);

        // Coalesce frames that are already queued.
        let mut batched = 1;
        while batched < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => {
                    buf.extend_from_slice(&frame.header);
                    buf.extend_from_slice(&frame.payload);
                    batched += 1;
                }
                Err(_) => break,
            }
        }

        writer.write_all(&buf).await?;
        writer.flush().await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FrameKind;
    use tokio::io::{duplex, AsyncReadExt};

    fn frame(category: u8, operation: u8, payload: &'static [u8]) -> OutboundFrame {
        let header = Header::new(
            FrameKind::CommandResponse,
            0,
            payload.len() as u16,
            category,
            operation,
        );
        OutboundFrame::new(&header, Bytes::from_static(payload))
    }

    #[test]
    fn test_outbound_frame_size() {
        let f = frame(1, 2, b"hello");
        assert_eq!(f.size(), HEADER_SIZE + 5);
        assert_eq!(frame(1, 2, b"").size(), HEADER_SIZE);
    }

    #[tokio::test]
    async fn test_writer_single_frame_on_wire() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client, WriterConfig::default());

        handle.send(frame(1, 2, b"hello")).await.unwrap();

        let mut buf = vec![0u8; HEADER_SIZE + 5];
        server.read_exact(&mut buf).await.unwrap();

        assert_eq!(&buf[..HEADER_SIZE], &[0x00, 0x05, 0x01, 0x02]);
        assert_eq!(&buf[HEADER_SIZE..], b"hello");
    }

    #[tokio::test]
    async fn test_writer_many_frames_arrive_in_order() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client, WriterConfig::default());

        for op in 0..20u8 {
            handle.send(frame(1, op, b"data")).await.unwrap();
        }

        let total = 20 * (HEADER_SIZE + 4);
        let mut buf = vec![0u8; total];
        server.read_exact(&mut buf).await.unwrap();

        for op in 0..20usize {
            let at = op * (HEADER_SIZE + 4);
            let header = Header::decode(&buf[at..at + HEADER_SIZE]).unwrap();
            assert_eq!(header.operation, op as u8);
            assert_eq!(&buf[at + HEADER_SIZE..at + HEADER_SIZE + 4], b"data");
        }
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_handle_drop() {
        let (client, _server) = duplex(4096);
        let (handle, task) = spawn_writer_task(client, WriterConfig::default());

        drop(handle);

        let result = task.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_send_after_writer_gone() {
        let (client, server) = duplex(64);
        let (handle, task) = spawn_writer_task(client, WriterConfig::default());

        // Closing the read side makes the next write fail and the task exit.
        drop(server);
        handle.send(frame(1, 1, b"x")).await.ok();
        let _ = task.await;

        let err = handle.send(frame(1, 1, b"x")).await.unwrap_err();
        assert!(matches!(err, LinkError::ConnectionClosed));
    }
}
