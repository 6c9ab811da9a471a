//! Dispatch hub: owns the transport, the framer, and the channel table.
//!
//! The [`LinkHubBuilder`] registers one channel per category and attaches
//! the transport. Attaching spawns two tasks:
//! 1. the writer task (see [`crate::writer`]), the only writer on the wire
//! 2. the read loop, which drains the transport, feeds the [`Framer`], and
//!    fans every decoded frame out to the matching channel
//!
//! Fan-out happens synchronously inside the read loop; a caller suspended
//! in [`Channel::request`] never blocks the reader. Frames for the
//! system-wide category are delivered to every channel; frames for an
//! unregistered category are dropped with a debug log.
//!
//! When the transport closes or the read fails, the hub fails every
//! pending request on every channel and ends all event streams, then
//! reports the outcome through [`LinkHub::wait_for_shutdown`]. EOF while a
//! frame is partially received is reported as
//! [`LinkError::TruncatedFrame`], not a clean close.
//!
//! # Example
//!
//! ```ignore
//! use bglink::{LinkHub, FrameKind};
//!
//! let port = open_serial_port()?; // any AsyncRead + AsyncWrite stream
//! let hub = LinkHub::builder()
//!     .category(0x03) // connection management
//!     .category(0x05) // security manager
//!     .attach(port)?;
//!
//! let connection = hub.channel(0x03).unwrap();
//! let payload = connection.request(0x01, &[0x00]).await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::channel::{Channel, ChannelState};
use crate::error::{LinkError, Result};
use crate::protocol::{
    Frame, FrameKind, Framer, Header, MAX_PAYLOAD_LEN, MAX_TECHNOLOGY, SYSTEM_CATEGORY,
};
use crate::transport::Transport;
use crate::writer::{spawn_writer_task, OutboundFrame, WriterConfig, WriterHandle};

/// Read buffer size for draining the transport.
const READ_BUFFER_SIZE: usize = 4096;

/// Builder for configuring and attaching a [`LinkHub`].
pub struct LinkHubBuilder {
    categories: Vec<u8>,
    technology: u8,
    writer_config: WriterConfig,
}

impl LinkHubBuilder {
    /// Create a builder with no channels and technology tag 0.
    pub fn new() -> Self {
        Self {
            categories: Vec::new(),
            technology: 0,
            writer_config: WriterConfig::default(),
        }
    }

    /// Register a channel for `category`.
    ///
    /// One channel per category; registering the same category twice is
    /// rejected at attach time.
    pub fn category(mut self, category: u8) -> Self {
        self.categories.push(category);
        self
    }

    /// Set the 4-bit technology tag stamped on every outbound frame.
    pub fn technology(mut self, technology: u8) -> Self {
        self.technology = technology;
        self
    }

    /// Override the writer task configuration.
    pub fn writer_config(mut self, config: WriterConfig) -> Self {
        self.writer_config = config;
        self
    }

    /// Attach a duplex transport, spawning the writer task and read loop.
    pub fn attach<T: Transport>(self, transport: T) -> Result<LinkHub> {
        let (reader, writer) = transport.split();
        self.attach_split(reader, writer)
    }

    /// Attach an already split reader/writer pair.
    pub fn attach_split<R, W>(self, reader: R, writer: W) -> Result<LinkHub>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        if self.technology > MAX_TECHNOLOGY {
            return Err(LinkError::Protocol(format!(
                "Technology tag {:#x} does not fit in 4 bits",
                self.technology
            )));
        }

        let mut channels: HashMap<u8, Arc<ChannelState>> = HashMap::new();
        for category in &self.categories {
            if channels
                .insert(*category, Arc::new(ChannelState::new(*category)))
                .is_some()
            {
                return Err(LinkError::Protocol(format!(
                    "Category {:#04x} registered twice",
                    category
                )));
            }
        }
        let channels = Arc::new(channels);

        let (writer_handle, writer_task) = spawn_writer_task(writer, self.writer_config);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let read_channels = channels.clone();
        let read_task = tokio::spawn(async move {
            let result = read_loop(reader, &read_channels).await;
            if let Err(ref err) = result {
                tracing::error!("Read loop failed: {}", err);
            }
            for state in read_channels.values() {
                state.fail_all();
            }
            let _ = shutdown_tx.send(result);
        });

        Ok(LinkHub {
            channels,
            writer: writer_handle,
            technology: self.technology,
            shutdown_rx,
            _writer_task: writer_task,
            _read_task: read_task,
        })
    }
}

impl Default for LinkHubBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running protocol engine bound to one transport.
pub struct LinkHub {
    channels: Arc<HashMap<u8, Arc<ChannelState>>>,
    writer: WriterHandle,
    technology: u8,
    shutdown_rx: oneshot::Receiver<Result<()>>,
    _writer_task: JoinHandle<Result<()>>,
    _read_task: JoinHandle<()>,
}

impl std::fmt::Debug for LinkHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkHub")
            .field("technology", &self.technology)
            .field("categories", &self.channels.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl LinkHub {
    /// Create a new hub builder.
    pub fn builder() -> LinkHubBuilder {
        LinkHubBuilder::new()
    }

    /// Get the channel handle for a registered category.
    pub fn channel(&self, category: u8) -> Option<Channel> {
        self.channels
            .get(&category)
            .map(|state| Channel::new(state.clone(), self.writer.clone(), self.technology))
    }

    /// Serialize and write one frame, bypassing the channel layer.
    ///
    /// This is the raw outbound path channels build on; it is public for
    /// feature wrappers that target a category without a channel (e.g. a
    /// one-shot command during bring-up).
    pub async fn send_frame(
        &self,
        kind: FrameKind,
        category: u8,
        operation: u8,
        payload: &[u8],
    ) -> Result<()> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(LinkError::PayloadTooLarge { len: payload.len() });
        }
        let header = Header::new(kind, self.technology, payload.len() as u16, category, operation);
        let frame = OutboundFrame::new(&header, bytes::Bytes::copy_from_slice(payload));
        self.writer.send(frame).await
    }

    /// Wait until the transport closes or the read loop fails.
    ///
    /// Returns `Ok(())` for a clean close (EOF between frames) and the
    /// read loop's error otherwise, [`LinkError::TruncatedFrame`] included.
    pub async fn wait_for_shutdown(self) -> Result<()> {
        match self.shutdown_rx.await {
            Ok(result) => result,
            Err(_) => Err(LinkError::ConnectionClosed),
        }
    }
}

/// Drain the transport, frame the bytes, fan out the frames.
async fn read_loop<R>(mut reader: R, channels: &HashMap<u8, Arc<ChannelState>>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut framer = Framer::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            if framer.is_mid_frame() {
                return Err(LinkError::TruncatedFrame {
                    buffered: framer.buffered(),
                });
            }
            return Ok(());
        }

        for frame in framer.push(&buf[..n]) {
            dispatch_frame(channels, frame);
        }
    }
}

/// Deliver one frame to its channel, or to all for the system category.
fn dispatch_frame(channels: &HashMap<u8, Arc<ChannelState>>, frame: Frame) {
    if frame.category() == SYSTEM_CATEGORY {
        for state in channels.values() {
            state.handle_frame(frame.clone());
        }
        return;
    }

    match channels.get(&frame.category()) {
        Some(state) => state.handle_frame(frame),
        None => tracing::debug!(
            category = frame.category(),
            operation = frame.operation(),
            "frame for unregistered category, dropping"
        ),
    }
}
