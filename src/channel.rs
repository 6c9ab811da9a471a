//! Per-category channel: request/response correlation and event fan-out.
//!
//! A [`Channel`] is one functional category's half of the protocol. Feature
//! wrappers use it to fire commands, await responses, and subscribe to
//! unsolicited events; the hub feeds it every inbound frame matching its
//! category.
//!
//! Correlation rules:
//! - An event frame is delivered to the subscribers present at dispatch
//!   time, in arrival order. Late subscribers see only later events.
//! - A response frame resolves the oldest live pending request for its
//!   operation. Concurrent requests for the same operation queue up FIFO,
//!   so the first response resolves the first caller. Abandoned waiters
//!   (dropped futures) are skipped and discarded.
//! - A response with no pending request is dropped silently; that is a
//!   normal race (request abandoned or duplicate response), not an error.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::error::{LinkError, Result};
use crate::protocol::{Frame, FrameKind, Header, MAX_PAYLOAD_LEN};
use crate::writer::{OutboundFrame, WriterHandle};

/// One caller suspended on a response.
struct PendingRequest {
    /// Tag used to retract this entry if the command write fails.
    id: u64,
    /// Single-resolution completion handle.
    tx: oneshot::Sender<Result<Bytes>>,
}

/// Correlator bookkeeping, guarded by one lock per channel.
///
/// The lock is only held for map updates, never across an await.
struct Correlator {
    /// FIFO of waiters per operation id.
    by_operation: HashMap<u8, VecDeque<PendingRequest>>,
    /// Set once the transport is gone; rejects new registrations.
    closed: bool,
}

/// Shared state behind every clone of a [`Channel`].
pub(crate) struct ChannelState {
    category: u8,
    pending: Mutex<Correlator>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Frame>>>,
    next_request_id: AtomicU64,
}

impl ChannelState {
    pub(crate) fn new(category: u8) -> Self {
        Self {
            category,
            pending: Mutex::new(Correlator {
                by_operation: HashMap::new(),
                closed: false,
            }),
            subscribers: Mutex::new(Vec::new()),
            next_request_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn category(&self) -> u8 {
        self.category
    }

    /// Route one inbound frame: broadcast events, resolve responses.
    pub(crate) fn handle_frame(&self, frame: Frame) {
        match frame.kind() {
            FrameKind::Event => self.deliver_event(frame),
            FrameKind::CommandResponse => self.resolve_response(frame),
        }
    }

    fn deliver_event(&self, frame: Frame) {
        let mut subscribers = self.subscribers.lock().unwrap();
        // Prune subscribers whose stream has been dropped.
        subscribers.retain(|tx| tx.send(frame.clone()).is_ok());
    }

    fn resolve_response(&self, frame: Frame) {
        let operation = frame.operation();
        let mut pending = self.pending.lock().unwrap();

        let Some(queue) = pending.by_operation.get_mut(&operation) else {
            tracing::debug!(
                category = self.category,
                operation,
                "response with no pending request, dropping"
            );
            return;
        };

        let payload = frame.payload_bytes();
        // Skip waiters that gave up before the response arrived.
        while let Some(entry) = queue.pop_front() {
            if entry.tx.send(Ok(payload.clone())).is_ok() {
                break;
            }
        }
        if queue.is_empty() {
            pending.by_operation.remove(&operation);
        }
    }

    /// Register a waiter for `operation`, returning its retraction tag.
    fn register(&self, operation: u8, tx: oneshot::Sender<Result<Bytes>>) -> Result<u64> {
        let mut pending = self.pending.lock().unwrap();
        if pending.closed {
            return Err(LinkError::ConnectionClosed);
        }
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        pending
            .by_operation
            .entry(operation)
            .or_default()
            .push_back(PendingRequest { id, tx });
        Ok(id)
    }

    /// Remove a registered waiter whose command never made it to the wire.
    fn retract(&self, operation: u8, id: u64) {
        let mut pending = self.pending.lock().unwrap();
        if let Some(queue) = pending.by_operation.get_mut(&operation) {
            queue.retain(|entry| entry.id != id);
            if queue.is_empty() {
                pending.by_operation.remove(&operation);
            }
        }
    }

    /// Fail every pending request and terminate all event subscriptions.
    ///
    /// Called by the hub when the transport closes or the read loop fails.
    pub(crate) fn fail_all(&self) {
        let drained: Vec<PendingRequest> = {
            let mut pending = self.pending.lock().unwrap();
            pending.closed = true;
            pending
                .by_operation
                .drain()
                .flat_map(|(_, queue)| queue)
                .collect()
        };
        for entry in drained {
            let _ = entry.tx.send(Err(LinkError::ConnectionClosed));
        }
        // Dropping the senders ends every subscriber's stream.
        self.subscribers.lock().unwrap().clear();
    }

    fn add_subscriber(&self) -> mpsc::UnboundedReceiver<Frame> {
        let (tx, rx) = mpsc::unbounded_channel();
        // Transport already gone: drop the sender so the stream ends
        // immediately instead of suspending forever.
        if self.pending.lock().unwrap().closed {
            return rx;
        }
        self.subscribers.lock().unwrap().push(tx);
        rx
    }
}

/// Per-category façade over the shared transport.
///
/// Cheap to clone; all clones share one correlator and subscriber set.
#[derive(Clone)]
pub struct Channel {
    state: Arc<ChannelState>,
    writer: WriterHandle,
    technology: u8,
}

impl Channel {
    pub(crate) fn new(state: Arc<ChannelState>, writer: WriterHandle, technology: u8) -> Self {
        Self {
            state,
            writer,
            technology,
        }
    }

    /// The category this channel represents.
    pub fn category(&self) -> u8 {
        self.state.category()
    }

    /// Send a fire-and-forget command.
    ///
    /// Fails only if the payload is oversized or the write fails.
    pub async fn send_command(&self, operation: u8, payload: &[u8]) -> Result<()> {
        let frame = self.encode_command(operation, payload)?;
        self.writer.send(frame).await
    }

    /// Send a command and await the matching response's payload.
    ///
    /// Suspends the caller until the first response frame with this
    /// channel's category and `operation` arrives; the reader task keeps
    /// running meanwhile. The payload is delivered unaltered, so a
    /// feature-level error code at the front is recoverable by the caller.
    ///
    /// There is no built-in timeout: compose with `tokio::time::timeout`
    /// where the peer may go silent. Dropping the returned future abandons
    /// the wait; a late response then skips this caller.
    pub async fn request(&self, operation: u8, payload: &[u8]) -> Result<Bytes> {
        let frame = self.encode_command(operation, payload)?;

        // Register before writing so a fast response cannot slip past.
        let (tx, rx) = oneshot::channel();
        let id = self.state.register(operation, tx)?;

        if let Err(err) = self.writer.send(frame).await {
            self.state.retract(operation, id);
            return Err(err);
        }

        match rx.await {
            Ok(result) => result,
            // Correlator dropped the sender without resolving; the
            // transport is gone.
            Err(_) => Err(LinkError::ConnectionClosed),
        }
    }

    /// Subscribe to unsolicited events for this category.
    ///
    /// Each event frame is delivered to the subscribers present when it is
    /// dispatched, in arrival order; there is no replay for late
    /// subscribers. Dropping the stream unsubscribes.
    pub fn subscribe(&self) -> EventStream {
        EventStream {
            rx: self.state.add_subscriber(),
        }
    }

    fn encode_command(&self, operation: u8, payload: &[u8]) -> Result<OutboundFrame> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(LinkError::PayloadTooLarge { len: payload.len() });
        }
        let header = Header::new(
            FrameKind::CommandResponse,
            self.technology,
            payload.len() as u16,
            self.state.category(),
            operation,
        );
        Ok(OutboundFrame::new(&header, Bytes::copy_from_slice(payload)))
    }
}

/// Stream of unsolicited event frames for one subscription.
///
/// Yields `None` once the hub shuts down or the transport closes - the
/// terminal signal for subscribers.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Frame>,
}

impl EventStream {
    /// Receive the next event frame.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Receive without waiting; `None` if no event is queued right now.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }
}
