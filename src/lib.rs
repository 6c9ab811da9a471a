//! # bglink
//!
//! Client-side engine for a BGAPI-style binary command/response/event
//! protocol spoken over a byte-oriented duplex transport (typically a
//! serial link) to a remote peripheral controller.
//!
//! ## Architecture
//!
//! - **Framer** (`protocol`): incremental state machine turning an
//!   arbitrarily-chunked byte stream into discrete frames
//! - **LinkHub** (`hub`): owns the transport and the framer, fans decoded
//!   frames out to per-category channels, serializes outbound writes
//! - **Channel** (`channel`): per-category request/response correlation
//!   and event subscription for feature wrappers
//!
//! Transport setup (opening the serial port, baud configuration) and the
//! per-feature command catalogs live outside this crate; anything that is
//! `AsyncRead + AsyncWrite` attaches as a transport.
//!
//! ## Example
//!
//! ```ignore
//! use bglink::LinkHub;
//!
//! #[tokio::main]
//! async fn main() -> bglink::Result<()> {
//!     let port = open_serial_port(); // any AsyncRead + AsyncWrite stream
//!
//!     let hub = LinkHub::builder()
//!         .category(0x03) // connection management
//!         .category(0x05) // security manager
//!         .attach(port)?;
//!
//!     let connection = hub.channel(0x03).unwrap();
//!     let mut events = connection.subscribe();
//!
//!     let status = connection.request(0x01, &[0x00]).await?;
//!     while let Some(event) = events.recv().await {
//!         println!("event {:#04x}", event.operation());
//!     }
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod writer;

mod channel;
mod hub;

pub use channel::{Channel, EventStream};
pub use error::{LinkError, Result};
pub use hub::{LinkHub, LinkHubBuilder};
pub use protocol::{Frame, FrameKind, Header};
pub use transport::Transport;
