//! Viewer Runtime - reply slots, transport, and connection
//!
//! This crate provides the channel plumbing between a host and the document
//! it embeds:
//!
//! - **Errors**: The error taxonomy every reply rejection is drawn from
//! - **Reply slots**: Exactly-once completion for messages that set `rsvp`
//! - **Transport**: Newline-delimited JSON over any async byte stream
//! - **Connection**: Envelope correlation and in-order request hand-off
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  viewer-rs  │  Dispatcher, relay, history, session
//! └──────┬──────┘
//!        │ implements InboundHandler
//! ┌──────▼──────┐
//! │   runtime   │  This crate
//! │  ┌────────┐ │
//! │  │ Conn   │ │  requestid correlation
//! │  └────────┘ │
//! │  ┌────────┐ │
//! │  │ Trans  │ │  NDJSON framing
//! │  └────────┘ │
//! └─────────────┘
//! ```

pub mod channel;
pub mod connection;
pub mod error;
pub mod reply;
pub mod transport;

pub use channel::{OutboundChannel, post_typed};
pub use connection::{Connection, InboundHandler};
pub use error::{Error, Result};
pub use reply::ReplySlot;
pub use transport::{
	LineTransport, LineTransportReceiver, LineTransportSender, Transport, TransportParts,
	TransportReceiver,
};
