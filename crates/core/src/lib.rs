//! viewer: host-side broker for an embedded document
//!
//! A host embeds a sandboxed document and talks to it over a message channel.
//! This crate provides everything on the host's side of that channel:
//!
//! - **Dispatcher**: maps each named message to a handler and replies once
//! - **Relay**: runs network requests the document cannot make itself
//! - **History sync**: keeps host back/forward navigation and the surface's
//!   visibility in step
//! - **Session**: attaches and detaches the document, owning all of the above
//!
//! # Examples
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use viewer::{Connection, LineTransport, ViewerConfig, ViewerSession};
//!
//! #[tokio::main]
//! async fn main() -> viewer::Result<()> {
//!     let config = ViewerConfig::new("https://cdn.example/doc.html".parse().unwrap());
//!     let session = Arc::new(ViewerSession::builder(config).build()?);
//!
//!     let connection = Arc::new(Connection::new(LineTransport::stdio()));
//!     let embed_url = session.attach(connection.clone()).await?;
//!     eprintln!("serving {embed_url}");
//!
//!     connection.run(session.clone()).await?;
//!     session.unattach();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatcher;
pub mod handlers;
pub mod history;
pub mod relay;
pub mod session;
pub mod surface;
pub mod visibility;

pub use config::{RelayConfig, ViewerConfig};
pub use dispatcher::{DispatcherBuilder, HandlerFuture, MessageDispatcher, MessageHandler};
pub use handlers::Subscription;
pub use history::{HistoryStack, HistorySync, NavigationStack, PopEvent};
pub use relay::{SourceOrigin, XhrRelay};
pub use session::{SessionBuilder, SessionState, SessionVisibility, TaskId, TaskSet, ViewerSession};
pub use surface::{AddressResolver, DirectAddress, HeadlessSurface, ResolveFuture, Surface};
pub use viewer_protocol as protocol;
pub use viewer_protocol::{Message, RequestDescriptor, ResponseDescriptor, Visibility};
pub use viewer_runtime::{
	Connection, Error, InboundHandler, LineTransport, OutboundChannel, ReplySlot, Result,
};
pub use visibility::{VisibilityCapability, VisibilityState};
