//! Error types for the viewer runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by dispatch, relaying, and the channel.
///
/// Every error produced for a message that set `rsvp` reaches the sender as a
/// rejected reply carrying this error's `Display` text.
#[derive(Debug, Error)]
pub enum Error {
	/// No handler is registered for the message name.
	#[error("{0} Message is not supported!")]
	UnsupportedMessage(String),

	/// Transport-level failure while relaying a request. Never retried.
	#[error("Relay request to {url} failed: {message}")]
	RelayNetworkFailure { url: String, message: String },

	/// A request descriptor is missing fields or carries invalid values.
	#[error("Malformed request descriptor: {0}")]
	MalformedDescriptor(String),

	/// A message arrived, or a task finished, after the session was detached.
	#[error("Viewer session is detached")]
	DetachedChannelUse,

	/// `attach` was called while the session was attaching or attached.
	#[error("Viewer session is already attached")]
	AlreadyAttached,

	/// The embedding address could not be resolved.
	#[error("Failed to resolve embedding address: {0}")]
	AddressResolution(String),

	/// The embedded surface could not be mounted.
	#[error("Surface error: {0}")]
	Surface(String),

	/// Invalid or unreadable configuration.
	#[error("Configuration error: {0}")]
	Config(String),

	/// Channel closed unexpectedly.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	/// Transport-level error (line framing, stdio).
	#[error("Transport error: {0}")]
	TransportError(String),

	/// Protocol-level error (envelope correlation).
	#[error("Protocol error: {0}")]
	ProtocolError(String),

	/// The peer rejected a request sent by the host.
	#[error("{0}")]
	Remote(String),

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true if no handler was registered for the message.
	pub fn is_unsupported(&self) -> bool {
		matches!(self, Error::UnsupportedMessage(_))
	}

	/// Returns true if the error stems from using a detached session.
	pub fn is_detached(&self) -> bool {
		matches!(self, Error::DetachedChannelUse)
	}

	/// Returns true if the relay failed at the network level.
	pub fn is_network_failure(&self) -> bool {
		matches!(self, Error::RelayNetworkFailure { .. })
	}
}
