//! Exactly-once reply slots for messages that set `rsvp`.
//!
//! A [`ReplySlot`] is consumed by [`resolve`](ReplySlot::resolve),
//! [`reject`](ReplySlot::reject) or [`complete`](ReplySlot::complete), so a
//! reply can never be sent twice. A slot dropped without being completed
//! rejects with [`Error::DetachedChannelUse`], so a reply is never lost
//! silently either: the work that owned it was cancelled or torn down.

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

type Completer = Box<dyn FnOnce(Result<Value>) + Send>;

/// Pending reply to one inbound request.
pub struct ReplySlot {
	request_id: u64,
	completer: Option<Completer>,
}

impl ReplySlot {
	/// Creates a slot that hands its outcome to `completer`.
	pub fn new<F>(request_id: u64, completer: F) -> Self
	where
		F: FnOnce(Result<Value>) + Send + 'static,
	{
		Self {
			request_id,
			completer: Some(Box::new(completer)),
		}
	}

	/// Creates a slot whose outcome is delivered to the returned receiver.
	pub fn channel(request_id: u64) -> (Self, oneshot::Receiver<Result<Value>>) {
		let (tx, rx) = oneshot::channel();
		let slot = Self::new(request_id, move |result| {
			let _ = tx.send(result);
		});
		(slot, rx)
	}

	pub fn request_id(&self) -> u64 {
		self.request_id
	}

	pub fn resolve(self, value: Value) {
		self.complete(Ok(value));
	}

	pub fn reject(self, error: Error) {
		self.complete(Err(error));
	}

	pub fn complete(mut self, result: Result<Value>) {
		if let Some(completer) = self.completer.take() {
			completer(result);
		}
	}
}

impl Drop for ReplySlot {
	fn drop(&mut self) {
		if let Some(completer) = self.completer.take() {
			tracing::debug!(
				request_id = self.request_id,
				"Reply slot dropped before completion"
			);
			completer(Err(Error::DetachedChannelUse));
		}
	}
}

impl std::fmt::Debug for ReplySlot {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ReplySlot")
			.field("request_id", &self.request_id)
			.field("pending", &self.completer.is_some())
			.finish()
	}
}
