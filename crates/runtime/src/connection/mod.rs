//! Envelope correlation on top of a transport.
//!
//! This module implements the request/response layer of the channel. It handles:
//! - Handing inbound requests to an [`InboundHandler`] in arrival order
//! - Creating a [`ReplySlot`] for requests that set `rsvp`, whose completion
//!   writes the response envelope
//! - Correlating responses with requests the host sent via
//!   [`Connection::send_request`]
//!
//! # Message Flow
//!
//! 1. The transport receiver decodes a frame and queues it
//! 2. [`Connection::run`] parses it as an [`Envelope`]
//! 3. Requests go to the handler together with an optional reply slot
//! 4. Completing the slot queues a response envelope for the writer task
//! 5. Responses are matched by `requestid` to a pending oneshot callback

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use viewer_protocol::{Envelope, Message, MessageKind};

use crate::channel::OutboundChannel;
use crate::error::{Error, Result};
use crate::reply::ReplySlot;
use crate::transport::{Transport, TransportParts, TransportReceiver};

/// Receives requests from the embedded context.
///
/// Called on the connection's read loop, once per request and in arrival
/// order. Implementations must not block: anything slow belongs in a task
/// that owns the reply slot.
pub trait InboundHandler: Send + Sync {
	fn dispatch(&self, message: Message, reply: Option<ReplySlot>);
}

/// Pending host-originated requests keyed by request ID.
type CallbackMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

/// Work items for the writer task.
enum Outgoing {
	Frame(Value),
	Shutdown(oneshot::Sender<()>),
}

/// RAII guard removing the callback when a request future is dropped early.
struct CancelGuard {
	id: u64,
	callbacks: CallbackMap,
	completed: bool,
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if !self.completed && self.callbacks.lock().remove(&self.id).is_some() {
			tracing::debug!(id = self.id, "CancelGuard: removed orphaned callback");
		}
	}
}

/// Future returned by [`Connection::send_request`] with cancellation cleanup.
struct ResponseFuture {
	rx: oneshot::Receiver<Result<Value>>,
	guard: CancelGuard,
}

impl Future for ResponseFuture {
	type Output = Result<Value>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.completed = true;
				Poll::Ready(result.map_err(|_| Error::ChannelClosed).and_then(|r| r))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

/// Duplex channel to the embedded context.
pub struct Connection {
	/// Sequential ID counter for host-originated requests
	last_id: AtomicU64,
	callbacks: CallbackMap,
	outbound_tx: mpsc::UnboundedSender<Outgoing>,
	/// Transport halves and queues, taken once by run()
	transport_sender: Mutex<Option<Box<dyn Transport>>>,
	transport_receiver: Mutex<Option<Box<dyn TransportReceiver>>>,
	message_rx: Mutex<Option<mpsc::UnboundedReceiver<Value>>>,
	outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<Outgoing>>>,
}

impl Connection {
	pub fn new(parts: TransportParts) -> Self {
		let TransportParts {
			sender,
			receiver,
			message_rx,
		} = parts;

		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

		Self {
			last_id: AtomicU64::new(0),
			callbacks: Arc::new(Mutex::new(HashMap::new())),
			outbound_tx,
			transport_sender: Mutex::new(Some(sender)),
			transport_receiver: Mutex::new(Some(receiver)),
			message_rx: Mutex::new(Some(message_rx)),
			outbound_rx: Mutex::new(Some(outbound_rx)),
		}
	}

	fn queue(&self, envelope: &Envelope) -> Result<()> {
		let value = serde_json::to_value(envelope)?;
		self.outbound_tx
			.send(Outgoing::Frame(value))
			.map_err(|_| Error::ChannelClosed)
	}

	/// Sends a request to the embedded context and awaits its response.
	pub async fn send_request(&self, name: &str, data: Value) -> Result<Value> {
		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		tracing::debug!(id, name, "Sending request");

		let (tx, rx) = oneshot::channel();
		self.callbacks.lock().insert(id, tx);
		let guard = CancelGuard {
			id,
			callbacks: Arc::clone(&self.callbacks),
			completed: false,
		};

		self.queue(&Envelope::request(id, name, data, true))?;
		ResponseFuture { rx, guard }.await
	}

	/// Runs the read loop until the transport reaches EOF.
	///
	/// Requests are handed to `handler` in arrival order. When the loop ends,
	/// requests still awaiting a response fail with [`Error::ChannelClosed`].
	/// Frames queued afterwards keep flowing until [`shutdown`](Self::shutdown).
	pub async fn run(self: &Arc<Self>, handler: Arc<dyn InboundHandler>) -> Result<()> {
		let (receiver, mut sender, mut outbound_rx, mut message_rx) = {
			let taken = (
				self.transport_receiver.lock().take(),
				self.transport_sender.lock().take(),
				self.outbound_rx.lock().take(),
				self.message_rx.lock().take(),
			);
			match taken {
				(Some(receiver), Some(sender), Some(outbound_rx), Some(message_rx)) => {
					(receiver, sender, outbound_rx, message_rx)
				}
				_ => {
					return Err(Error::ProtocolError(
						"run() can only be called once".to_string(),
					));
				}
			}
		};

		let reader_handle = tokio::spawn(async move {
			if let Err(e) = receiver.run().await {
				tracing::error!("Transport read error: {}", e);
			}
		});

		tokio::spawn(async move {
			while let Some(outgoing) = outbound_rx.recv().await {
				match outgoing {
					Outgoing::Frame(frame) => {
						if let Err(e) = sender.send(frame).await {
							tracing::error!("Transport write error: {}", e);
							break;
						}
					}
					Outgoing::Shutdown(done) => {
						let _ = done.send(());
						break;
					}
				}
			}
		});

		while let Some(value) = message_rx.recv().await {
			match serde_json::from_value::<Envelope>(value) {
				Ok(envelope) => {
					if let Err(e) = self.dispatch_internal(envelope, handler.as_ref()) {
						tracing::error!("Error dispatching envelope: {}", e);
					}
				}
				Err(e) => {
					tracing::error!("Failed to parse envelope: {}", e);
				}
			}
		}

		for (_, callback) in self.callbacks.lock().drain() {
			let _ = callback.send(Err(Error::ChannelClosed));
		}
		let _ = reader_handle.await;
		Ok(())
	}

	/// Writes every frame queued so far, then stops the writer task.
	pub async fn shutdown(&self) {
		let (tx, rx) = oneshot::channel();
		if self.outbound_tx.send(Outgoing::Shutdown(tx)).is_ok() {
			let _ = rx.await;
		}
	}

	/// Dispatch an incoming envelope (test-only public version)
	#[cfg(test)]
	pub fn dispatch(&self, envelope: Envelope, handler: &dyn InboundHandler) -> Result<()> {
		self.dispatch_internal(envelope, handler)
	}

	fn dispatch_internal(&self, envelope: Envelope, handler: &dyn InboundHandler) -> Result<()> {
		if !envelope.is_viewer_frame() {
			tracing::debug!(app = %envelope.app, "Ignoring frame for another app");
			return Ok(());
		}

		match envelope.kind {
			MessageKind::Request => {
				tracing::debug!(
					id = envelope.request_id,
					name = %envelope.name,
					rsvp = envelope.rsvp,
					"Dispatching request"
				);
				let reply = envelope
					.rsvp
					.then(|| self.reply_slot(envelope.request_id, envelope.name.clone()));
				handler.dispatch(envelope.into_message(), reply);
				Ok(())
			}
			MessageKind::Response => {
				let callback = self
					.callbacks
					.lock()
					.remove(&envelope.request_id)
					.ok_or_else(|| {
						Error::ProtocolError(format!(
							"Cannot find request to respond: id={}",
							envelope.request_id
						))
					})?;

				let result = match envelope.error {
					Some(message) => Err(Error::Remote(message)),
					None => Ok(envelope.data),
				};
				let _ = callback.send(result);
				Ok(())
			}
		}
	}

	/// Reply slot whose completion queues the response envelope.
	fn reply_slot(&self, request_id: u64, name: String) -> ReplySlot {
		let outbound_tx = self.outbound_tx.clone();
		ReplySlot::new(request_id, move |result| {
			let envelope = Envelope::response(request_id, name, result.map_err(|e| e.to_string()));
			match serde_json::to_value(&envelope) {
				Ok(frame) => {
					if outbound_tx.send(Outgoing::Frame(frame)).is_err() {
						tracing::debug!(request_id, "Reply dropped: writer stopped");
					}
				}
				Err(e) => tracing::error!(request_id, "Failed to encode reply: {}", e),
			}
		})
	}
}

impl OutboundChannel for Connection {
	fn post(&self, name: &str, data: Value) -> Result<()> {
		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		self.queue(&Envelope::request(id, name, data, false))
	}
}

#[cfg(test)]
mod tests;
