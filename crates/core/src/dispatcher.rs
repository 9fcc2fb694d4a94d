//! Routes inbound messages to handlers by name.
//!
//! The dispatcher is a registration table built once per session. A handler's
//! synchronous side effects run inside [`MessageHandler::handle`], at dispatch
//! time, so they happen in arrival order; only the returned future (the reply)
//! completes later, in any order.

use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use viewer_protocol::{Message, RequestDescriptor, names};
use viewer_runtime::{Error, ReplySlot, Result};

use crate::history::HistorySync;
use crate::relay::XhrRelay;

/// Deferred outcome of a handled message.
pub type HandlerFuture = BoxFuture<'static, Result<Value>>;

/// Handles one message name.
pub trait MessageHandler: Send + Sync {
	fn handle(&self, payload: Value) -> HandlerFuture;
}

impl<F> MessageHandler for F
where
	F: Fn(Value) -> HandlerFuture + Send + Sync,
{
	fn handle(&self, payload: Value) -> HandlerFuture {
		self(payload)
	}
}

/// An already-resolved `null` reply.
pub fn acknowledge() -> HandlerFuture {
	settled(Ok(Value::Null))
}

pub fn settled(result: Result<Value>) -> HandlerFuture {
	future::ready(result).boxed()
}

/// Name → handler table.
#[derive(Clone, Default)]
pub struct MessageDispatcher {
	table: IndexMap<String, Arc<dyn MessageHandler>>,
}

impl MessageDispatcher {
	pub fn builder() -> DispatcherBuilder {
		DispatcherBuilder::default()
	}

	/// The table every session uses: history, relay, and the acknowledged
	/// lifecycle notifications.
	pub fn standard(history: Arc<HistorySync>, relay: Arc<XhrRelay>) -> Self {
		let push = Arc::clone(&history);
		let pop = history;
		Self::builder()
			.register(names::PUSH_HISTORY, move |payload: Value| {
				match PushHistory::from_payload(payload) {
					Ok(PushHistory { url, data }) => {
						let label = url.unwrap_or_else(|| push.document_label().to_string());
						push.push_state(label, data);
						acknowledge()
					}
					Err(e) => settled(Err(e)),
				}
			})
			.register(names::POP_HISTORY, move |_payload: Value| {
				pop.pop();
				acknowledge()
			})
			.register(names::XHR, move |payload: Value| -> HandlerFuture {
				let descriptor: RequestDescriptor = match serde_json::from_value(payload) {
					Ok(descriptor) => descriptor,
					Err(e) => return settled(Err(Error::MalformedDescriptor(e.to_string()))),
				};
				let relay = Arc::clone(&relay);
				async move {
					let response = relay.handle(descriptor).await?;
					Ok::<Value, Error>(serde_json::to_value(response)?)
				}
				.boxed()
			})
			.register_placeholders()
			.build()
	}

	/// Runs the handler registered for `message.name`.
	pub fn dispatch(&self, message: Message) -> HandlerFuture {
		match self.table.get(&message.name) {
			Some(handler) => {
				tracing::debug!(name = %message.name, rsvp = message.rsvp, "Dispatching message");
				handler.handle(message.payload)
			}
			None => {
				tracing::debug!(name = %message.name, "No handler registered");
				settled(Err(Error::UnsupportedMessage(message.name)))
			}
		}
	}

	/// Dispatches `message` now and returns a future that completes `reply`
	/// with the outcome.
	///
	/// Without a reply slot the outcome is only logged.
	pub fn dispatch_with_reply(
		&self,
		message: Message,
		reply: Option<ReplySlot>,
	) -> impl Future<Output = ()> + Send + use<> {
		let name = message.name.clone();
		let outcome = self.dispatch(message);
		async move {
			let result = outcome.await;
			match reply {
				Some(reply) => reply.complete(result),
				None => {
					if let Err(e) = result {
						tracing::debug!(name = %name, error = %e, "Unacknowledged message failed");
					}
				}
			}
		}
	}

	pub fn is_registered(&self, name: &str) -> bool {
		self.table.contains_key(name)
	}

	/// Registered names, in registration order.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.table.keys().map(String::as_str)
	}
}

impl std::fmt::Debug for MessageDispatcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MessageDispatcher")
			.field("names", &self.table.keys().collect::<Vec<_>>())
			.finish()
	}
}

#[derive(Default)]
pub struct DispatcherBuilder {
	table: IndexMap<String, Arc<dyn MessageHandler>>,
}

impl DispatcherBuilder {
	/// Registers `handler` for `name`, replacing any earlier registration.
	pub fn register<H>(mut self, name: impl Into<String>, handler: H) -> Self
	where
		H: MessageHandler + 'static,
	{
		self.table.insert(name.into(), Arc::new(handler));
		self
	}

	/// Acknowledges the lifecycle notifications that need no host action.
	pub fn register_placeholders(mut self) -> Self {
		for name in names::PLACEHOLDERS {
			self = self.register(name, |_payload: Value| acknowledge());
		}
		self
	}

	pub fn build(self) -> MessageDispatcher {
		MessageDispatcher { table: self.table }
	}
}

#[derive(Debug, Default, Deserialize)]
struct PushHistory {
	#[serde(default)]
	url: Option<String>,
	#[serde(default)]
	data: Value,
}

impl PushHistory {
	fn from_payload(payload: Value) -> Result<Self> {
		if payload.is_null() {
			return Ok(Self::default());
		}
		Ok(serde_json::from_value(payload)?)
	}
}
