//! Outbound half of the channel to the embedded context.

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Posts host-originated messages to the embedded context.
///
/// Implemented by [`Connection`](crate::Connection); sessions hold it as a
/// trait object so tests and other hosts can substitute their own channel.
pub trait OutboundChannel: Send + Sync {
	/// Posts a message without awaiting a reply.
	fn post(&self, name: &str, data: Value) -> Result<()>;
}

/// Serializes `data` and posts it on `channel`.
pub fn post_typed<T: Serialize>(channel: &dyn OutboundChannel, name: &str, data: &T) -> Result<()> {
	let value = serde_json::to_value(data)?;
	channel.post(name, value)
}
