//! Channel envelopes and the messages they carry.
//!
//! Every frame on the channel is an [`Envelope`]. Requests (`type: "q"`) carry a
//! named [`Message`]; responses (`type: "s"`) answer a request that set `rsvp`,
//! echoing its `requestid` and carrying either `data` or an `error` string.
//!
//! ```text
//! {"app":"__AMPHTML__","requestid":7,"type":"q","name":"xhr","data":{..},"rsvp":true}
//! {"app":"__AMPHTML__","requestid":7,"type":"s","name":"xhr","data":{..}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Application tag carried by every envelope. Frames with another tag are ignored.
pub const APP_ID: &str = "__AMPHTML__";

/// Whether an envelope is a request or a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
	#[serde(rename = "q")]
	Request,
	#[serde(rename = "s")]
	Response,
}

/// A single frame on the duplex channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
	pub app: String,
	#[serde(rename = "requestid")]
	pub request_id: u64,
	#[serde(rename = "type")]
	pub kind: MessageKind,
	pub name: String,
	#[serde(default, skip_serializing_if = "Value::is_null")]
	pub data: Value,
	#[serde(default)]
	pub rsvp: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl Envelope {
	pub fn request(request_id: u64, name: impl Into<String>, data: Value, rsvp: bool) -> Self {
		Self {
			app: APP_ID.to_string(),
			request_id,
			kind: MessageKind::Request,
			name: name.into(),
			data,
			rsvp,
			error: None,
		}
	}

	/// Builds the response to request `request_id`. `Err` carries the rejection text.
	pub fn response(
		request_id: u64,
		name: impl Into<String>,
		result: std::result::Result<Value, String>,
	) -> Self {
		let (data, error) = match result {
			Ok(data) => (data, None),
			Err(message) => (Value::Null, Some(message)),
		};
		Self {
			app: APP_ID.to_string(),
			request_id,
			kind: MessageKind::Response,
			name: name.into(),
			data,
			rsvp: false,
			error,
		}
	}

	pub fn is_viewer_frame(&self) -> bool {
		self.app == APP_ID
	}

	/// Splits a request envelope into its message.
	pub fn into_message(self) -> Message {
		Message {
			name: self.name,
			payload: self.data,
			rsvp: self.rsvp,
		}
	}
}

/// A named message received from the embedded context.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
	pub name: String,
	pub payload: Value,
	/// The sender awaits a reply.
	pub rsvp: bool,
}

impl Message {
	pub fn new(name: impl Into<String>, payload: Value, rsvp: bool) -> Self {
		Self {
			name: name.into(),
			payload,
			rsvp,
		}
	}
}
