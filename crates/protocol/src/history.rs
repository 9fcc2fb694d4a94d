//! History entries and visibility states shared by host and embedded document.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An entry on the host's navigation stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
	pub label: String,
	#[serde(default)]
	pub data: Value,
	/// Entry was pushed on behalf of the embedded document.
	pub is_embedded_state: bool,
}

impl HistoryEntry {
	pub fn embedded(label: impl Into<String>, data: Value) -> Self {
		Self {
			label: label.into(),
			data,
			is_embedded_state: true,
		}
	}

	/// An entry owned by the host page itself.
	pub fn host(label: impl Into<String>) -> Self {
		Self {
			label: label.into(),
			data: Value::Null,
			is_embedded_state: false,
		}
	}
}

/// Visibility of the embedded surface. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
	#[serde(rename = "visible")]
	Shown,
	Hidden,
}

impl Visibility {
	/// The `visibilityState` string used on the wire.
	pub fn as_state(self) -> &'static str {
		match self {
			Visibility::Shown => "visible",
			Visibility::Hidden => "hidden",
		}
	}
}

/// Payload of the host's `visibilitychange` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityChange {
	pub state: Visibility,
}
