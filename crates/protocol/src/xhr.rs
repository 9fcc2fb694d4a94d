//! Serialized network requests and responses relayed for the embedded context.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Header injected into every relayed response, naming the embedded context's origin.
pub const SOURCE_ORIGIN_HEADER: &str = "amp-access-control-allow-source-origin";

/// Content type prefix that switches the body to multipart reconstruction.
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

fn default_method() -> String {
	"GET".to_string()
}

/// A request issued by the embedded context, as it arrives on the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDescriptor {
	pub target_url: String,
	#[serde(default = "default_method")]
	pub method: String,
	/// Request headers in the order the sender declared them.
	#[serde(default)]
	pub headers: IndexMap<String, String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub body: Option<RequestBody>,
}

impl RequestDescriptor {
	pub fn new(target_url: impl Into<String>) -> Self {
		Self {
			target_url: target_url.into(),
			method: default_method(),
			headers: IndexMap::new(),
			body: None,
		}
	}

	/// Looks up a header by case-insensitive name.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	pub fn content_type(&self) -> Option<&str> {
		self.header("content-type")
	}

	/// Returns `true` if the declared content type is `multipart/form-data`.
	pub fn is_multipart(&self) -> bool {
		self.content_type().is_some_and(|value| {
			value
				.trim_start()
				.get(..MULTIPART_FORM_DATA.len())
				.is_some_and(|prefix| prefix.eq_ignore_ascii_case(MULTIPART_FORM_DATA))
		})
	}
}

/// Request body: raw text, or form fields to be rebuilt as a multipart form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestBody {
	Text(String),
	Fields(IndexMap<String, FieldValue>),
}

/// One or more values submitted under a single form field name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
	One(FieldScalar),
	Many(Vec<FieldScalar>),
}

impl FieldValue {
	pub fn values(&self) -> impl Iterator<Item = &FieldScalar> {
		let values: &[FieldScalar] = match self {
			FieldValue::One(value) => std::slice::from_ref(value),
			FieldValue::Many(values) => values,
		};
		values.iter()
	}
}

impl From<&str> for FieldValue {
	fn from(value: &str) -> Self {
		FieldValue::One(value.into())
	}
}

/// A single form value. Numbers and booleans are sent as their JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldScalar {
	Text(String),
	Number(serde_json::Number),
	Bool(bool),
}

impl FieldScalar {
	/// The text submitted for this value.
	pub fn to_text(&self) -> String {
		match self {
			FieldScalar::Text(text) => text.clone(),
			FieldScalar::Number(number) => number.to_string(),
			FieldScalar::Bool(flag) => flag.to_string(),
		}
	}
}

impl From<&str> for FieldScalar {
	fn from(value: &str) -> Self {
		FieldScalar::Text(value.to_string())
	}
}

/// A relayed response, serialized for delivery back to the embedded context.
///
/// Repeated header names are represented as a single `", "`-joined value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDescriptor {
	pub body: String,
	pub status: u16,
	pub status_text: String,
	pub headers: IndexMap<String, String>,
}

impl ResponseDescriptor {
	/// Looks up a header by case-insensitive name.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}
}
