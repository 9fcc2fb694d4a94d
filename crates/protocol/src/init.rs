//! Initialization parameters carried to the embedded document.
//!
//! The host advertises its origin and capabilities in the fragment of the
//! embedding address, e.g.
//! `https://cdn.example/doc.html#origin=https%3A%2F%2Fhost.example&cap=xhrInterceptor`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;
use url::form_urlencoded;

/// Optional host behavior advertised to the embedded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
	#[serde(rename = "xhrInterceptor")]
	XhrInterceptor,
	#[serde(rename = "handshakepoll")]
	HandshakePoll,
}

impl Capability {
	pub fn as_str(self) -> &'static str {
		match self {
			Capability::XhrInterceptor => "xhrInterceptor",
			Capability::HandshakePoll => "handshakepoll",
		}
	}
}

impl fmt::Display for Capability {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Capability {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"xhrInterceptor" => Ok(Capability::XhrInterceptor),
			"handshakepoll" => Ok(Capability::HandshakePoll),
			other => Err(format!("unknown capability: {other}")),
		}
	}
}

/// Parameters the embedded document reads at startup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InitParams {
	/// The host's own origin.
	pub origin: String,
	pub capabilities: Vec<Capability>,
	pub referrer: Option<String>,
	/// Load the document in prerender mode.
	pub prerender: bool,
}

impl InitParams {
	/// Serializes the parameters as an `application/x-www-form-urlencoded` fragment.
	pub fn to_fragment(&self) -> String {
		let mut serializer = form_urlencoded::Serializer::new(String::new());
		serializer.append_pair("origin", &self.origin);
		if !self.capabilities.is_empty() {
			let caps: Vec<&str> = self.capabilities.iter().map(|c| c.as_str()).collect();
			serializer.append_pair("cap", &caps.join(","));
		}
		if let Some(referrer) = &self.referrer {
			serializer.append_pair("referrer", referrer);
		}
		if self.prerender {
			serializer.append_pair("visibilityState", "prerender");
			serializer.append_pair("prerenderSize", "1");
		}
		serializer.finish()
	}

	/// Parses a fragment produced by [`to_fragment`](Self::to_fragment).
	///
	/// Unknown keys and capabilities are skipped.
	pub fn from_fragment(fragment: &str) -> Self {
		let mut params = InitParams::default();
		for (key, value) in form_urlencoded::parse(fragment.trim_start_matches('#').as_bytes()) {
			match key.as_ref() {
				"origin" => params.origin = value.into_owned(),
				"cap" => {
					params.capabilities = value
						.split(',')
						.filter_map(|cap| cap.parse().ok())
						.collect();
				}
				"referrer" => params.referrer = Some(value.into_owned()),
				"visibilityState" => params.prerender = value == "prerender",
				_ => {}
			}
		}
		params
	}

	/// Returns `address` with these parameters as its fragment.
	pub fn apply_to(&self, address: &Url) -> Url {
		let mut url = address.clone();
		url.set_fragment(Some(&self.to_fragment()));
		url
	}
}
