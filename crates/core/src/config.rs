//! Session configuration, loaded from a camelCase JSON file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;
use viewer_protocol::{Capability, InitParams, Visibility};
use viewer_runtime::{Error, Result};

fn default_capabilities() -> Vec<Capability> {
	vec![Capability::XhrInterceptor]
}

/// Settings for one viewer session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerConfig {
	/// The embedded document.
	pub document_url: Url,
	/// The host's own origin, advertised to the document.
	#[serde(default)]
	pub origin: String,
	#[serde(default = "default_capabilities")]
	pub capabilities: Vec<Capability>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub referrer: Option<String>,
	#[serde(default)]
	pub prerender: bool,
	#[serde(default)]
	pub relay: RelayConfig,
}

impl ViewerConfig {
	pub fn new(document_url: Url) -> Self {
		Self {
			document_url,
			origin: String::new(),
			capabilities: default_capabilities(),
			referrer: None,
			prerender: false,
			relay: RelayConfig::default(),
		}
	}

	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)?;
		serde_json::from_str(&content)
			.map_err(|e| Error::Config(format!("{}: {e}", path.display())))
	}

	pub fn init_params(&self) -> InitParams {
		InitParams {
			origin: self.origin.clone(),
			capabilities: self.capabilities.clone(),
			referrer: self.referrer.clone(),
			prerender: self.prerender,
		}
	}

	/// `address` with the init parameters in its fragment.
	pub fn embed_url(&self, address: &Url) -> Url {
		self.init_params().apply_to(address)
	}

	/// Prerendered documents start hidden.
	pub fn initial_visibility(&self) -> Visibility {
		if self.prerender {
			Visibility::Hidden
		} else {
			Visibility::Shown
		}
	}
}

/// HTTP client settings for the relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timeout_ms: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_agent: Option<String>,
}

impl RelayConfig {
	pub fn timeout(&self) -> Option<Duration> {
		self.timeout_ms.map(Duration::from_millis)
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;

	#[test]
	fn load_fills_defaults() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, r#"{{"documentUrl": "https://cdn.example/doc.html"}}"#).unwrap();

		let config = ViewerConfig::load(file.path()).unwrap();
		assert_eq!(config.document_url.as_str(), "https://cdn.example/doc.html");
		assert_eq!(config.capabilities, vec![Capability::XhrInterceptor]);
		assert!(!config.prerender);
		assert_eq!(config.relay, RelayConfig::default());
		assert_eq!(config.initial_visibility(), Visibility::Shown);
	}

	#[test]
	fn load_reads_relay_settings() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"{{
				"documentUrl": "https://cdn.example/doc.html",
				"origin": "https://host.example",
				"capabilities": ["xhrInterceptor", "handshakepoll"],
				"prerender": true,
				"relay": {{"timeoutMs": 2500, "userAgent": "viewer-host"}}
			}}"#
		)
		.unwrap();

		let config = ViewerConfig::load(file.path()).unwrap();
		assert_eq!(config.relay.timeout(), Some(Duration::from_millis(2500)));
		assert_eq!(config.relay.user_agent.as_deref(), Some("viewer-host"));
		assert_eq!(config.initial_visibility(), Visibility::Hidden);
		assert_eq!(config.init_params().capabilities.len(), 2);

		let embed = config.embed_url(&config.document_url);
		assert!(embed.fragment().unwrap().contains("visibilityState=prerender"));
	}

	#[test]
	fn invalid_file_is_a_config_error() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, r#"{{"documentUrl": "not a url"}}"#).unwrap();

		let err = ViewerConfig::load(file.path()).unwrap_err();
		assert!(matches!(err, Error::Config(_)));
	}

	#[test]
	fn missing_file_is_an_io_error() {
		let dir = tempfile::tempdir().unwrap();
		let err = ViewerConfig::load(&dir.path().join("absent.json")).unwrap_err();
		assert!(matches!(err, Error::Io(_)));
	}
}
