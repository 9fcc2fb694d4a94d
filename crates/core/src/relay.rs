//! Executes network requests on behalf of the embedded document.
//!
//! The document serializes each request into a [`RequestDescriptor`]; the relay
//! rebuilds it as a real HTTP request, runs it with [`reqwest`], and hands back
//! a [`ResponseDescriptor`]. Every successful relay carries the
//! [`SOURCE_ORIGIN_HEADER`] naming the document's origin, which is what lets
//! the document trust the response.
//!
//! Descriptors are validated before any I/O. Transport failures are reported
//! once and never retried.

use std::sync::Arc;

use hyper::ext::ReasonPhrase;
use indexmap::IndexMap;
use parking_lot::RwLock;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::Form;
use reqwest::{Client, Method, Request};
use url::Url;
use viewer_protocol::{RequestBody, RequestDescriptor, ResponseDescriptor, SOURCE_ORIGIN_HEADER};
use viewer_runtime::{Error, Result};

use crate::config::RelayConfig;

/// The embedded document's current address, shared between session and relay.
///
/// Set while a session is attached and cleared when it detaches.
#[derive(Debug, Clone, Default)]
pub struct SourceOrigin(Arc<RwLock<Option<Url>>>);

impl SourceOrigin {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set(&self, address: Url) {
		*self.0.write() = Some(address);
	}

	pub fn clear(&self) {
		self.0.write().take();
	}

	pub fn address(&self) -> Option<Url> {
		self.0.read().clone()
	}

	/// ASCII serialization of the address's origin, e.g. `https://cdn.example`.
	pub fn origin(&self) -> Option<String> {
		self.0
			.read()
			.as_ref()
			.map(|url| url.origin().ascii_serialization())
	}
}

/// Relays [`RequestDescriptor`]s over HTTP.
#[derive(Debug, Clone)]
pub struct XhrRelay {
	client: Client,
	source: SourceOrigin,
}

impl XhrRelay {
	pub fn new(client: Client, source: SourceOrigin) -> Self {
		Self { client, source }
	}

	/// Builds the HTTP client from `config`.
	pub fn from_config(config: &RelayConfig, source: SourceOrigin) -> Result<Self> {
		let mut builder = Client::builder();
		if let Some(timeout) = config.timeout() {
			builder = builder.timeout(timeout);
		}
		if let Some(user_agent) = &config.user_agent {
			builder = builder.user_agent(user_agent.as_str());
		}
		let client = builder
			.build()
			.map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;
		Ok(Self::new(client, source))
	}

	pub fn source(&self) -> &SourceOrigin {
		&self.source
	}

	/// Runs `descriptor` and serializes the response.
	///
	/// Non-2xx statuses are successful relays; only transport failures reject.
	/// `statusText` is the reason phrase the server sent, or the standard phrase
	/// for the code when the server sent that one.
	pub async fn handle(&self, descriptor: RequestDescriptor) -> Result<ResponseDescriptor> {
		let Some(address) = self.source.address() else {
			return Err(Error::DetachedChannelUse);
		};
		let request = build_request(&self.client, &address, &descriptor)?;
		let url = request.url().to_string();
		tracing::debug!(method = %request.method(), url = %url, "Relaying request");

		let response = self.client.execute(request).await.map_err(|e| {
			tracing::warn!(url = %url, error = %e, "Relay request failed");
			Error::RelayNetworkFailure {
				url: url.clone(),
				message: e.to_string(),
			}
		})?;

		let status = response.status();
		let status_text = reason_phrase(&response);
		let mut headers = serialize_headers(response.headers());
		// Lossy for binary bodies.
		let body = response.text().await.map_err(|e| {
			tracing::warn!(url = %url, error = %e, "Failed to read relayed body");
			Error::RelayNetworkFailure {
				url: url.clone(),
				message: e.to_string(),
			}
		})?;

		headers.insert(
			SOURCE_ORIGIN_HEADER.to_string(),
			address.origin().ascii_serialization(),
		);

		Ok(ResponseDescriptor {
			body,
			status: status.as_u16(),
			status_text,
			headers,
		})
	}
}

/// Rebuilds `descriptor` as a request, resolving relative targets against `base`.
pub fn build_request(client: &Client, base: &Url, descriptor: &RequestDescriptor) -> Result<Request> {
	let url = base.join(&descriptor.target_url).map_err(|e| {
		Error::MalformedDescriptor(format!("invalid target url {:?}: {e}", descriptor.target_url))
	})?;
	if !matches!(url.scheme(), "http" | "https") {
		return Err(Error::MalformedDescriptor(format!(
			"unsupported scheme {:?}",
			url.scheme()
		)));
	}

	let method = Method::from_bytes(descriptor.method.to_ascii_uppercase().as_bytes())
		.map_err(|_| Error::MalformedDescriptor(format!("invalid method {:?}", descriptor.method)))?;

	let multipart = descriptor.is_multipart();
	let mut headers = HeaderMap::new();
	for (name, value) in &descriptor.headers {
		let header_name = HeaderName::from_bytes(name.as_bytes())
			.map_err(|_| Error::MalformedDescriptor(format!("invalid header name {name:?}")))?;
		// The client writes its own content type, boundary included.
		if multipart && header_name == CONTENT_TYPE {
			continue;
		}
		let header_value = HeaderValue::from_str(value).map_err(|_| {
			Error::MalformedDescriptor(format!("invalid value for header {name:?}"))
		})?;
		headers.append(header_name, header_value);
	}

	let mut builder = client.request(method, url).headers(headers);
	match (&descriptor.body, multipart) {
		(None, _) => {}
		(Some(RequestBody::Fields(fields)), true) => {
			let mut form = Form::new();
			for (name, value) in fields {
				for value in value.values() {
					form = form.text(name.clone(), value.to_text());
				}
			}
			builder = builder.multipart(form);
		}
		(Some(RequestBody::Text(text)), false) => {
			builder = builder.body(text.clone());
		}
		(Some(RequestBody::Fields(_)), false) => {
			return Err(Error::MalformedDescriptor(
				"form fields require a multipart/form-data content type".into(),
			));
		}
		(Some(RequestBody::Text(_)), true) => {
			return Err(Error::MalformedDescriptor(
				"multipart/form-data requires a field mapping body".into(),
			));
		}
	}

	builder
		.build()
		.map_err(|e| Error::MalformedDescriptor(e.to_string()))
}

fn reason_phrase(response: &reqwest::Response) -> String {
	// hyper records the phrase only when it differs from the canonical one.
	match response.extensions().get::<ReasonPhrase>() {
		Some(reason) => String::from_utf8_lossy(reason.as_bytes()).into_owned(),
		None => response
			.status()
			.canonical_reason()
			.unwrap_or_default()
			.to_string(),
	}
}

/// Flattens `headers` to one entry per name, joining repeated values with `", "`.
pub fn serialize_headers(headers: &HeaderMap) -> IndexMap<String, String> {
	headers
		.keys()
		.map(|name| {
			let joined = headers
				.get_all(name)
				.iter()
				.map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
				.collect::<Vec<_>>()
				.join(", ");
			(name.as_str().to_string(), joined)
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn base() -> Url {
		Url::parse("https://cdn.example/c/s/news.example/article.html").unwrap()
	}

	#[test]
	fn relative_target_resolves_against_document() {
		let descriptor = RequestDescriptor::new("/api/comments?page=2");
		let request = build_request(&Client::new(), &base(), &descriptor).unwrap();
		assert_eq!(request.url().as_str(), "https://cdn.example/api/comments?page=2");
		assert_eq!(request.method(), Method::GET);
	}

	#[test]
	fn text_body_and_headers_pass_through() {
		let mut descriptor = RequestDescriptor::new("https://api.example/submit");
		descriptor.method = "post".into();
		descriptor
			.headers
			.insert("Content-Type".into(), "application/json".into());
		descriptor.headers.insert("X-Trace".into(), "abc".into());
		descriptor.body = Some(RequestBody::Text("{\"k\":1}".into()));

		let request = build_request(&Client::new(), &base(), &descriptor).unwrap();
		assert_eq!(request.method(), Method::POST);
		assert_eq!(request.headers()["content-type"], "application/json");
		assert_eq!(request.headers()["x-trace"], "abc");
		assert_eq!(request.body().unwrap().as_bytes().unwrap(), b"{\"k\":1}");
	}

	#[test]
	fn multipart_drops_declared_content_type() {
		let mut descriptor = RequestDescriptor::new("https://api.example/form");
		descriptor.method = "POST".into();
		descriptor
			.headers
			.insert("content-type".into(), "multipart/form-data".into());
		let mut fields = IndexMap::new();
		fields.insert("a".to_string(), viewer_protocol::FieldValue::from("1"));
		descriptor.body = Some(RequestBody::Fields(fields));

		let request = build_request(&Client::new(), &base(), &descriptor).unwrap();
		let content_type = request.headers()[CONTENT_TYPE].to_str().unwrap();
		assert!(content_type.starts_with("multipart/form-data; boundary="));
	}

	#[test]
	fn mismatched_bodies_are_malformed() {
		let mut fields_without_multipart = RequestDescriptor::new("/form");
		fields_without_multipart.body = Some(RequestBody::Fields(IndexMap::new()));
		let err = build_request(&Client::new(), &base(), &fields_without_multipart).unwrap_err();
		assert!(matches!(err, Error::MalformedDescriptor(_)));

		let mut text_with_multipart = RequestDescriptor::new("/form");
		text_with_multipart
			.headers
			.insert("Content-Type".into(), "multipart/form-data".into());
		text_with_multipart.body = Some(RequestBody::Text("a=1".into()));
		let err = build_request(&Client::new(), &base(), &text_with_multipart).unwrap_err();
		assert!(matches!(err, Error::MalformedDescriptor(_)));
	}

	#[test]
	fn invalid_method_header_and_scheme_are_malformed() {
		let mut bad_method = RequestDescriptor::new("/x");
		bad_method.method = "GE T".into();
		assert!(matches!(
			build_request(&Client::new(), &base(), &bad_method),
			Err(Error::MalformedDescriptor(_))
		));

		let mut bad_header = RequestDescriptor::new("/x");
		bad_header.headers.insert("bad header".into(), "v".into());
		assert!(matches!(
			build_request(&Client::new(), &base(), &bad_header),
			Err(Error::MalformedDescriptor(_))
		));

		let bad_scheme = RequestDescriptor::new("ftp://files.example/x");
		assert!(matches!(
			build_request(&Client::new(), &base(), &bad_scheme),
			Err(Error::MalformedDescriptor(_))
		));
	}

	#[test]
	fn repeated_headers_are_joined() {
		let mut headers = HeaderMap::new();
		headers.append("set-cookie", HeaderValue::from_static("a=1"));
		headers.append("set-cookie", HeaderValue::from_static("b=2"));
		headers.append("content-type", HeaderValue::from_static("text/plain"));

		let serialized = serialize_headers(&headers);
		assert_eq!(serialized.len(), 2);
		assert_eq!(serialized["set-cookie"], "a=1, b=2");
		assert_eq!(serialized["content-type"], "text/plain");
	}

	#[test]
	fn source_origin_drops_path() {
		let source = SourceOrigin::new();
		assert!(source.origin().is_none());
		source.set(base());
		assert_eq!(source.origin().as_deref(), Some("https://cdn.example"));
		source.clear();
		assert!(source.address().is_none());
	}

	#[tokio::test]
	async fn relay_without_source_is_detached() {
		let relay = XhrRelay::new(Client::new(), SourceOrigin::new());
		let err = relay
			.handle(RequestDescriptor::new("https://api.example/"))
			.await
			.unwrap_err();
		assert!(err.is_detached());
	}
}
