// Local HTTP server for relay tests.
//
// Routes:
// - /echo        any method; echoes the body, reports method and content type in headers
// - /form        multipart; replies with the received fields as `name=value&...`
// - /cookies     two Set-Cookie headers
// - /teapot      418 with a body
// - /slow        answers after 30s
//
// RawServer answers every connection with one canned HTTP/1.1 response, for
// status lines axum will not write.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::extract::Multipart;
use axum::http::header::{CONTENT_TYPE, SET_COOKIE};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{AppendHeaders, IntoResponse};
use axum::routing::{any, get, post};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub struct TestServer {
	addr: SocketAddr,
	handle: JoinHandle<()>,
}

impl TestServer {
	pub async fn start() -> Self {
		let listener = TcpListener::bind("127.0.0.1:0")
			.await
			.expect("Failed to bind test server");
		let addr = listener.local_addr().expect("Failed to read local address");

		let app = Router::new()
			.route("/echo", any(echo))
			.route("/form", post(form))
			.route("/cookies", get(cookies))
			.route("/teapot", get(teapot))
			.route("/slow", get(slow));

		let handle = tokio::spawn(async move {
			axum::serve(listener, app).await.expect("Test server failed");
		});

		Self { addr, handle }
	}

	pub fn origin(&self) -> String {
		format!("http://{}", self.addr)
	}

	pub fn url(&self, path: &str) -> String {
		format!("http://{}{}", self.addr, path)
	}
}

impl Drop for TestServer {
	fn drop(&mut self) {
		self.handle.abort();
	}
}

pub struct RawServer {
	addr: SocketAddr,
	handle: JoinHandle<()>,
}

impl RawServer {
	pub async fn start(response: &'static str) -> Self {
		let listener = TcpListener::bind("127.0.0.1:0")
			.await
			.expect("Failed to bind raw server");
		let addr = listener.local_addr().expect("Failed to read local address");

		let handle = tokio::spawn(async move {
			while let Ok((mut stream, _)) = listener.accept().await {
				tokio::spawn(async move {
					let mut request = Vec::new();
					let mut chunk = [0u8; 1024];
					while !request.windows(4).any(|w| w == b"\r\n\r\n") {
						match stream.read(&mut chunk).await {
							Ok(0) | Err(_) => return,
							Ok(n) => request.extend_from_slice(&chunk[..n]),
						}
					}
					let _ = stream.write_all(response.as_bytes()).await;
					let _ = stream.shutdown().await;
				});
			}
		});

		Self { addr, handle }
	}

	pub fn url(&self, path: &str) -> String {
		format!("http://{}{}", self.addr, path)
	}
}

impl Drop for RawServer {
	fn drop(&mut self) {
		self.handle.abort();
	}
}

async fn echo(method: Method, headers: HeaderMap, body: String) -> impl IntoResponse {
	let content_type = headers
		.get(CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.unwrap_or_default()
		.to_string();
	(
		[
			("x-method", method.to_string()),
			("x-content-type", content_type),
		],
		body,
	)
}

async fn form(mut multipart: Multipart) -> Result<String, StatusCode> {
	let mut pairs = Vec::new();
	while let Some(field) = multipart
		.next_field()
		.await
		.map_err(|_| StatusCode::BAD_REQUEST)?
	{
		let name = field.name().unwrap_or_default().to_string();
		let value = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
		pairs.push(format!("{name}={value}"));
	}
	Ok(pairs.join("&"))
}

async fn cookies() -> impl IntoResponse {
	(
		AppendHeaders([(SET_COOKIE, "a=1"), (SET_COOKIE, "b=2")]),
		"cookies",
	)
}

async fn teapot() -> impl IntoResponse {
	(StatusCode::IM_A_TEAPOT, "short and stout")
}

async fn slow() -> &'static str {
	tokio::time::sleep(Duration::from_secs(30)).await;
	"late"
}
