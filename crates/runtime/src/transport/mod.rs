//! Newline-delimited JSON transport.
//!
//! Each frame is one JSON value followed by `\n`. The transport splits into a
//! [`Transport`] half that writes frames and a [`TransportReceiver`] half whose
//! [`run`](TransportReceiver::run) loop forwards decoded frames to an unbounded
//! channel until the reader reaches EOF. Frames that do not decode, invalid
//! UTF-8 included, are logged and skipped; only an I/O error ends the loop early.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Boxed future returned by transport halves.
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Writing half of a transport.
pub trait Transport: Send {
	/// Writes one frame.
	fn send(&mut self, message: Value) -> TransportFuture<'_>;
}

/// Reading half of a transport.
pub trait TransportReceiver: Send {
	/// Reads frames until EOF, forwarding each decoded value.
	fn run(self: Box<Self>) -> TransportFuture<'static>;
}

/// The halves of a transport plus the channel the receiver feeds.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub message_rx: mpsc::UnboundedReceiver<Value>,
}

/// Frames JSON values as newline-delimited text over any async byte stream.
pub struct LineTransport;

impl LineTransport {
	/// Builds transport halves over `writer` (outbound) and `reader` (inbound).
	pub fn new<W, R>(writer: W, reader: R) -> TransportParts
	where
		W: AsyncWrite + Unpin + Send + 'static,
		R: AsyncRead + Unpin + Send + 'static,
	{
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		TransportParts {
			sender: Box::new(LineTransportSender { writer }),
			receiver: Box::new(LineTransportReceiver {
				reader: BufReader::new(reader),
				message_tx,
			}),
			message_rx,
		}
	}

	/// Transport over the process's stdout (outbound) and stdin (inbound).
	pub fn stdio() -> TransportParts {
		Self::new(tokio::io::stdout(), tokio::io::stdin())
	}
}

/// Writing half of a [`LineTransport`].
pub struct LineTransportSender<W> {
	writer: W,
}

impl<W> Transport for LineTransportSender<W>
where
	W: AsyncWrite + Unpin + Send,
{
	fn send(&mut self, message: Value) -> TransportFuture<'_> {
		Box::pin(async move {
			let mut frame = serde_json::to_vec(&message)?;
			frame.push(b'\n');
			self.writer.write_all(&frame).await?;
			self.writer.flush().await?;
			Ok(())
		})
	}
}

/// Reading half of a [`LineTransport`].
pub struct LineTransportReceiver<R> {
	reader: BufReader<R>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl<R> TransportReceiver for LineTransportReceiver<R>
where
	R: AsyncRead + Unpin + Send + 'static,
{
	fn run(self: Box<Self>) -> TransportFuture<'static> {
		Box::pin(async move {
			let LineTransportReceiver {
				mut reader,
				message_tx,
			} = *self;
			let mut buf = Vec::new();

			loop {
				buf.clear();
				let read = reader
					.read_until(b'\n', &mut buf)
					.await
					.map_err(|e| Error::TransportError(e.to_string()))?;
				if read == 0 {
					break;
				}

				let frame = buf.trim_ascii();
				if frame.is_empty() {
					continue;
				}

				match serde_json::from_slice::<Value>(frame) {
					Ok(value) => {
						if message_tx.send(value).is_err() {
							tracing::debug!("Message receiver dropped, stopping transport");
							break;
						}
					}
					Err(e) => {
						tracing::warn!(error = %e, len = frame.len(), "Skipping undecodable frame");
					}
				}
			}

			Ok(())
		})
	}
}
