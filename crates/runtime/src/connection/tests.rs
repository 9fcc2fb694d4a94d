use std::sync::Arc;

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};

use super::*;
use crate::transport::LineTransport;

/// Answers `echo` with its payload and rejects everything else.
#[derive(Default)]
struct EchoHandler {
	seen: Mutex<Vec<(Message, bool)>>,
}

impl InboundHandler for EchoHandler {
	fn dispatch(&self, message: Message, reply: Option<ReplySlot>) {
		self.seen.lock().push((message.clone(), reply.is_some()));
		if let Some(reply) = reply {
			if message.name == "echo" {
				reply.resolve(message.payload);
			} else {
				reply.reject(Error::UnsupportedMessage(message.name));
			}
		}
	}
}

struct Peer {
	inbound: DuplexStream,
	outbound: Lines<BufReader<DuplexStream>>,
}

impl Peer {
	async fn send(&mut self, frame: Value) {
		let mut bytes = serde_json::to_vec(&frame).unwrap();
		bytes.push(b'\n');
		self.inbound.write_all(&bytes).await.unwrap();
		self.inbound.flush().await.unwrap();
	}

	async fn recv(&mut self) -> Value {
		let line = self.outbound.next_line().await.unwrap().unwrap();
		serde_json::from_str(&line).unwrap()
	}
}

fn create_test_connection() -> (Arc<Connection>, Peer) {
	let (inbound_read, inbound_write) = tokio::io::duplex(4096);
	let (outbound_read, outbound_write) = tokio::io::duplex(4096);

	let connection = Connection::new(LineTransport::new(outbound_write, inbound_read));
	let peer = Peer {
		inbound: inbound_write,
		outbound: BufReader::new(outbound_read).lines(),
	};
	(Arc::new(connection), peer)
}

fn request(id: u64, name: &str, data: Value, rsvp: bool) -> Value {
	serde_json::to_value(Envelope::request(id, name, data, rsvp)).unwrap()
}

#[tokio::test]
async fn test_rsvp_request_gets_matching_response() {
	let (connection, mut peer) = create_test_connection();
	let handler = Arc::new(EchoHandler::default());

	let run = tokio::spawn({
		let connection = Arc::clone(&connection);
		let handler: Arc<dyn InboundHandler> = handler.clone();
		async move { connection.run(handler).await }
	});

	peer.send(request(7, "echo", json!({"x": 1}), true)).await;
	let response = peer.recv().await;

	assert_eq!(response["type"], "s");
	assert_eq!(response["requestid"], 7);
	assert_eq!(response["name"], "echo");
	assert_eq!(response["data"], json!({"x": 1}));
	assert!(response.get("error").is_none());

	drop(peer);
	run.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_rejection_is_sent_as_error_text() {
	let (connection, mut peer) = create_test_connection();
	let handler: Arc<dyn InboundHandler> = Arc::new(EchoHandler::default());

	let run = tokio::spawn({
		let connection = Arc::clone(&connection);
		async move { connection.run(handler).await }
	});

	peer.send(request(2, "bogus", Value::Null, true)).await;
	let response = peer.recv().await;

	assert_eq!(response["requestid"], 2);
	assert_eq!(response["error"], "bogus Message is not supported!");

	drop(peer);
	run.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_requests_reach_handler_in_arrival_order() {
	let (connection, mut peer) = create_test_connection();
	let handler = Arc::new(EchoHandler::default());

	let run = tokio::spawn({
		let connection = Arc::clone(&connection);
		let handler: Arc<dyn InboundHandler> = handler.clone();
		async move { connection.run(handler).await }
	});

	peer.send(request(1, "documentLoaded", Value::Null, false)).await;
	peer.send(request(2, "scroll", json!({"y": 5}), false)).await;
	peer.send(request(3, "echo", Value::Null, true)).await;
	let _ = peer.recv().await;

	let seen = handler.seen.lock().clone();
	let names: Vec<&str> = seen.iter().map(|(m, _)| m.name.as_str()).collect();
	assert_eq!(names, vec!["documentLoaded", "scroll", "echo"]);
	assert_eq!(
		seen.iter().map(|(_, has_reply)| *has_reply).collect::<Vec<_>>(),
		vec![false, false, true]
	);

	drop(peer);
	run.await.unwrap().unwrap();
}

#[test]
fn test_foreign_frames_are_ignored() {
	let (connection, _peer) = create_test_connection();
	let handler = EchoHandler::default();

	let mut envelope = Envelope::request(1, "echo", Value::Null, true);
	envelope.app = "someone-else".to_string();
	connection.dispatch(envelope, &handler).unwrap();

	assert!(handler.seen.lock().is_empty());
}

#[tokio::test]
async fn test_send_request_correlates_response() {
	let (connection, mut peer) = create_test_connection();
	let handler: Arc<dyn InboundHandler> = Arc::new(EchoHandler::default());

	let run = tokio::spawn({
		let connection = Arc::clone(&connection);
		async move { connection.run(handler).await }
	});

	let pending = tokio::spawn({
		let connection = Arc::clone(&connection);
		async move { connection.send_request("visibilitychange", json!({"state": "hidden"})).await }
	});

	let sent = peer.recv().await;
	assert_eq!(sent["type"], "q");
	assert_eq!(sent["rsvp"], true);
	let id = sent["requestid"].as_u64().unwrap();

	let reply = Envelope::response(id, "visibilitychange", Ok(json!("ack")));
	peer.send(serde_json::to_value(reply).unwrap()).await;

	assert_eq!(pending.await.unwrap().unwrap(), json!("ack"));

	drop(peer);
	run.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_post_does_not_request_reply() {
	let (connection, mut peer) = create_test_connection();
	let handler: Arc<dyn InboundHandler> = Arc::new(EchoHandler::default());

	let run = tokio::spawn({
		let connection = Arc::clone(&connection);
		async move { connection.run(handler).await }
	});

	connection.post("visibilitychange", json!({"state": "visible"})).unwrap();
	let sent = peer.recv().await;
	assert_eq!(sent["name"], "visibilitychange");
	assert_eq!(sent["rsvp"], false);
	assert_eq!(sent["data"]["state"], "visible");

	drop(peer);
	run.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_eof_fails_pending_requests() {
	let (connection, mut peer) = create_test_connection();
	let handler: Arc<dyn InboundHandler> = Arc::new(EchoHandler::default());

	let run = tokio::spawn({
		let connection = Arc::clone(&connection);
		async move { connection.run(handler).await }
	});

	let pending = tokio::spawn({
		let connection = Arc::clone(&connection);
		async move { connection.send_request("ping", Value::Null).await }
	});
	let _ = peer.recv().await;

	drop(peer);
	run.await.unwrap().unwrap();

	let err = pending.await.unwrap().unwrap_err();
	assert!(matches!(err, Error::ChannelClosed));
}

#[tokio::test]
async fn test_run_twice_is_an_error() {
	let (connection, peer) = create_test_connection();
	let handler: Arc<dyn InboundHandler> = Arc::new(EchoHandler::default());

	drop(peer);
	connection.run(Arc::clone(&handler)).await.unwrap();
	let err = connection.run(handler).await.unwrap_err();
	assert!(matches!(err, Error::ProtocolError(_)));
}

#[test]
fn test_unmatched_response_is_a_protocol_error() {
	let (connection, _peer) = create_test_connection();
	let handler = EchoHandler::default();

	let result = connection.dispatch(Envelope::response(99, "x", Ok(Value::Null)), &handler);
	assert!(matches!(result, Err(Error::ProtocolError(_))));
}
