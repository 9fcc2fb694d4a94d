use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use viewer::{Connection, InboundHandler, LineTransport, ViewerConfig, ViewerSession};

/// Runs one session over stdio until the peer closes stdin or Ctrl-C.
pub async fn run(config: ViewerConfig) -> Result<()> {
	let session = Arc::new(
		ViewerSession::builder(config)
			.build()
			.context("Failed to build session")?,
	);
	let connection = Arc::new(Connection::new(LineTransport::stdio()));

	let embed_url = session
		.attach(connection.clone())
		.await
		.context("Failed to attach session")?;
	info!(url = %embed_url, "Serving embedded document");

	let handler: Arc<dyn InboundHandler> = session.clone();
	tokio::select! {
		result = connection.run(handler) => result.context("Channel failed")?,
		_ = tokio::signal::ctrl_c() => info!("Interrupted"),
	}

	session.unattach();
	connection.shutdown().await;
	Ok(())
}
