use anyhow::{Context, Result};
use viewer::{AddressResolver, DirectAddress, ViewerConfig};

pub async fn run(config: ViewerConfig) -> Result<()> {
	let address = DirectAddress
		.resolve(&config.document_url)
		.await
		.context("Failed to resolve document address")?;
	println!("{}", config.embed_url(&address));
	Ok(())
}
