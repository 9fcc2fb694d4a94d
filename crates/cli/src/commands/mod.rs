mod embed_url;
mod serve;

use anyhow::Result;

use crate::cli::{Cli, Commands};

pub async fn dispatch(cli: Cli) -> Result<()> {
	match cli.command {
		Commands::Serve(args) => serve::run(args.resolve_config()?).await,
		Commands::EmbedUrl(args) => embed_url::run(args.resolve_config()?).await,
	}
}
