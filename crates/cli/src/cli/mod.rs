use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use url::Url;
use viewer::ViewerConfig;
use viewer_protocol::Capability;

use crate::styles::cli_styles;

#[derive(Parser, Debug)]
#[command(name = "viewer-host")]
#[command(about = "Host an embedded document over a stdio message channel")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Attach a session and exchange NDJSON envelopes on stdin/stdout until EOF or Ctrl-C
	Serve(SessionArgs),

	/// Print the embed URL for a document and exit
	EmbedUrl(SessionArgs),
}

/// Session settings. Flags override values read from `--config`.
#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
	/// Document to embed
	#[arg(long, value_name = "URL")]
	pub document: Option<Url>,

	/// JSON config file (camelCase keys)
	#[arg(long, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Origin the host advertises to the document
	#[arg(long, value_name = "ORIGIN")]
	pub origin: Option<String>,

	/// Referrer passed to the document
	#[arg(long, value_name = "URL")]
	pub referrer: Option<String>,

	/// Capability to advertise; repeatable (xhrInterceptor, handshakepoll)
	#[arg(long = "cap", value_name = "CAP")]
	pub capabilities: Vec<Capability>,

	/// Load the document in prerender mode
	#[arg(long)]
	pub prerender: bool,
}

impl SessionArgs {
	pub fn resolve_config(&self) -> Result<ViewerConfig> {
		let mut config = match (&self.config, &self.document) {
			(Some(path), _) => ViewerConfig::load(path)
				.with_context(|| format!("Failed to load config from {}", path.display()))?,
			(None, Some(document)) => ViewerConfig::new(document.clone()),
			(None, None) => bail!("either --document or --config is required"),
		};

		if let Some(document) = &self.document {
			config.document_url = document.clone();
		}
		if let Some(origin) = &self.origin {
			config.origin = origin.clone();
		}
		if let Some(referrer) = &self.referrer {
			config.referrer = Some(referrer.clone());
		}
		if !self.capabilities.is_empty() {
			config.capabilities = self.capabilities.clone();
		}
		if self.prerender {
			config.prerender = true;
		}
		Ok(config)
	}
}
