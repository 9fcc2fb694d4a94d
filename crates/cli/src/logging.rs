use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Installs the global subscriber. Logs always go to stderr: stdout carries
/// the message channel.
pub fn init_logging(verbosity: u8) {
	// 0 = warnings from the session, errors from the channel plumbing
	// 1 (-v) = info
	// 2+ (-vv) = debug/trace for everything
	let filter = match verbosity {
		0 => "warn,viewer_runtime=error",
		1 => "info",
		_ => "debug",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
