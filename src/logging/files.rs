use std::path::{Path, PathBuf};
use std::{fs, io};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Provides a tracing layer for emitting logs to daily rotating files in
/// `log_dir`.
///
/// The directory is created if it doesn't exist yet. Returns the layer, the
/// guard of the background writer, and the canonical path of the directory.
pub fn layer<S>(log_dir: &Path) -> io::Result<(impl tracing_subscriber::Layer<S>, WorkerGuard, PathBuf)>
where
	S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
	if !log_dir.exists() {
		fs::create_dir_all(log_dir)?;
	}

	let log_dir = log_dir.canonicalize()?;

	let (writer, guard) = tracing_appender::rolling::Builder::new()
		.rotation(Rotation::DAILY)
		.filename_prefix("steam-site")
		.filename_suffix("log")
		.build(&log_dir)
		.map(tracing_appender::non_blocking)
		.map_err(io::Error::other)?;

	let layer = tracing_subscriber::fmt::layer()
		.with_writer(writer)
		.with_ansi(false)
		.with_target(true)
		.with_filter(super::env_filter());

	Ok((layer, guard, log_dir))
}
