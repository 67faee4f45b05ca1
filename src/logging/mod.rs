//! Log-capturing facilities.

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod stderr;
mod files;

/// The filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info";

/// Initializes [`tracing-subscriber`].
///
/// Logs always go to stderr. If `log_dir` is set, they are also written to
/// daily rotating files in that directory.
///
/// NOTE: the returned [`WorkerGuard`] will flush the file logs when dropped,
///       which means it has to stay alive until the program exits!
pub fn init(log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>>
{
	let (files_layer, guard, log_dir) = match log_dir {
		None => (None, None, None),
		Some(log_dir) => {
			let (layer, guard, log_dir) = files::layer(log_dir).context("files layer")?;
			(Some(layer), Some(guard), Some(log_dir))
		}
	};

	tracing_subscriber::registry()
		.with(stderr::layer())
		.with(files_layer)
		.try_init()
		.context("install global subscriber")?;

	match log_dir {
		None => tracing::info!("initialized logging"),
		Some(log_dir) => tracing::info!(dir = %log_dir.display(), "initialized logging"),
	}

	Ok(guard)
}

/// Reads `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
fn env_filter() -> EnvFilter
{
	EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
