use std::io::{self, IsTerminal};

use time::macros::format_description;
use tracing_subscriber::fmt::time::{FormatTime, UtcTime};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Provides a tracing layer for emitting logs to STDERR.
///
/// Colors are only used if STDERR is a terminal.
pub fn layer<S>() -> impl tracing_subscriber::Layer<S>
where
	S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
	tracing_subscriber::fmt::layer()
		.with_writer(io::stderr)
		.with_ansi(io::stderr().is_terminal())
		.with_timer(timer())
		.with_target(true)
		.pretty()
		.with_filter(super::env_filter())
}

fn timer() -> impl FormatTime
{
	let format = format_description!("[year]/[month]/[day] [hour]:[minute]:[second].[subsecond digits:5]");

	UtcTime::new(format)
}
