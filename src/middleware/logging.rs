//! Request logging.
//!
//! Every request gets its own span, tagged with a fresh UUIDv7 so all log
//! lines belonging to one request can be grepped for. The [`Trace`] layer's
//! type contains closures and cannot be named, so we export a macro that
//! expands to the configured layer instead. The hook functions are only `pub`
//! so the macro can reach them.
//!
//! [`Trace`]: tower_http::trace::Trace

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request};
use axum::http::header;
use axum::response::Response;
use tower_http::classify::ServerErrorsFailureClass;
use uuid::Uuid;

/// Creates a middleware that will log incoming HTTP requests.
macro_rules! layer {
	() => {
		tower_http::trace::TraceLayer::new_for_http()
			.make_span_with($crate::middleware::logging::make_span)
			.on_response($crate::middleware::logging::on_response)
			.on_failure($crate::middleware::logging::on_failure)
	};
}

pub(crate) use layer;

#[doc(hidden)]
pub(crate) fn make_span(request: &Request) -> tracing::Span
{
	let peer = request
		.extensions()
		.get::<ConnectInfo<SocketAddr>>()
		.map(|ConnectInfo(addr)| addr.to_string());

	let user_agent = request
		.headers()
		.get(header::USER_AGENT)
		.and_then(|value| value.to_str().ok());

	tracing::info_span! {
		target: "steam_site::http",
		"request",
		request.id = %Uuid::now_v7(),
		request.peer = peer.as_deref().unwrap_or("N/A"),
		request.method = %request.method(),
		request.uri = %request.uri(),
		request.version = ?request.version(),
		request.user_agent = user_agent,
		response.status = tracing::field::Empty,
		latency = tracing::field::Empty,
	}
}

#[doc(hidden)]
pub(crate) fn on_response(response: &Response, latency: Duration, span: &tracing::Span)
{
	span.record("response.status", response.status().as_u16())
		.record("latency", format_args!("{latency:?}"));

	tracing::debug!(target: "steam_site::http", "finished request");
}

#[doc(hidden)]
pub(crate) fn on_failure(failure: ServerErrorsFailureClass, latency: Duration, _span: &tracing::Span)
{
	match failure {
		ServerErrorsFailureClass::Error(error) => {
			tracing::error!(target: "steam_site::http", %error, ?latency, "request failed");
		}
		ServerErrorsFailureClass::StatusCode(status) => {
			tracing::error!(target: "steam_site::http", %status, ?latency, "request failed");
		}
	}
}
