#![doc = include_str!("../README.md")]
// TODO: remove once https://github.com/tokio-rs/tracing/issues/2912 lands
#![allow(clippy::blocks_in_conditions)]

use std::fmt::Write;
use std::future::Future;
use std::net::SocketAddr;

use anyhow::Context;
use axum::extract::connect_info::IntoMakeServiceWithConnectInfo;
use axum::extract::ConnectInfo;
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::services::ServeDir;

mod error;
pub use error::{Error, ErrorKind, Result};

mod config;
pub use config::Config;

mod state;
pub use state::AppState;

#[cfg(test)]
mod testing;

mod middleware;
pub mod steam;
pub mod session;
pub mod authentication;
pub mod pages;

/// Every route we serve, for logging on startup.
const ROUTES: &[(&str, &str)] = &[
	("/", "home page"),
	("/about", "about page"),
	("/contact", "contact page"),
	("/search", "search"),
	("/terms", "terms of service"),
	("/privacy", "privacy policy"),
	("/login", "login with Steam"),
	("/logout", "logout"),
	("/api/time", "current server time"),
	("/static/*", "static files"),
];

#[allow(clippy::missing_docs_in_private_items)]
type Server = axum::serve::Serve<
	IntoMakeServiceWithConnectInfo<Router, SocketAddr>,
	axum::middleware::AddExtension<Router, ConnectInfo<SocketAddr>>,
>;

/// Builds the website's [`Router`].
pub fn router(state: AppState) -> Router
{
	let static_files = ServeDir::new(&state.config.static_dir);

	Router::new()
		.merge(pages::router(state.clone()))
		.merge(authentication::router(state))
		.nest_service("/static", static_files)
		.fallback(pages::not_found)
		.layer(middleware::logging::layer!())
}

/// Run the website.
///
/// This function will not exit until a SIGINT signal is received.
/// If you want to supply a custom signal for graceful shutdown, use
/// [`run_until()`] instead.
pub async fn run(config: Config) -> anyhow::Result<()>
{
	server(config)
		.await
		.context("build http server")?
		.with_graceful_shutdown(sigint())
		.await
		.context("run http server")
}

/// Run the website until a given future completes.
///
/// This function is the same as [`run()`], except that it also waits for the
/// provided `until` future, and shuts down the server when that future
/// resolves.
pub async fn run_until<Until>(config: Config, until: Until) -> anyhow::Result<()>
where
	Until: Future<Output = ()> + Send + 'static,
{
	server(config)
		.await
		.context("build http server")?
		.with_graceful_shutdown(async move {
			tokio::select! {
				() = until => {}
				() = sigint() => {}
			}
		})
		.await
		.context("run http server")
}

/// Runs the necessary setup and returns a future that will run the server
/// when polled.
///
/// See [`run()`] and [`run_until()`].
async fn server(config: Config) -> anyhow::Result<Server>
{
	tracing::debug!(addr = %config.addr, "establishing TCP connection");

	let tcp_listener = TcpListener::bind(config.addr)
		.await
		.context("bind tcp socket")?;

	let addr = tcp_listener.local_addr().context("get tcp addr")?;
	tracing::info!(%addr, prod = cfg!(feature = "production"), "listening for requests");

	let state = AppState::new(config).context("initialize state")?;
	let mut routes_message = String::from("registering routes:\n");

	for (path, description) in ROUTES {
		writeln!(&mut routes_message, "    • {path} => {description}")?;
	}

	tracing::info!("{routes_message}");

	let service = router(state).into_make_service_with_connect_info::<SocketAddr>();

	Ok(axum::serve(tcp_listener, service))
}

/// Waits for a SIGINT signal from the operating system.
#[tracing::instrument(name = "runtime::signals")]
async fn sigint()
{
	if let Err(error) = signal::ctrl_c().await {
		tracing::error!(%error, "failed to receive SIGINT");
	} else {
		tracing::warn!("received SIGINT; shutting down...");
	}
}
