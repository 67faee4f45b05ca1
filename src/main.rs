//! The steam-site web server.

use anyhow::Context;
use steam_site::Config;

mod logging;

#[tokio::main]
async fn main() -> anyhow::Result<()>
{
	dotenvy::dotenv().context("load `.env` file")?;

	let config = Config::new().context("load configuration")?;
	let _guard = logging::init(config.log_dir.as_deref()).context("initialize logging")?;

	tracing::debug!(?config, "loaded configuration");

	if cfg!(not(feature = "production")) {
		tracing::warn!("running in development mode");
	}

	steam_site::run(config).await
}
