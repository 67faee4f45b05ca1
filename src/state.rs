//! Application state shared by all request handlers.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::steam::openid::{
	DiscoveryCache,
	InMemoryDiscoveryCache,
	InMemoryNonceStore,
	NonceStore,
};
use crate::steam::{OpenId, SteamApi};
use crate::Config;

/// The website's state.
///
/// Handlers extract the individual parts they need via [`FromRef`].
#[derive(Debug, Clone, FromRef)]
pub struct AppState
{
	/// The runtime configuration.
	pub config: Arc<Config>,

	/// Steam Web API client.
	pub steam: SteamApi,

	/// Steam OpenID verifier.
	pub openid: OpenId,
}

impl AppState
{
	/// Creates a new [`AppState`] with in-memory nonce and discovery stores.
	pub fn new(config: Config) -> Result<Self, url::ParseError>
	{
		Self::with_stores(
			config,
			Arc::new(InMemoryNonceStore::default()),
			Arc::new(InMemoryDiscoveryCache::default()),
		)
	}

	/// Creates a new [`AppState`] with the given nonce and discovery stores.
	///
	/// The stores live as long as the state does, and are shared by every
	/// login.
	#[tracing::instrument(level = "debug", skip(nonce_store, discovery_cache), err(Debug))]
	pub fn with_stores(
		config: Config,
		nonce_store: Arc<dyn NonceStore>,
		discovery_cache: Arc<dyn DiscoveryCache>,
	) -> Result<Self, url::ParseError>
	{
		let http_client = reqwest::Client::new();
		let steam = SteamApi::new(
			http_client.clone(),
			config.steam_api_url.clone(),
			config.steam_api_key.clone(),
		);

		let openid = OpenId::new(
			http_client,
			config.steam_openid_url.clone(),
			nonce_store,
			discovery_cache,
		)?;

		Ok(Self { config: Arc::new(config), steam, openid })
	}
}
