//! Everything related to Steam.
//!
//! [`SteamApi`] fetches profile information about users from the Steam Web
//! API. The [`openid`] module implements logging in with Steam.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use url::Url;

pub mod user;
pub use user::{FetchUserError, UserProfile};

pub mod openid;
pub use openid::OpenId;

/// A client for the Steam Web API.
#[derive(Clone)]
#[allow(clippy::missing_docs_in_private_items)]
pub struct SteamApi
{
	http_client: reqwest::Client,
	api_url: Arc<Url>,
	api_key: Option<Arc<str>>,
}

impl fmt::Debug for SteamApi
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
	{
		f.debug_struct("SteamApi")
			.field("api_url", &format_args!("{:?}", self.api_url.as_str()))
			.field("api_key", &self.api_key.as_ref().map(|_| "*****"))
			.finish_non_exhaustive()
	}
}

impl SteamApi
{
	/// Creates a new [`SteamApi`].
	///
	/// `api_key` is only checked when it's actually needed.
	pub fn new(http_client: reqwest::Client, api_url: Url, api_key: Option<String>) -> Self
	{
		Self { http_client, api_url: Arc::new(api_url), api_key: api_key.map(Into::into) }
	}

	/// Fetches the profile of the user with the given `steam_id`.
	///
	/// Every call makes a fresh request; nothing is cached.
	#[tracing::instrument(level = "debug", skip(self), err(Debug, level = "debug"))]
	pub async fn fetch_user(&self, steam_id: &str) -> Result<UserProfile, FetchUserError>
	{
		#[allow(clippy::missing_docs_in_private_items)]
		#[derive(Serialize)]
		struct Query<'a>
		{
			key: &'a str,

			#[serde(rename = "steamids")]
			steam_id: &'a str,
		}

		let key = self.api_key.as_deref().ok_or(FetchUserError::MissingApiKey)?;

		tracing::debug!(url = self.api_url.as_str(), "making http request to steam");

		let response = self
			.http_client
			.get(Url::clone(&self.api_url))
			.query(&Query { key, steam_id })
			.send()
			.await
			.map_err(FetchUserError::http)?;

		if let Err(error) = response.error_for_status_ref() {
			let response_body = response.text().await.ok();

			tracing::error! {
				%error,
				?response_body,
				"failed to fetch profile information from steam",
			};

			return Err(FetchUserError::http(error));
		}

		let body = response.bytes().await.map_err(FetchUserError::http)?;

		user::parse_player_summaries(&body)
	}
}
