//! This module contains the [`UserProfile`] type, which represents a user's
//! profile information as returned by Steam.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A Steam user's public profile.
///
/// Field names on the wire are the ones Steam uses; missing fields are left
/// empty.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile
{
	/// The user's SteamID64.
	#[serde(rename = "steamid")]
	pub steam_id: String,

	/// The user's display name.
	#[serde(rename = "personaname")]
	pub persona_name: String,

	/// URL to the user's Steam profile.
	#[serde(rename = "profileurl")]
	pub profile_url: String,

	/// URL to the user's avatar (32x32).
	pub avatar: String,

	/// URL to the user's avatar (64x64).
	#[serde(rename = "avatarmedium")]
	pub avatar_medium: String,

	/// URL to the user's avatar (184x184).
	#[serde(rename = "avatarfull")]
	pub avatar_full: String,
}

impl UserProfile
{
	/// Creates a bare profile that only knows the user's ID and name.
	///
	/// This is what we fall back to when we can't reach Steam.
	pub fn minimal(steam_id: String, persona_name: String) -> Self
	{
		Self { steam_id, persona_name, ..Self::default() }
	}
}

/// The errors that can occur when fetching a [`UserProfile`].
#[derive(Debug, Error)]
pub enum FetchUserError
{
	/// There is no API key configured.
	#[error("`STEAM_API_KEY` is not configured")]
	MissingApiKey,

	/// The HTTP request to Steam failed or returned a bad status.
	#[error("failed to make http request to Steam: {0}")]
	Http(#[source] reqwest::Error),

	/// Steam's response didn't have the shape we expected.
	#[error("failed to parse response from Steam: {0}")]
	Parse(#[from] serde_json::Error),

	/// Steam returned an empty list of players.
	#[error("no player data returned from Steam")]
	NotFound,
}

impl FetchUserError
{
	/// Wraps a [`reqwest::Error`].
	///
	/// The URL is stripped, as it contains our API key.
	pub(super) fn http(error: reqwest::Error) -> Self
	{
		Self::Http(error.without_url())
	}
}

/// The response body of `ISteamUser/GetPlayerSummaries`.
#[derive(Debug, Deserialize)]
#[allow(clippy::missing_docs_in_private_items)]
struct PlayerSummaries
{
	response: Players,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::missing_docs_in_private_items)]
struct Players
{
	players: Vec<UserProfile>,
}

/// Parses a `GetPlayerSummaries` response body and returns the first player.
pub(super) fn parse_player_summaries(body: &[u8]) -> Result<UserProfile, FetchUserError>
{
	serde_json::from_slice::<PlayerSummaries>(body)?
		.response
		.players
		.into_iter()
		.next()
		.ok_or(FetchUserError::NotFound)
}
