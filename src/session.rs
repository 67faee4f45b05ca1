//! Cookie sessions.
//!
//! A logged-in user is remembered by a single cookie, [`COOKIE_NAME`], holding
//! their SteamID and display name separated by a `|`. There is no server-side
//! state; every request that carries the cookie refreshes the profile from
//! Steam, and falls back to whatever the cookie says if that fails.
//!
//! The cookie is neither signed nor encrypted. Anybody can claim to be anybody
//! by editing it, so it must never be used for anything but cosmetics.
//!
//! # Life Cycle
//!
//!    1. `/login` verifies an OpenID assertion and returns a [`SessionToken`]
//!       as part of the response, which sets the cookie
//!    2. every page extracts a [`CurrentUser`], which decodes the cookie and
//!       [resolves] it into a full profile
//!    3. `/logout` returns [`ClearSession`], which expires the cookie
//!
//! [resolves]: SessionToken::resolve

use std::convert::Infallible;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header, request, HeaderMap, HeaderValue};
use axum::response::{IntoResponseParts, ResponseParts};
use axum_extra::extract::cookie::Cookie;
use time::OffsetDateTime;

use crate::steam::{SteamApi, UserProfile};

/// The name of the cookie that holds the session.
pub const COOKIE_NAME: &str = "steam_user";

/// Separates the SteamID from the display name in the cookie value.
const DELIMITER: char = '|';

/// How long the session cookie lives for.
pub const MAX_AGE: time::Duration = time::Duration::WEEK;

/// The data we store in the session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken
{
	/// The user's SteamID64.
	pub steam_id: String,

	/// The user's display name at the time they logged in.
	pub display_name: String,
}

impl SessionToken
{
	/// Creates a [`SessionToken`] for the given profile.
	pub fn new(profile: &UserProfile) -> Self
	{
		Self { steam_id: profile.steam_id.clone(), display_name: profile.persona_name.clone() }
	}

	/// Encodes the token into a (not yet percent-encoded) cookie value.
	pub fn encode(&self) -> String
	{
		format!("{}{DELIMITER}{}", self.steam_id, self.display_name)
	}

	/// Decodes a cookie value produced by [`SessionToken::encode()`].
	///
	/// The value must consist of exactly two parts.
	pub fn decode(value: &str) -> Option<Self>
	{
		let mut parts = value.split(DELIMITER);
		let (Some(steam_id), Some(display_name), None) = (parts.next(), parts.next(), parts.next())
		else {
			return None;
		};

		Some(Self { steam_id: steam_id.to_owned(), display_name: display_name.to_owned() })
	}

	/// Finds and decodes the session cookie in a request's headers.
	///
	/// Missing or malformed cookies are simply ignored.
	pub fn from_headers(headers: &HeaderMap) -> Option<Self>
	{
		headers
			.get_all(header::COOKIE)
			.into_iter()
			.flat_map(|value| value.to_str())
			.flat_map(|value| Cookie::split_parse_encoded(value.trim().to_owned()))
			.flatten()
			.filter(|cookie| cookie.name() == COOKIE_NAME)
			.find_map(|cookie| {
				let token = Self::decode(cookie.value());

				if token.is_none() {
					tracing::debug! {
						cookie.value = %cookie.value(),
						"found session cookie but failed to decode value",
					};
				}

				token
			})
	}

	/// Builds the cookie that stores this token.
	pub fn into_cookie(self) -> Cookie<'static>
	{
		Cookie::build((COOKIE_NAME, self.encode()))
			.path("/")
			.max_age(MAX_AGE)
			.secure(cfg!(feature = "production"))
			.http_only(true)
			.build()
	}

	/// Turns this token into a full profile.
	///
	/// The profile is fetched from Steam. If that fails, a minimal profile
	/// made up of the data in the cookie is returned instead.
	#[tracing::instrument(level = "debug", skip(steam))]
	pub async fn resolve(self, steam: &SteamApi) -> UserProfile
	{
		match steam.fetch_user(&self.steam_id).await {
			Ok(profile) => profile,
			Err(error) => {
				tracing::warn! {
					%error,
					steam_id = %self.steam_id,
					"failed to refresh profile; falling back to session cookie",
				};

				UserProfile::minimal(self.steam_id, self.display_name)
			}
		}
	}
}

impl IntoResponseParts for SessionToken
{
	type Error = Infallible;

	fn into_response_parts(self, mut response: ResponseParts) -> Result<ResponseParts, Infallible>
	{
		append_cookie(&mut response, &self.into_cookie());

		Ok(response)
	}
}

/// Expires the session cookie when returned as part of a response.
#[derive(Debug, Clone, Copy)]
pub struct ClearSession;

impl ClearSession
{
	/// Builds an empty, already expired session cookie.
	pub fn into_cookie(self) -> Cookie<'static>
	{
		Cookie::build((COOKIE_NAME, ""))
			.path("/")
			.max_age(time::Duration::seconds(-1))
			.expires(OffsetDateTime::UNIX_EPOCH)
			.secure(cfg!(feature = "production"))
			.http_only(true)
			.build()
	}
}

impl IntoResponseParts for ClearSession
{
	type Error = Infallible;

	fn into_response_parts(self, mut response: ResponseParts) -> Result<ResponseParts, Infallible>
	{
		append_cookie(&mut response, &self.into_cookie());

		Ok(response)
	}
}

/// Adds a `Set-Cookie` header to a response.
fn append_cookie(response: &mut ResponseParts, cookie: &Cookie<'_>)
{
	match HeaderValue::try_from(cookie.encoded().to_string()) {
		Ok(value) => {
			response.headers_mut().append(header::SET_COOKIE, value);
		}
		Err(error) => {
			tracing::error!(%error, cookie.name = %cookie.name(), "cookie is not a valid header");
		}
	}
}

/// The user making the current request, if they are logged in.
///
/// This never rejects a request; a missing or broken session cookie just means
/// nobody is logged in.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<UserProfile>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
	S: Send + Sync,
	SteamApi: FromRef<S>,
{
	type Rejection = Infallible;

	#[tracing::instrument(level = "debug", name = "session::current_user", skip_all)]
	async fn from_request_parts(
		request: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection>
	{
		let Some(token) = SessionToken::from_headers(&request.headers) else {
			return Ok(Self(None));
		};

		let steam = SteamApi::from_ref(state);

		Ok(Self(Some(token.resolve(&steam).await)))
	}
}
