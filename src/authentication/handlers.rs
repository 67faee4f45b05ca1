//! Handlers for the `/login` and `/logout` routes.

use axum::extract::State;
use axum::http::uri::{Authority, PathAndQuery};
use axum::http::{header, HeaderMap, HeaderName, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use url::Url;

use crate::session::{ClearSession, SessionToken};
use crate::steam::openid::VerifyError;
use crate::steam::{OpenId, SteamApi};
use crate::Result;

/// A `302 Found` redirect.
///
/// [`axum::response::Redirect`] only does `303` and `307`/`308`.
type Found = (StatusCode, [(HeaderName, String); 1]);

/// Redirects to `location` with a `302 Found`.
fn found(location: String) -> Found
{
	(StatusCode::FOUND, [(header::LOCATION, location)])
}

/// Log in with Steam.
///
/// Without an `openid.mode` in the query string, this redirects to Steam.
/// Steam will then send the user back here with an assertion, which is
/// verified before the user's profile is fetched and the session cookie is
/// set.
#[tracing::instrument(level = "debug", skip(openid, steam, headers), err(Debug, level = "debug"))]
pub async fn login(
	State(openid): State<OpenId>,
	State(steam): State<SteamApi>,
	headers: HeaderMap,
	uri: Uri,
) -> Result<Response>
{
	let Some(host) = request_host(&headers, &uri) else {
		return Ok((StatusCode::BAD_REQUEST, "missing host").into_response());
	};

	if !is_openid_callback(&uri) {
		let login_url = openid.login_url(host)?;

		tracing::debug!(%login_url, "redirecting user to steam");

		return Ok(found(login_url.into()).into_response());
	}

	let path_and_query = uri.path_and_query().map_or("/", PathAndQuery::as_str);
	let callback_url = format!("http://{host}{path_and_query}")
		.parse::<Url>()
		.map_err(VerifyError::from)?;

	let steam_id = openid.verify(&callback_url).await?;
	let profile = steam.fetch_user(&steam_id).await?;

	tracing::info!(steam_id = %profile.steam_id, name = %profile.persona_name, "user logged in");

	Ok((SessionToken::new(&profile), found(String::from("/"))).into_response())
}

/// Log out again.
///
/// This deletes the session cookie.
#[tracing::instrument(level = "debug")]
pub async fn logout() -> (ClearSession, Found)
{
	tracing::debug!("user logged out");

	(ClearSession, found(String::from("/")))
}

/// The host a request was sent to.
///
/// This is the `Host` header, or the URI's authority over HTTP/2. Proxy
/// headers like `X-Forwarded-Host` are client-controlled and not trusted.
fn request_host<'a>(headers: &'a HeaderMap, uri: &'a Uri) -> Option<&'a str>
{
	headers
		.get(header::HOST)
		.and_then(|host| host.to_str().ok())
		.or_else(|| uri.authority().map(Authority::as_str))
}

/// Checks whether a request to `/login` is Steam sending the user back to us.
fn is_openid_callback(uri: &Uri) -> bool
{
	uri.query().is_some_and(|query| {
		url::form_urlencoded::parse(query.as_bytes())
			.any(|(key, value)| key == "openid.mode" && !value.is_empty())
	})
}
