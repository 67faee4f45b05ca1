//! OpenID authentication.
//!
//! Steam can act as an OpenID 2.0 authentication provider. The procedure looks
//! like this:
//!
//! 1. redirect the user to Steam with a [`LoginForm`] encoded as query
//!    parameters
//! 2. the user will login as usual
//! 3. Steam redirects the user back to the `return_to` URL of the form, with a
//!    signed assertion encoded in the query parameters
//! 4. we [verify] the assertion:
//!    - it must be meant for us (`openid.return_to`)
//!    - it must come from the endpoint we [discovered]
//!    - Steam must confirm the signature (`check_authentication`)
//!    - its nonce must not have been used before (see [`NonceStore`])
//! 5. we extract the user's SteamID from the claimed identifier
//!
//! [verify]: OpenId::verify
//! [discovered]: discovery

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub mod nonce;
pub use nonce::{InMemoryNonceStore, NonceError, NonceStore};

pub mod discovery;
pub use discovery::{DiscoveryCache, DiscoveryError, InMemoryDiscoveryCache, Provider};

/// The OpenID 2.0 namespace.
const NAMESPACE: &str = "http://specs.openid.net/auth/2.0";

/// Placeholder that lets the provider pick the identity.
const IDENTIFIER_SELECT: &str = "http://specs.openid.net/auth/2.0/identifier_select";

/// Every claimed identifier Steam issues starts with this, followed by the
/// user's SteamID64.
pub const IDENTITY_PREFIX: &str = "https://steamcommunity.com/openid/id/";

/// The route Steam should send users back to after logging in.
pub const RETURN_ROUTE: &str = "/login";

/// Form parameters that will be sent to Steam when redirecting a user for
/// login.
#[derive(Debug, Serialize)]
#[allow(clippy::missing_docs_in_private_items)]
pub struct LoginForm
{
	#[serde(rename = "openid.ns")]
	namespace: &'static str,

	#[serde(rename = "openid.mode")]
	mode: &'static str,

	#[serde(rename = "openid.return_to")]
	return_to: String,

	#[serde(rename = "openid.realm")]
	realm: String,

	#[serde(rename = "openid.identity")]
	identity: &'static str,

	#[serde(rename = "openid.claimed_id")]
	claimed_id: &'static str,
}

impl LoginForm
{
	/// Creates a new [`LoginForm`] for a request that was sent to `host`.
	///
	/// The realm is the site's origin, and Steam will send the user back to
	/// [`RETURN_ROUTE`].
	#[tracing::instrument(level = "trace", name = "LoginForm::new")]
	pub fn new(host: &str) -> Self
	{
		let realm = format!("http://{host}");
		let return_to = format!("{realm}{RETURN_ROUTE}");

		Self {
			namespace: NAMESPACE,
			mode: "checkid_setup",
			return_to,
			realm,
			identity: IDENTIFIER_SELECT,
			claimed_id: IDENTIFIER_SELECT,
		}
	}

	/// Generates the URL on `login_url` that the user should be redirected to.
	#[tracing::instrument(level = "trace", name = "LoginForm::redirect_url", skip(self))]
	pub fn redirect_url(&self, login_url: &Url) -> Result<Url, serde_urlencoded::ser::Error>
	{
		let query_string = serde_urlencoded::to_string(self)?;
		let mut url = login_url.clone();

		url.set_query(Some(&query_string));

		Ok(url)
	}
}

/// Form parameters that Steam will send to us after a successful login.
#[derive(Debug, Serialize, Deserialize)]
#[allow(clippy::missing_docs_in_private_items)]
pub struct OpenIdPayload
{
	#[serde(rename = "openid.ns")]
	namespace: String,

	#[serde(rename = "openid.mode")]
	mode: String,

	#[serde(rename = "openid.op_endpoint")]
	op_endpoint: String,

	#[serde(rename = "openid.claimed_id")]
	claimed_id: String,

	#[serde(rename = "openid.identity")]
	identity: Option<String>,

	#[serde(rename = "openid.return_to")]
	return_to: String,

	#[serde(rename = "openid.response_nonce")]
	response_nonce: String,

	#[serde(rename = "openid.invalidate_handle")]
	invalidate_handle: Option<String>,

	#[serde(rename = "openid.assoc_handle")]
	assoc_handle: String,

	#[serde(rename = "openid.signed")]
	signed: String,

	#[serde(rename = "openid.sig")]
	sig: String,
}

/// The fields every OpenID response has, positive or not.
#[derive(Debug, Deserialize)]
#[allow(clippy::missing_docs_in_private_items)]
struct PayloadHeader
{
	#[serde(rename = "openid.ns")]
	namespace: String,

	#[serde(rename = "openid.mode")]
	mode: String,
}

/// The errors that can occur when verifying an OpenID assertion.
#[derive(Debug, Error)]
pub enum VerifyError
{
	/// The callback URL we reconstructed from the request was not a valid URL.
	#[error("invalid callback url: {0}")]
	InvalidCallbackUrl(#[from] url::ParseError),

	/// The query string did not contain a complete assertion.
	#[error("malformed assertion: {0}")]
	MalformedPayload(#[from] serde_urlencoded::de::Error),

	/// The assertion was not an OpenID 2.0 assertion.
	#[error("unsupported namespace `{0}`")]
	UnsupportedNamespace(String),

	/// The user cancelled the login on Steam's side.
	#[error("login was cancelled")]
	Cancelled,

	/// The assertion was not a positive assertion.
	#[error("unexpected mode `{0}`")]
	UnexpectedMode(String),

	/// The assertion was meant for a different URL.
	#[error("`openid.return_to` does not match the callback url")]
	ReturnToMismatch,

	/// We could not figure out the provider's endpoint.
	#[error(transparent)]
	Discovery(#[from] DiscoveryError),

	/// The assertion claims to come from somewhere we didn't discover.
	#[error("assertion was not issued by the discovered endpoint")]
	EndpointMismatch,

	/// We failed to ask Steam to check the assertion's signature.
	#[error("failed to make http request to Steam: {0}")]
	Http(#[from] reqwest::Error),

	/// Steam did not confirm the assertion.
	#[error("Steam did not confirm the assertion")]
	InvalidSignature,

	/// The assertion's nonce was rejected.
	#[error(transparent)]
	Nonce(#[from] NonceError),

	/// The claimed identifier is not a Steam account.
	#[error("`{0}` is not a Steam identity")]
	NotASteamIdentity(String),
}

/// Steam as an OpenID provider.
///
/// This holds everything that must live as long as the process: the nonce
/// store and the discovery cache.
#[derive(Clone)]
#[allow(clippy::missing_docs_in_private_items)]
pub struct OpenId
{
	http_client: reqwest::Client,
	provider_url: Arc<Url>,
	login_url: Arc<Url>,
	nonce_store: Arc<dyn NonceStore>,
	discovery_cache: Arc<dyn DiscoveryCache>,
}

impl fmt::Debug for OpenId
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
	{
		f.debug_struct("OpenId")
			.field("provider_url", &format_args!("{:?}", self.provider_url.as_str()))
			.field("login_url", &format_args!("{:?}", self.login_url.as_str()))
			.finish_non_exhaustive()
	}
}

impl OpenId
{
	/// Creates a new [`OpenId`] for the provider at `provider_url`.
	///
	/// Users are sent to `<provider_url>/login` to log in.
	pub fn new(
		http_client: reqwest::Client,
		provider_url: Url,
		nonce_store: Arc<dyn NonceStore>,
		discovery_cache: Arc<dyn DiscoveryCache>,
	) -> Result<Self, url::ParseError>
	{
		let login_url = format!("{}/login", provider_url.as_str().trim_end_matches('/')).parse()?;

		Ok(Self {
			http_client,
			provider_url: Arc::new(provider_url),
			login_url: Arc::new(login_url),
			nonce_store,
			discovery_cache,
		})
	}

	/// Generates the URL a user visiting `host` should be sent to for logging
	/// in.
	#[tracing::instrument(
		level = "debug",
		skip(self),
		ret(Display, level = "debug"),
		err(Debug, level = "debug"),
	)]
	pub fn login_url(&self, host: &str) -> Result<Url, serde_urlencoded::ser::Error>
	{
		LoginForm::new(host).redirect_url(&self.login_url)
	}

	/// Verifies the assertion Steam sent to `callback_url` and returns the
	/// user's SteamID.
	#[tracing::instrument(
		level = "debug",
		skip_all,
		fields(callback_url = callback_url.as_str()),
		err(Debug, level = "debug"),
	)]
	pub async fn verify(&self, callback_url: &Url) -> Result<String, VerifyError>
	{
		let query = callback_url.query().unwrap_or_default();
		let header = serde_urlencoded::from_str::<PayloadHeader>(query)?;

		if header.namespace != NAMESPACE {
			return Err(VerifyError::UnsupportedNamespace(header.namespace));
		}

		match header.mode.as_str() {
			"id_res" => {}
			"cancel" => return Err(VerifyError::Cancelled),
			_ => return Err(VerifyError::UnexpectedMode(header.mode)),
		}

		let mut payload = serde_urlencoded::from_str::<OpenIdPayload>(query)?;

		if !payload
			.return_to
			.parse::<Url>()
			.is_ok_and(|return_to| same_location(&return_to, callback_url))
		{
			return Err(VerifyError::ReturnToMismatch);
		}

		let provider = self.provider().await?;

		if payload.op_endpoint.parse::<Url>().ok().as_ref() != Some(&provider.endpoint) {
			return Err(VerifyError::EndpointMismatch);
		}

		payload.mode = String::from("check_authentication");

		let response = self
			.http_client
			.post(provider.endpoint.clone())
			.form(&payload)
			.send()
			.await
			.and_then(reqwest::Response::error_for_status)?
			.text()
			.await?;

		if response
			.lines()
			.rfind(|&line| line == "is_valid:true")
			.is_none()
		{
			tracing::debug!(%response, "steam login invalid");
			return Err(VerifyError::InvalidSignature);
		}

		self.nonce_store
			.accept(provider.endpoint.as_str(), &payload.response_nonce)?;

		let steam_id = payload
			.claimed_id
			.strip_prefix(IDENTITY_PREFIX)
			.filter(|steam_id| !steam_id.is_empty())
			.ok_or_else(|| VerifyError::NotASteamIdentity(payload.claimed_id.clone()))?;

		tracing::debug!(steam_id, "user logged in");

		Ok(steam_id.to_owned())
	}

	/// Returns the provider, discovering it first if it isn't cached yet.
	async fn provider(&self) -> Result<Provider, DiscoveryError>
	{
		if let Some(provider) = self.discovery_cache.get(&self.provider_url) {
			return Ok(provider);
		}

		let provider = discovery::discover(&self.http_client, &self.provider_url).await?;

		self.discovery_cache.insert(&self.provider_url, provider.clone());

		Ok(provider)
	}
}

/// Checks whether two URLs point at the same resource, ignoring query and
/// fragment.
fn same_location(a: &Url, b: &Url) -> bool
{
	a.scheme() == b.scheme()
		&& a.host() == b.host()
		&& a.port_or_known_default() == b.port_or_known_default()
		&& a.path() == b.path()
}
