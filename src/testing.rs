//! This module contains helpers for unit tests.
//!
//! Most of them revolve around [`MockSteam`], a tiny fake of the Steam
//! services we talk to, running on a random local port.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use tokio::net::TcpListener;
use url::Url;

use crate::config::{DEFAULT_STEAM_API_URL, DEFAULT_STEAM_OPENID_URL};
use crate::steam::openid::IDENTITY_PREFIX;
use crate::steam::UserProfile;
use crate::Config;

/// The API key [`MockSteam`] accepts.
pub const STEAM_API_KEY: &str = "0123456789ABCDEF0123456789ABCDEF";

/// A SteamID [`MockSteam`] knows about.
pub const STEAM_ID: &str = "76561198282622073";

/// A SteamID [`MockSteam`] returns no players for.
pub const UNKNOWN_STEAM_ID: &str = "76561197960265728";

/// A SteamID [`MockSteam`] returns garbage for.
pub const BROKEN_STEAM_ID: &str = "76561197960265729";

/// The only signature [`MockSteam`] considers valid.
const SIGNATURE: &str = "valid";

/// Global constructor that will run before tests.
#[ctor::ctor]
fn ctor()
{
	use tracing_subscriber::fmt::format::FmtSpan;
	use tracing_subscriber::EnvFilter;

	color_eyre::install().expect("failed to install color-eyre");
	tracing_subscriber::fmt()
		.compact()
		.with_ansi(true)
		.with_file(true)
		.with_level(true)
		.with_line_number(true)
		.with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
		.with_target(true)
		.with_test_writer()
		.with_thread_ids(true)
		.with_thread_names(true)
		.with_env_filter(EnvFilter::from_default_env())
		.init();
}

macro_rules! assert {
	($expr:expr $(, $($msg:tt)*)?) => {
		::color_eyre::eyre::ensure!($expr $(, $($msg)*)?)
	};
}

macro_rules! assert_eq {
	($lhs:expr, $rhs:expr $(,)?) => {
		match (&$lhs, &$rhs) {
			(lhs, rhs) => {
				if lhs != rhs {
					::color_eyre::eyre::bail!(
						"assertion `{} == {}` failed\n  lhs: {:?}\n  rhs: {:?}",
						stringify!($lhs),
						stringify!($rhs),
						lhs,
						rhs,
					);
				}
			}
		}
	};
	($lhs:expr, $rhs:expr, $($msg:tt)+) => {
		match (&$lhs, &$rhs) {
			(lhs, rhs) => {
				if lhs != rhs {
					::color_eyre::eyre::bail!(
						"assertion `{} == {}` failed ({})\n  lhs: {:?}\n  rhs: {:?}",
						stringify!($lhs),
						stringify!($rhs),
						format_args!($($msg)+),
						lhs,
						rhs,
					);
				}
			}
		}
	};
}

macro_rules! assert_matches {
	($expr:expr, $pat:pat $(if $cond:expr)? $(, $($msg:tt)*)?) => {
		::color_eyre::eyre::ensure!(matches!($expr, $pat $(if $cond)?) $(, $($msg)*)?)
	};
}

pub(crate) use {assert, assert_eq, assert_matches};

/// A configuration that doesn't point anywhere real.
pub fn config() -> Config
{
	Config {
		addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
		steam_api_key: Some(String::from(STEAM_API_KEY)),
		steam_api_url: DEFAULT_STEAM_API_URL.parse().unwrap(),
		steam_openid_url: DEFAULT_STEAM_OPENID_URL.parse().unwrap(),
		static_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/static")),
		log_dir: None,
	}
}

/// The profile [`MockSteam`] returns for `steam_id`.
pub fn fresh_profile(steam_id: &str) -> UserProfile
{
	UserProfile {
		steam_id: steam_id.to_owned(),
		persona_name: String::from("AlphaKeks"),
		profile_url: format!("https://steamcommunity.com/profiles/{steam_id}/"),
		avatar: String::from("https://avatars.steamstatic.com/mock.jpg"),
		avatar_medium: String::from("https://avatars.steamstatic.com/mock_medium.jpg"),
		avatar_full: String::from("https://avatars.steamstatic.com/mock_full.jpg"),
	}
}

/// Generates a fresh, unique response nonce.
pub fn nonce() -> String
{
	static COUNTER: AtomicUsize = AtomicUsize::new(0);

	let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
	let n = COUNTER.fetch_add(1, Ordering::Relaxed);

	format!("{timestamp}{n:06}")
}

/// Returns a URL nothing is listening on.
pub async fn unreachable_url() -> color_eyre::Result<Url>
{
	let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
	let addr = listener.local_addr()?;

	drop(listener);

	Ok(format!("http://{addr}/").parse()?)
}

/// Collects a response body into a string.
pub async fn body_text(body: Body) -> color_eyre::Result<String>
{
	let bytes = axum::body::to_bytes(body, usize::MAX).await?;

	Ok(String::from_utf8(bytes.to_vec())?)
}

/// A fake Steam.
///
/// Serves `GetPlayerSummaries`, the OpenID discovery document, and
/// `check_authentication`.
#[derive(Debug)]
pub struct MockSteam
{
	addr: SocketAddr,
	discovery_requests: Arc<AtomicUsize>,
}

/// State shared by [`MockSteam`]'s handlers.
#[derive(Debug, Clone)]
struct MockState
{
	addr: SocketAddr,
	discovery_requests: Arc<AtomicUsize>,
}

impl MockSteam
{
	/// Starts a new server on a random port.
	///
	/// It lives until the test's runtime shuts down.
	pub async fn spawn() -> color_eyre::Result<Self>
	{
		let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
		let addr = listener.local_addr()?;
		let discovery_requests = Arc::new(AtomicUsize::new(0));
		let state = MockState { addr, discovery_requests: Arc::clone(&discovery_requests) };

		let router = Router::new()
			.route("/ISteamUser/GetPlayerSummaries/v0002/", routing::get(player_summaries))
			.route("/openid", routing::get(discovery_document))
			.route("/openid/login", routing::post(check_authentication))
			.with_state(state);

		tokio::spawn(async move { axum::serve(listener, router).await });

		Ok(Self { addr, discovery_requests })
	}

	/// URL of the fake `GetPlayerSummaries` endpoint.
	pub fn api_url(&self) -> Url
	{
		format!("http://{}/ISteamUser/GetPlayerSummaries/v0002/", self.addr)
			.parse()
			.unwrap()
	}

	/// URL of the fake OpenID provider.
	pub fn openid_url(&self) -> Url
	{
		format!("http://{}/openid", self.addr).parse().unwrap()
	}

	/// A [`Config`] pointing at this server.
	pub fn config(&self) -> Config
	{
		Config { steam_api_url: self.api_url(), steam_openid_url: self.openid_url(), ..config() }
	}

	/// How often the discovery document has been requested.
	pub fn discovery_requests(&self) -> usize
	{
		self.discovery_requests.load(Ordering::SeqCst)
	}

	/// The URL Steam would redirect `steam_id` to after logging in on `host`.
	pub fn callback_url(&self, host: &str, steam_id: &str, nonce: &str) -> Url
	{
		self.callback_url_with(host, &format!("{IDENTITY_PREFIX}{steam_id}"), nonce)
	}

	/// Like [`MockSteam::callback_url()`], but with an arbitrary claimed
	/// identifier.
	pub fn callback_url_with(&self, host: &str, claimed_id: &str, nonce: &str) -> Url
	{
		let return_to = format!("http://{host}/login");
		let op_endpoint = format!("http://{}/openid/login", self.addr);
		let mut url = return_to.parse::<Url>().unwrap();

		url.query_pairs_mut()
			.append_pair("openid.ns", "http://specs.openid.net/auth/2.0")
			.append_pair("openid.mode", "id_res")
			.append_pair("openid.op_endpoint", &op_endpoint)
			.append_pair("openid.claimed_id", claimed_id)
			.append_pair("openid.identity", claimed_id)
			.append_pair("openid.return_to", &return_to)
			.append_pair("openid.response_nonce", nonce)
			.append_pair("openid.assoc_handle", "1234567890")
			.append_pair(
				"openid.signed",
				"signed,op_endpoint,claimed_id,identity,return_to,response_nonce,assoc_handle",
			)
			.append_pair("openid.sig", SIGNATURE);

		url
	}
}

#[derive(Debug, Deserialize)]
struct PlayerSummariesQuery
{
	key: String,
	steamids: String,
}

async fn player_summaries(Query(query): Query<PlayerSummariesQuery>) -> Response
{
	if query.key != STEAM_API_KEY {
		return (StatusCode::FORBIDDEN, "<html><body>Forbidden</body></html>").into_response();
	}

	match query.steamids.as_str() {
		UNKNOWN_STEAM_ID => Json(serde_json::json!({ "response": { "players": [] } })).into_response(),
		BROKEN_STEAM_ID => "<html>definitely not json</html>".into_response(),
		steam_id => {
			let players = [fresh_profile(steam_id)];

			Json(serde_json::json!({ "response": { "players": players } })).into_response()
		}
	}
}

async fn discovery_document(State(state): State<MockState>) -> String
{
	state.discovery_requests.fetch_add(1, Ordering::SeqCst);

	format!(
		r#"<?xml version="1.0" encoding="UTF-8"?>
<xrds:XRDS xmlns:xrds="xri://$xrds" xmlns="xri://$xrd*($v*2.0)">
	<XRD>
		<Service priority="0">
			<Type>http://specs.openid.net/auth/2.0/server</Type>
			<URI>http://{}/openid/login</URI>
		</Service>
	</XRD>
</xrds:XRDS>"#,
		state.addr,
	)
}

async fn check_authentication(body: String) -> &'static str
{
	let Ok(form) = serde_urlencoded::from_str::<HashMap<String, String>>(&body) else {
		return "ns:http://specs.openid.net/auth/2.0\nis_valid:false\n";
	};

	let mode = form.get("openid.mode").map(String::as_str);
	let sig = form.get("openid.sig").map(String::as_str);

	if mode == Some("check_authentication") && sig == Some(SIGNATURE) {
		"ns:http://specs.openid.net/auth/2.0\nis_valid:true\n"
	} else {
		"ns:http://specs.openid.net/auth/2.0\nis_valid:false\n"
	}
}
