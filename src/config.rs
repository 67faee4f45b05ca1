//! This module contains the [`Config`] struct - a set of configuration options
//! that will be read from the environment on startup.
//!
//! See the `.env.example` file in the root of the repository for all the
//! relevant variables and example values.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::{env, fmt};

use thiserror::Error;
use url::Url;

/// Steam Web API endpoint for fetching player summaries.
pub const DEFAULT_STEAM_API_URL: &str =
	"https://api.steampowered.com/ISteamUser/GetPlayerSummaries/v0002/";

/// Steam's OpenID provider URL.
///
/// The provider's discovery document lives here.
pub const DEFAULT_STEAM_OPENID_URL: &str = "https://steamcommunity.com/openid";

/// The website's runtime configuration.
#[derive(Clone)]
pub struct Config
{
	/// The IP address and port to listen on.
	pub addr: SocketAddr,

	/// Steam Web API key.
	///
	/// This is optional on startup; requests that need it will fail instead.
	pub steam_api_key: Option<String>,

	/// The endpoint used for fetching user profiles.
	pub steam_api_url: Url,

	/// The OpenID provider URL used for discovery.
	pub steam_openid_url: Url,

	/// Directory containing files served under `/static`.
	pub static_dir: PathBuf,

	/// Directory for log files.
	///
	/// If this is [`None`], logs are only written to stderr.
	pub log_dir: Option<PathBuf>,
}

/// Error that can occur while initializing the [`Config`].
#[derive(Debug, Error)]
pub enum InitializeConfigError
{
	/// An environment variable was set but contained invalid UTF-8.
	#[error("failed to read environment variable `{var}`: {source}")]
	Env
	{
		/// The environment variable we tried to read.
		var: &'static str,

		/// The original error we got from [`std::env::var()`].
		source: env::VarError,
	},

	/// A configuration option could not be parsed into the required type.
	#[error("failed to parse configuration value `{var}`: {source}")]
	Parse
	{
		/// The environment variable containing the value.
		var: &'static str,

		/// The parsing error.
		source: Box<dyn std::error::Error + Send + Sync + 'static>,
	},
}

impl Config
{
	/// Initializes a [`Config`] by reading and parsing environment variables.
	#[tracing::instrument(err(Debug))]
	pub fn new() -> Result<Self, InitializeConfigError>
	{
		let ip_addr = parse_from_env_opt::<IpAddr>("IP_ADDR")?
			.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

		let port = parse_from_env_opt::<u16>("PORT")?.unwrap_or(8080);
		let steam_api_key = parse_from_env_opt::<String>("STEAM_API_KEY")?;
		let steam_api_url = match parse_from_env_opt::<Url>("STEAM_API_URL")? {
			Some(url) => url,
			None => default_url("STEAM_API_URL", DEFAULT_STEAM_API_URL)?,
		};

		let steam_openid_url = match parse_from_env_opt::<Url>("STEAM_OPENID_URL")? {
			Some(url) => url,
			None => default_url("STEAM_OPENID_URL", DEFAULT_STEAM_OPENID_URL)?,
		};

		let static_dir =
			parse_from_env_opt::<PathBuf>("STATIC_DIR")?.unwrap_or_else(|| PathBuf::from("static"));

		let log_dir = parse_from_env_opt::<PathBuf>("LOG_DIR")?;

		Ok(Self {
			addr: SocketAddr::new(ip_addr, port),
			steam_api_key,
			steam_api_url,
			steam_openid_url,
			static_dir,
			log_dir,
		})
	}
}

impl fmt::Debug for Config
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
	{
		f.debug_struct("Config")
			.field("addr", &format_args!("{}", self.addr))
			.field("steam_api_key", &self.steam_api_key.as_ref().map(|_| "*****"))
			.field("steam_api_url", &format_args!("{:?}", self.steam_api_url.as_str()))
			.field("steam_openid_url", &format_args!("{:?}", self.steam_openid_url.as_str()))
			.field("static_dir", &self.static_dir)
			.field("log_dir", &self.log_dir)
			.finish()
	}
}

/// Parses one of the hard-coded default URLs.
fn default_url(var: &'static str, url: &str) -> Result<Url, InitializeConfigError>
{
	url.parse::<Url>()
		.map_err(|error| InitializeConfigError::Parse { var, source: Box::new(error) })
}

/// Reads and parses an environment variable.
///
/// Returns [`None`] if a variable does not exist or is empty.
fn parse_from_env_opt<T>(var: &'static str) -> Result<Option<T>, InitializeConfigError>
where
	T: FromStr<Err: std::error::Error + Send + Sync + 'static>,
{
	let value = match env::var(var) {
		Ok(value) => value,
		Err(env::VarError::NotPresent) => return Ok(None),
		Err(source) => return Err(InitializeConfigError::Env { var, source }),
	};

	if value.is_empty() {
		return Ok(None);
	}

	value
		.parse::<T>()
		.map(Some)
		.map_err(|error| InitializeConfigError::Parse { var, source: Box::new(error) })
}
