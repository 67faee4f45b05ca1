//! OpenID provider discovery.
//!
//! A provider publishes an XRDS document describing where its OpenID endpoint
//! lives. We only ever talk to one provider, so the document is fetched once
//! and then served from a [`DiscoveryCache`].

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use reqwest::header;
use thiserror::Error;
use url::Url;

/// The information we extract from a provider's discovery document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider
{
	/// The URL assertions are issued by and verified at.
	pub endpoint: Url,
}

/// The `<Type>` of a service that is an OpenID 2.0 provider endpoint.
const SERVER_TYPE: &str = "http://specs.openid.net/auth/2.0/server";

impl Provider
{
	/// Extracts the provider endpoint from an XRDS document.
	///
	/// Only `<Service>`s of type [`SERVER_TYPE`] are considered. If there are
	/// multiple, the one with the lowest `priority` wins, and services without
	/// a priority come last.
	pub fn from_xrds(document: &str) -> Option<Self>
	{
		elements(document, "Service")
			.filter(|(_, service)| {
				elements(service, "Type").any(|(_, kind)| decode_entities(kind.trim()) == SERVER_TYPE)
			})
			.filter_map(|(attributes, service)| {
				let endpoint = elements(service, "URI")
					.find_map(|(_, uri)| decode_entities(uri.trim()).parse::<Url>().ok())?;

				Some((priority(attributes), endpoint))
			})
			.min_by_key(|&(priority, _)| priority)
			.map(|(_, endpoint)| Self { endpoint })
	}
}

/// Iterates over every `<tag>` element in `document`, yielding its attributes
/// and its content.
///
/// Nested elements of the same name are not supported.
fn elements<'a>(document: &'a str, tag: &str) -> impl Iterator<Item = (&'a str, &'a str)>
{
	let open = format!("<{tag}");
	let close = format!("</{tag}>");
	let mut rest = document;

	std::iter::from_fn(move || loop {
		let (_, tail) = rest.split_once(open.as_str())?;
		let (attributes, tail) = tail.split_once('>')?;

		// `<ServiceFoo>` or `<Service/>`
		if !attributes.is_empty() && !attributes.starts_with(char::is_whitespace) {
			rest = tail;
			continue;
		}

		let (content, tail) = tail.split_once(close.as_str())?;

		rest = tail;

		return Some((attributes, content));
	})
}

/// Extracts the `priority` attribute, mapping a missing one to the lowest
/// possible priority.
fn priority(attributes: &str) -> u32
{
	attributes
		.split_once("priority=")
		.and_then(|(_, value)| {
			let quote = value.chars().next().filter(|&c| c == '"' || c == '\'')?;
			let (value, _) = value.get(1..)?.split_once(quote)?;

			value.parse().ok()
		})
		.unwrap_or(u32::MAX)
}

/// Decodes the predefined XML entities.
fn decode_entities(text: &str) -> Cow<'_, str>
{
	if !text.contains('&') {
		return Cow::Borrowed(text);
	}

	Cow::Owned(
		text.replace("&lt;", "<")
			.replace("&gt;", ">")
			.replace("&quot;", "\"")
			.replace("&apos;", "'")
			.replace("&amp;", "&"),
	)
}

/// Caches discovered [`Provider`]s by the URL they were discovered at.
///
/// Implementations must be safe to share between concurrent logins.
pub trait DiscoveryCache: Send + Sync + 'static
{
	/// Returns the cached provider for `provider_url`, if any.
	fn get(&self, provider_url: &Url) -> Option<Provider>;

	/// Caches `provider` for `provider_url`.
	fn insert(&self, provider_url: &Url, provider: Provider);
}

/// A [`DiscoveryCache`] that keeps everything in memory, forever.
#[derive(Debug, Default)]
pub struct InMemoryDiscoveryCache
{
	/// Discovered providers.
	providers: RwLock<HashMap<Url, Provider>>,
}

impl DiscoveryCache for InMemoryDiscoveryCache
{
	fn get(&self, provider_url: &Url) -> Option<Provider>
	{
		self.providers
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.get(provider_url)
			.cloned()
	}

	fn insert(&self, provider_url: &Url, provider: Provider)
	{
		self.providers
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(provider_url.clone(), provider);
	}
}

/// The errors that can occur during discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError
{
	/// We failed to fetch the discovery document.
	#[error("failed to fetch discovery document: {0}")]
	Http(#[from] reqwest::Error),

	/// The discovery document didn't contain an endpoint.
	#[error("discovery document does not contain an endpoint")]
	MissingEndpoint,
}

/// Fetches and parses the discovery document at `provider_url`.
#[tracing::instrument(level = "debug", skip(http_client), err(Debug, level = "debug"))]
pub(super) async fn discover(
	http_client: &reqwest::Client,
	provider_url: &Url,
) -> Result<Provider, DiscoveryError>
{
	let document = http_client
		.get(provider_url.clone())
		.header(header::ACCEPT, "application/xrds+xml")
		.send()
		.await
		.and_then(reqwest::Response::error_for_status)?
		.text()
		.await?;

	let provider = Provider::from_xrds(&document).ok_or(DiscoveryError::MissingEndpoint)?;

	tracing::debug!(endpoint = provider.endpoint.as_str(), "discovered openid endpoint");

	Ok(provider)
}
