//! Replay protection for OpenID assertions.
//!
//! Every positive assertion carries a `openid.response_nonce` that starts with
//! the time it was issued at, e.g. `2024-06-01T12:00:00Zk2Ld0E`. A nonce may only
//! ever be accepted once per endpoint, and only while it is fresh.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Keeps track of nonces we have already seen.
///
/// Implementations must be safe to share between concurrent logins.
pub trait NonceStore: Send + Sync + 'static
{
	/// Checks that `nonce` has not been used with `endpoint` before, and
	/// remembers it so it can't be used again.
	fn accept(&self, endpoint: &str, nonce: &str) -> Result<(), NonceError>;
}

/// The reasons a nonce can be rejected for.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NonceError
{
	/// The nonce does not start with an RFC 3339 UTC timestamp.
	#[error("malformed response nonce")]
	Malformed,

	/// The nonce's timestamp is too far away from our clock.
	#[error("response nonce has expired")]
	Expired,

	/// The nonce has already been accepted once.
	#[error("response nonce has already been used")]
	Replayed,
}

/// A [`NonceStore`] that keeps everything in memory.
///
/// Nonces older than the maximum age are pruned whenever a new nonce comes in,
/// and endpoints without any fresh nonces are forgotten.
#[derive(Debug)]
pub struct InMemoryNonceStore
{
	/// How far a nonce's timestamp may be from the current time.
	max_age: Duration,

	/// Accepted nonces, keyed by endpoint.
	seen: Mutex<HashMap<String, Vec<(DateTime<Utc>, String)>>>,
}

impl InMemoryNonceStore
{
	/// The default maximum age of a nonce.
	pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(60);

	/// Creates a new, empty [`InMemoryNonceStore`].
	pub fn new(max_age: Duration) -> Self
	{
		Self { max_age, seen: Mutex::default() }
	}

	/// Like [`NonceStore::accept()`], but with an explicit "current time".
	fn accept_at(&self, endpoint: &str, nonce: &str, now: DateTime<Utc>) -> Result<(), NonceError>
	{
		let issued_at = parse_timestamp(nonce).ok_or(NonceError::Malformed)?;

		if !self.is_fresh(issued_at, now) {
			return Err(NonceError::Expired);
		}

		let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);

		seen.retain(|_, nonces| {
			nonces.retain(|&(issued_at, _)| self.is_fresh(issued_at, now));
			!nonces.is_empty()
		});

		let nonces = seen.entry(endpoint.to_owned()).or_default();

		if nonces.iter().any(|(_, seen)| seen == nonce) {
			return Err(NonceError::Replayed);
		}

		nonces.push((issued_at, nonce.to_owned()));

		Ok(())
	}

	/// Checks whether `issued_at` is within [`max_age`] of `now`, in either
	/// direction.
	///
	/// [`max_age`]: InMemoryNonceStore::max_age
	fn is_fresh(&self, issued_at: DateTime<Utc>, now: DateTime<Utc>) -> bool
	{
		let age = now.signed_duration_since(issued_at);
		let too_old = age.to_std().is_ok_and(|age| age > self.max_age);
		let too_new = (-age).to_std().is_ok_and(|skew| skew > self.max_age);

		!too_old && !too_new
	}
}

impl Default for InMemoryNonceStore
{
	fn default() -> Self
	{
		Self::new(Self::DEFAULT_MAX_AGE)
	}
}

impl NonceStore for InMemoryNonceStore
{
	#[tracing::instrument(level = "trace", skip(self), err(Debug, level = "debug"))]
	fn accept(&self, endpoint: &str, nonce: &str) -> Result<(), NonceError>
	{
		self.accept_at(endpoint, nonce, Utc::now())
	}
}

/// Extracts the timestamp at the start of a nonce.
fn parse_timestamp(nonce: &str) -> Option<DateTime<Utc>>
{
	let timestamp = nonce.get(..20)?;

	DateTime::parse_from_rfc3339(timestamp)
		.ok()
		.map(|timestamp| timestamp.with_timezone(&Utc))
}

#[cfg(test)]
mod tests
{
	use std::sync::{Arc, Barrier};
	use std::thread;

	use chrono::TimeZone;

	use super::*;

	const ENDPOINT: &str = "https://steamcommunity.com/openid/login";

	fn noon() -> DateTime<Utc>
	{
		Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
	}

	#[test]
	fn accepts_fresh_nonce_once()
	{
		let store = InMemoryNonceStore::default();
		let nonce = "2024-06-01T11:59:30Zabc";

		assert_eq!(store.accept_at(ENDPOINT, nonce, noon()), Ok(()), "fresh nonce rejected");
		assert_eq!(
			store.accept_at(ENDPOINT, nonce, noon()),
			Err(NonceError::Replayed),
			"replay accepted",
		);
	}

	#[test]
	fn same_nonce_on_other_endpoint_is_fine()
	{
		let store = InMemoryNonceStore::default();
		let nonce = "2024-06-01T12:00:00Zabc";

		assert_eq!(store.accept_at(ENDPOINT, nonce, noon()), Ok(()), "first endpoint");
		assert_eq!(store.accept_at("https://example.org/op", nonce, noon()), Ok(()), "second endpoint");
	}

	#[test]
	fn rejects_stale_and_future_nonces()
	{
		let store = InMemoryNonceStore::default();

		assert_eq!(
			store.accept_at(ENDPOINT, "2024-06-01T11:58:00Zabc", noon()),
			Err(NonceError::Expired),
			"stale nonce accepted",
		);

		assert_eq!(
			store.accept_at(ENDPOINT, "2024-06-01T12:05:00Zabc", noon()),
			Err(NonceError::Expired),
			"future nonce accepted",
		);
	}

	#[test]
	fn rejects_malformed_nonces()
	{
		let store = InMemoryNonceStore::default();

		for nonce in ["", "abc", "2024-06-01 12:00:00 abc", "2024-13-01T12:00:00Zabc"] {
			assert_eq!(
				store.accept_at(ENDPOINT, nonce, noon()),
				Err(NonceError::Malformed),
				"`{nonce}` accepted",
			);
		}
	}

	#[test]
	fn old_nonces_are_pruned()
	{
		let store = InMemoryNonceStore::default();
		let nonce = "2024-06-01T12:00:00Zabc";

		assert_eq!(store.accept_at(ENDPOINT, nonce, noon()), Ok(()), "fresh nonce rejected");

		let later = noon() + chrono::TimeDelta::try_minutes(5).unwrap();
		let other = "2024-06-01T12:05:00Zdef";

		assert_eq!(store.accept_at(ENDPOINT, other, later), Ok(()), "second nonce rejected");

		let seen = store.seen.lock().unwrap();

		assert_eq!(seen[ENDPOINT].len(), 1, "stale nonce was not pruned");
	}

	#[test]
	fn stale_endpoints_are_forgotten()
	{
		let store = InMemoryNonceStore::default();
		let other_endpoint = "https://example.org/op";

		assert_eq!(
			store.accept_at(other_endpoint, "2024-06-01T12:00:00Zabc", noon()),
			Ok(()),
			"fresh nonce rejected",
		);

		let later = noon() + chrono::TimeDelta::try_minutes(5).unwrap();

		assert_eq!(
			store.accept_at(ENDPOINT, "2024-06-01T12:05:00Zdef", later),
			Ok(()),
			"second nonce rejected",
		);

		let seen = store.seen.lock().unwrap();

		assert!(!seen.contains_key(other_endpoint), "stale endpoint was not removed");
		assert_eq!(seen.len(), 1, "wrong number of endpoints");
	}

	#[test]
	fn concurrent_replay_is_rejected()
	{
		const THREADS: usize = 8;

		let store = Arc::new(InMemoryNonceStore::default());
		let barrier = Arc::new(Barrier::new(THREADS));
		let nonce = "2024-06-01T12:00:00Zsame";

		let handles = (0..THREADS)
			.map(|_| {
				let store = Arc::clone(&store);
				let barrier = Arc::clone(&barrier);

				thread::spawn(move || {
					barrier.wait();
					store.accept_at(ENDPOINT, nonce, noon())
				})
			})
			.collect::<Vec<_>>();

		let results = handles
			.into_iter()
			.map(|handle| handle.join().unwrap())
			.collect::<Vec<_>>();

		let accepted = results.iter().filter(|result| result.is_ok()).count();
		let replayed = results
			.iter()
			.filter(|&result| *result == Err(NonceError::Replayed))
			.count();

		assert_eq!(accepted, 1, "nonce accepted {accepted} times");
		assert_eq!(replayed, THREADS - 1, "unexpected rejections: {results:?}");
	}
}
