//! Runtime errors.
//!
//! This module exposes the [`Error`] type that is returned from HTTP handlers
//! when something goes wrong while serving a request. Every [`Error`] carries
//! the [kind] of failure and the source code location it was created at.
//!
//! [`Error`] implements [`IntoResponse`]. There is nothing a client could do to
//! fix any of these errors, so they all produce a `500 Internal Server Error`.
//! The body is a human-readable message, except for template errors, which are
//! only logged.
//!
//! [`Error`]: struct@Error
//! [kind]: ErrorKind

use std::fmt::{self, Formatter};
use std::panic::Location;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::steam::openid::VerifyError;
use crate::steam::user::FetchUserError;

/// Type alias for a [`Result<T, E>`] with its `E` parameter set to [`Error`].
///
/// [`Result`]: std::result::Result
/// [`Error`]: struct@Error
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The website's core error type.
#[derive(Debug, Error)]
pub struct Error
{
	/// The kind of error that occurred.
	kind: ErrorKind,

	/// The source code location of where the error occurred.
	location: Location<'static>,
}

impl fmt::Display for Error
{
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
	{
		write!(f, "[{}] {}", self.location, self.kind)
	}
}

/// The different kinds of errors that can occur while handling a request.
#[derive(Debug, Error)]
pub enum ErrorKind
{
	/// Steam rejected, or we could not verify, an OpenID assertion.
	#[error("Steam authentication failed: {0}")]
	Verification(#[from] VerifyError),

	/// We could not fetch a user's profile from the Steam Web API.
	#[error("Failed to get Steam user info: {0}")]
	FetchUser(#[from] FetchUserError),

	/// We could not build the URL to send a user to for logging in.
	#[error("Failed to build Steam login url: {0}")]
	LoginUrl(#[from] serde_urlencoded::ser::Error),

	/// A page template failed to render.
	#[error("failed to render template")]
	RenderTemplate(#[from] askama::Error),
}

impl Error
{
	/// Creates a new [`Error`] of the given [`ErrorKind`].
	///
	/// [`Error`]: struct@Error
	#[track_caller]
	fn new<E>(kind: E) -> Self
	where
		E: Into<ErrorKind>,
	{
		Self { kind: kind.into(), location: *Location::caller() }
	}

	/// The kind of error that occurred.
	pub fn kind(&self) -> &ErrorKind
	{
		&self.kind
	}
}

impl IntoResponse for Error
{
	fn into_response(self) -> Response
	{
		match self.kind {
			ErrorKind::RenderTemplate(ref error) => {
				tracing::error!(location = %self.location, %error, "failed to render template");

				StatusCode::INTERNAL_SERVER_ERROR.into_response()
			}
			ref kind => {
				let message = kind.to_string();

				tracing::error!(location = %self.location, %message, "internal server error occurred");

				(StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
			}
		}
	}
}

impl From<VerifyError> for Error
{
	#[track_caller]
	fn from(error: VerifyError) -> Self
	{
		Self::new(error)
	}
}

impl From<FetchUserError> for Error
{
	#[track_caller]
	fn from(error: FetchUserError) -> Self
	{
		Self::new(error)
	}
}

impl From<serde_urlencoded::ser::Error> for Error
{
	#[track_caller]
	fn from(error: serde_urlencoded::ser::Error) -> Self
	{
		Self::new(error)
	}
}

impl From<askama::Error> for Error
{
	#[track_caller]
	fn from(error: askama::Error) -> Self
	{
		Self::new(error)
	}
}
