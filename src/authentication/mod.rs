//! Everything related to logging in and out.
//!
//! Logging in happens in two phases, both on `/login`:
//!
//!    1. a plain request gets redirected to Steam
//!    2. Steam sends the user back with an OpenID assertion in the query
//!       string, which we verify before setting the session cookie
//!
//! See [`crate::steam::openid`] for the details of the second phase.

use axum::{routing, Router};

use crate::state::AppState;
use crate::steam::openid::RETURN_ROUTE;

pub mod handlers;

/// Returns a router with the `/login` and `/logout` routes.
pub fn router(state: AppState) -> Router
{
	Router::new()
		.route(RETURN_ROUTE, routing::get(handlers::login))
		.route("/logout", routing::get(handlers::logout))
		.with_state(state)
}
