//! The website's pages.
//!
//! Every page is rendered from a template with a fresh [`PageData`], which
//! includes the [current user] if they are logged in.
//!
//! [current user]: CurrentUser

use askama::Template;
use axum::extract::RawQuery;
use axum::http::StatusCode;
use axum::response::Html;
use axum::{routing, Json, Router};
use chrono::Local;
use serde::Serialize;

use crate::session::CurrentUser;
use crate::state::AppState;
use crate::steam::UserProfile;
use crate::Result;

mod templates;
pub use templates::{AboutPage, ContactPage, HomePage, PrivacyPage, SearchPage, TermsPage};

/// How many placeholder results a search produces.
const SEARCH_RESULTS: usize = 3;

/// The view model every page template is rendered with.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PageData
{
	/// The page title.
	pub title: String,

	/// The page's main text.
	pub content: String,

	/// The logged-in user, if any.
	pub user: Option<UserProfile>,

	/// The search query, if this is a search page.
	pub query: Option<String>,

	/// Search results.
	pub results: Vec<String>,
}

impl PageData
{
	/// Creates a new [`PageData`] for a regular page.
	pub fn new(title: &str, content: &str, user: Option<UserProfile>) -> Self
	{
		Self { title: title.to_owned(), content: content.to_owned(), user, ..Self::default() }
	}

	/// Creates a new [`PageData`] for the search page.
	///
	/// There is nothing to search through yet, so the results are
	/// placeholders.
	pub fn search(query: String, user: Option<UserProfile>) -> Self
	{
		let results = (1..=SEARCH_RESULTS)
			.map(|n| format!("Result {n} for: {query}"))
			.collect();

		Self {
			title: String::from("Search"),
			content: String::new(),
			user,
			query: Some(query),
			results,
		}
	}
}

/// Returns a router with every page, plus `/api/time`.
pub fn router(state: AppState) -> Router
{
	Router::new()
		.route("/", routing::get(home))
		.route("/about", routing::get(about))
		.route("/contact", routing::get(contact))
		.route("/search", routing::get(search))
		.route("/terms", routing::get(terms))
		.route("/privacy", routing::get(privacy))
		.route("/api/time", routing::get(time))
		.with_state(state)
}

/// Renders a template into an HTML response.
fn render<T>(template: T) -> Result<Html<String>>
where
	T: Template,
{
	Ok(Html(template.render()?))
}

/// The home page.
#[tracing::instrument(level = "debug", skip_all, err(Debug, level = "debug"))]
pub async fn home(CurrentUser(user): CurrentUser) -> Result<Html<String>>
{
	render(HomePage { page: PageData::new("Home", "Welcome to my little corner of the internet.", user) })
}

/// The about page.
#[tracing::instrument(level = "debug", skip_all, err(Debug, level = "debug"))]
pub async fn about(CurrentUser(user): CurrentUser) -> Result<Html<String>>
{
	render(AboutPage {
		page: PageData::new(
			"About",
			"This is a small personal website. You can log in with your Steam account to see your profile.",
			user,
		),
	})
}

/// The contact page.
#[tracing::instrument(level = "debug", skip_all, err(Debug, level = "debug"))]
pub async fn contact(CurrentUser(user): CurrentUser) -> Result<Html<String>>
{
	render(ContactPage {
		page: PageData::new("Contact", "Reach out via my Steam profile if you want to get in touch.", user),
	})
}

/// The search page.
///
/// Only the first `q` in the query string counts; any further ones are
/// ignored.
#[tracing::instrument(level = "debug", skip(user), err(Debug, level = "debug"))]
pub async fn search(CurrentUser(user): CurrentUser, RawQuery(query): RawQuery) -> Result<Html<String>>
{
	let q = query
		.as_deref()
		.and_then(|query| {
			url::form_urlencoded::parse(query.as_bytes())
				.find(|(key, _)| key == "q")
				.map(|(_, value)| value.into_owned())
		})
		.unwrap_or_default();

	render(SearchPage { page: PageData::search(q, user) })
}

/// The terms of service.
#[tracing::instrument(level = "debug", skip_all, err(Debug, level = "debug"))]
pub async fn terms(CurrentUser(user): CurrentUser) -> Result<Html<String>>
{
	render(TermsPage {
		page: PageData::new(
			"Terms of Service",
			"This website is provided as is. Steam is a trademark of Valve Corporation; this site is not affiliated with Valve.",
			user,
		),
	})
}

/// The privacy policy.
#[tracing::instrument(level = "debug", skip_all, err(Debug, level = "debug"))]
pub async fn privacy(CurrentUser(user): CurrentUser) -> Result<Html<String>>
{
	render(PrivacyPage {
		page: PageData::new(
			"Privacy Policy",
			"When you log in, your SteamID and display name are stored in a cookie in your browser. Nothing is stored on the server.",
			user,
		),
	})
}

/// Response body of `/api/time`.
#[derive(Debug, Serialize)]
pub struct CurrentTime
{
	/// The server's local time, formatted as `YYYY-MM-DD HH:MM:SS`.
	pub time: String,
}

/// Returns the server's current local time.
pub async fn time() -> Json<CurrentTime>
{
	Json(CurrentTime { time: Local::now().format("%Y-%m-%d %H:%M:%S").to_string() })
}

/// Fallback for every route we don't know.
pub async fn not_found() -> (StatusCode, &'static str)
{
	(StatusCode::NOT_FOUND, "404 page not found")
}
