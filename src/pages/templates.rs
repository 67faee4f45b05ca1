//! Page templates.
//!
//! The markup lives in the `templates/` directory at the root of the
//! repository. Every page extends `base.html`, which renders the navigation
//! bar and the current user.

use askama::Template;

use super::PageData;

/// `/`
#[derive(Debug, Template)]
#[template(path = "home.html")]
pub struct HomePage
{
	/// The page's view model.
	pub page: PageData,
}

/// `/about`
#[derive(Debug, Template)]
#[template(path = "about.html")]
pub struct AboutPage
{
	/// The page's view model.
	pub page: PageData,
}

/// `/contact`
#[derive(Debug, Template)]
#[template(path = "contact.html")]
pub struct ContactPage
{
	/// The page's view model.
	pub page: PageData,
}

/// `/search`
#[derive(Debug, Template)]
#[template(path = "search.html")]
pub struct SearchPage
{
	/// The page's view model.
	pub page: PageData,
}

/// `/terms`
#[derive(Debug, Template)]
#[template(path = "terms.html")]
pub struct TermsPage
{
	/// The page's view model.
	pub page: PageData,
}

/// `/privacy`
#[derive(Debug, Template)]
#[template(path = "privacy.html")]
pub struct PrivacyPage
{
	/// The page's view model.
	pub page: PageData,
}
