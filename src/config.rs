//! API descriptor: endpoints, client identification, and tuning knobs shared by a session.
//!
//! [`ApiDescriptor`] is validated once by [`ApiDescriptorBuilder`] and then treated as
//! immutable. [`ApiDescriptor::reddit`] returns the production endpoints; tests point the
//! builder at loopback mock servers instead.

/// Builder API for assembling descriptors.
pub mod builder;
/// Behavior toggles for the request pipeline.
pub mod quirks;

pub use builder::*;
pub use quirks::*;

// self
use crate::_prelude::*;

/// Authorization page for the web flow.
pub const REDDIT_AUTHORIZATION_URL: &str = "https://www.reddit.com/api/v1/authorize";
/// Token endpoint shared by every grant.
pub const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
/// Host used by anonymous sessions.
pub const REDDIT_PUBLIC_BASE_URL: &str = "https://www.reddit.com";
/// Host used by OAuth sessions.
pub const REDDIT_OAUTH_BASE_URL: &str = "https://oauth.reddit.com";

/// Endpoint set declared by a descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEndpoints {
	/// Authorization page used by the authorization code flow.
	pub authorization: Url,
	/// Token endpoint used for grants and refreshes.
	pub token: Url,
	/// Base URL for anonymous resource requests.
	pub public_base: Url,
	/// Base URL for bearer-authenticated resource requests.
	pub oauth_base: Url,
}

/// Optimistic rate-limit budget assumed before the first response headers arrive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDefaults {
	/// Requests assumed to be available.
	pub initial_remaining: u64,
	/// Window after which the assumed budget resets.
	pub window: Duration,
}
impl Default for RateLimitDefaults {
	fn default() -> Self {
		Self { initial_remaining: 600, window: Duration::seconds(600) }
	}
}

/// Immutable API descriptor consumed by sessions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDescriptor {
	/// Endpoint definitions.
	pub endpoints: ApiEndpoints,
	/// `User-Agent` sent with every request; Reddit throttles generic agents hard.
	pub user_agent: String,
	/// Pipeline behavior toggles.
	pub quirks: ApiQuirks,
	/// Initial rate-limit budget.
	pub rate_limit: RateLimitDefaults,
	/// Tokens expiring within this margin are renewed before use.
	pub token_expiry_margin: Duration,
	/// Upper bound for token and rate-limit waits when a request sets no deadline of its own.
	pub max_wait: Option<Duration>,
}
impl ApiDescriptor {
	/// Creates a new builder for the provided user agent.
	pub fn builder(user_agent: impl Into<String>) -> ApiDescriptorBuilder {
		ApiDescriptorBuilder::new(user_agent)
	}

	/// Production Reddit endpoints with default tuning.
	pub fn reddit(user_agent: impl Into<String>) -> Result<Self, ApiDescriptorError> {
		Self::builder(user_agent).build()
	}

	/// Base URL for a session, depending on whether it sends a bearer token.
	pub fn base_url(&self, authenticated: bool) -> &Url {
		if authenticated { &self.endpoints.oauth_base } else { &self.endpoints.public_base }
	}
}
