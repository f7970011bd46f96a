// self
use crate::{
	_prelude::*,
	config::{
		ApiDescriptor, ApiEndpoints, ApiQuirks, REDDIT_AUTHORIZATION_URL, REDDIT_OAUTH_BASE_URL,
		REDDIT_PUBLIC_BASE_URL, REDDIT_TOKEN_URL, RateLimitDefaults,
	},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ApiDescriptorError {
	/// Reddit rejects requests without a descriptive user agent.
	#[error("User agent must not be empty.")]
	MissingUserAgent,
	/// An endpoint URL could not be parsed.
	#[error("The {endpoint} endpoint is not a valid URL: {reason}.")]
	InvalidEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Parser message.
		reason: String,
	},
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// The optimistic budget must allow at least one request per positive window.
	#[error("Initial rate-limit budget must be positive and use a positive window.")]
	InvalidRateLimit,
	/// Negative durations are meaningless for margins and waits.
	#[error("The {field} duration must not be negative.")]
	NegativeDuration {
		/// Offending field.
		field: &'static str,
	},
}

/// Builder for [`ApiDescriptor`] values.
#[derive(Debug)]
pub struct ApiDescriptorBuilder {
	/// User agent for every request.
	pub user_agent: String,
	/// Authorization page override.
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint override.
	pub token_endpoint: Option<Url>,
	/// Public base URL override.
	pub public_base: Option<Url>,
	/// OAuth base URL override.
	pub oauth_base: Option<Url>,
	/// Pipeline toggles.
	pub quirks: ApiQuirks,
	/// Initial rate-limit budget.
	pub rate_limit: RateLimitDefaults,
	/// Token renewal margin.
	pub token_expiry_margin: Duration,
	/// Default wait bound.
	pub max_wait: Option<Duration>,
}
impl ApiDescriptorBuilder {
	const DEFAULT_EXPIRY_MARGIN: Duration = Duration::seconds(30);
	const DEFAULT_MAX_WAIT: Duration = Duration::minutes(15);

	/// Creates a new builder seeded with production defaults.
	pub fn new(user_agent: impl Into<String>) -> Self {
		Self {
			user_agent: user_agent.into(),
			authorization_endpoint: None,
			token_endpoint: None,
			public_base: None,
			oauth_base: None,
			quirks: ApiQuirks::default(),
			rate_limit: RateLimitDefaults::default(),
			token_expiry_margin: Self::DEFAULT_EXPIRY_MARGIN,
			max_wait: Some(Self::DEFAULT_MAX_WAIT),
		}
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the anonymous base URL.
	pub fn public_base(mut self, url: Url) -> Self {
		self.public_base = Some(url);

		self
	}

	/// Sets the OAuth base URL.
	pub fn oauth_base(mut self, url: Url) -> Self {
		self.oauth_base = Some(url);

		self
	}

	/// Points every endpoint at one host, the way mock servers are usually laid out.
	pub fn single_host(self, base: &Url) -> Result<Self, ApiDescriptorError> {
		let join = |endpoint: &'static str, path: &str| {
			base.join(path).map_err(|e| ApiDescriptorError::InvalidEndpoint {
				endpoint,
				reason: e.to_string(),
			})
		};
		let authorization = join("authorization", "/api/v1/authorize")?;
		let token = join("token", "/api/v1/access_token")?;

		Ok(self
			.authorization_endpoint(authorization)
			.token_endpoint(token)
			.public_base(base.clone())
			.oauth_base(base.clone()))
	}

	/// Overrides the pipeline toggles.
	pub fn quirks(mut self, quirks: ApiQuirks) -> Self {
		self.quirks = quirks;

		self
	}

	/// Overrides the optimistic rate-limit budget.
	pub fn rate_limit(mut self, defaults: RateLimitDefaults) -> Self {
		self.rate_limit = defaults;

		self
	}

	/// Overrides the token renewal margin (defaults to 30 seconds).
	pub fn token_expiry_margin(mut self, margin: Duration) -> Self {
		self.token_expiry_margin = margin;

		self
	}

	/// Overrides the default wait bound (defaults to 15 minutes); `None` waits indefinitely.
	pub fn max_wait(mut self, max_wait: Option<Duration>) -> Self {
		self.max_wait = max_wait;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ApiDescriptor, ApiDescriptorError> {
		let endpoints = ApiEndpoints {
			authorization: or_default(
				"authorization",
				self.authorization_endpoint,
				REDDIT_AUTHORIZATION_URL,
			)?,
			token: or_default("token", self.token_endpoint, REDDIT_TOKEN_URL)?,
			public_base: or_default("public_base", self.public_base, REDDIT_PUBLIC_BASE_URL)?,
			oauth_base: or_default("oauth_base", self.oauth_base, REDDIT_OAUTH_BASE_URL)?,
		};
		let descriptor = ApiDescriptor {
			endpoints,
			user_agent: self.user_agent,
			quirks: self.quirks,
			rate_limit: self.rate_limit,
			token_expiry_margin: self.token_expiry_margin,
			max_wait: self.max_wait,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ApiDescriptor {
	fn validate(&self) -> Result<(), ApiDescriptorError> {
		if self.user_agent.trim().is_empty() {
			return Err(ApiDescriptorError::MissingUserAgent);
		}
		if self.rate_limit.initial_remaining == 0 || !self.rate_limit.window.is_positive() {
			return Err(ApiDescriptorError::InvalidRateLimit);
		}
		if self.token_expiry_margin.is_negative() {
			return Err(ApiDescriptorError::NegativeDuration { field: "token_expiry_margin" });
		}
		if self.max_wait.is_some_and(|wait| wait.is_negative()) {
			return Err(ApiDescriptorError::NegativeDuration { field: "max_wait" });
		}

		validate_endpoint("authorization", &self.endpoints.authorization)?;
		validate_endpoint("token", &self.endpoints.token)?;
		validate_endpoint("public_base", &self.endpoints.public_base)?;
		validate_endpoint("oauth_base", &self.endpoints.oauth_base)?;

		Ok(())
	}
}

fn or_default(
	endpoint: &'static str,
	value: Option<Url>,
	fallback: &str,
) -> Result<Url, ApiDescriptorError> {
	match value {
		Some(url) => Ok(url),
		None => Url::parse(fallback)
			.map_err(|e| ApiDescriptorError::InvalidEndpoint { endpoint, reason: e.to_string() }),
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ApiDescriptorError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(ApiDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
		Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}
