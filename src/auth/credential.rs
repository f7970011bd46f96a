//! Caller-supplied credential material, one variant per grant flow.
//!
//! A session is built from exactly one [`Credential`]. The variant decides how the token
//! manager acquires and renews tokens:
//!
//! - [`ScriptCredential`] always performs a `password` grant (no refresh token persists).
//! - [`WebCredential`] renews with a `refresh_token` grant and may seed an initial token.
//! - [`StaticToken`] carries a pre-obtained bearer token and can never renew itself.

// self
use crate::{
	_prelude::*,
	auth::{Token, TokenSecret},
	error::{AuthError, ConfigError},
};

/// Lifetime Reddit assigns to access tokens; assumed for seeded tokens without an expiry.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::seconds(3600);

/// Credential for a personal-use "script" app acting as its own developer account.
#[derive(Clone, Debug)]
pub struct ScriptCredential {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: TokenSecret,
	/// Reddit username.
	pub username: String,
	/// Reddit password.
	pub password: TokenSecret,
}
impl ScriptCredential {
	/// Creates a script credential.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		username: impl Into<String>,
		password: impl Into<String>,
	) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			username: username.into(),
			password: TokenSecret::new(password),
		}
	}
}

/// Credential for a web or installed app that was authorized by a user.
#[derive(Clone, Debug)]
pub struct WebCredential {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret; installed apps use an empty secret.
	pub client_secret: TokenSecret,
	/// Refresh token used to renew access; absent for `temporary` authorizations.
	pub refresh_token: Option<TokenSecret>,
	/// Access token that is still usable, if the caller has one.
	pub access_token: Option<TokenSecret>,
	/// Expiry of [`Self::access_token`].
	pub expires_at: Option<OffsetDateTime>,
}
impl WebCredential {
	/// Creates a web credential that renews through the provided refresh token.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		refresh_token: impl Into<String>,
	) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			refresh_token: Some(TokenSecret::new(refresh_token)),
			access_token: None,
			expires_at: None,
		}
	}

	/// Creates a web credential without a refresh token.
	pub fn without_refresh(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			refresh_token: None,
			access_token: None,
			expires_at: None,
		}
	}

	/// Seeds an access token so the first request skips the refresh grant.
	pub fn with_access_token(
		mut self,
		access_token: impl Into<String>,
		expires_at: Option<OffsetDateTime>,
	) -> Self {
		self.access_token = Some(TokenSecret::new(access_token));
		self.expires_at = expires_at;

		self
	}
}

/// Pre-obtained bearer token with no renewal capability.
#[derive(Clone, Debug)]
pub struct StaticToken {
	/// Bearer token value.
	pub access_token: TokenSecret,
	/// Known expiry; `None` means the token is never considered expired locally.
	pub expires_at: Option<OffsetDateTime>,
}
impl StaticToken {
	/// Wraps a bearer token with no known expiry.
	pub fn new(access_token: impl Into<String>) -> Self {
		Self { access_token: TokenSecret::new(access_token), expires_at: None }
	}

	/// Records the token's expiry.
	pub fn expiring_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}
}

/// Tagged union over the supported credential shapes.
#[derive(Clone, Debug)]
pub enum Credential {
	/// Password grant.
	Script(ScriptCredential),
	/// Refresh-token grant.
	Web(WebCredential),
	/// Caller-managed bearer token.
	Static(StaticToken),
}
impl Credential {
	/// Checks that every required field is present.
	pub fn validate(&self) -> Result<(), AuthError> {
		match self {
			Self::Script(script) => {
				require("client_id", &script.client_id)?;
				require("client_secret", script.client_secret.expose())?;
				require("username", &script.username)?;
				require("password", script.password.expose())
			},
			Self::Web(web) => {
				require("client_id", &web.client_id)?;

				if let Some(refresh) = &web.refresh_token {
					require("refresh_token", refresh.expose())?;
				}
				if let Some(access) = &web.access_token {
					require("access_token", access.expose())?;
				}

				Ok(())
			},
			Self::Static(token) => require("access_token", token.access_token.expose()),
		}
	}

	/// Stable label used in spans and metrics.
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::Script(_) => "script",
			Self::Web(_) => "web",
			Self::Static(_) => "static",
		}
	}

	/// Returns true when the credential can mint a new token on its own.
	pub fn can_renew(&self) -> bool {
		match self {
			Self::Script(_) => true,
			Self::Web(web) => web.refresh_token.is_some(),
			Self::Static(_) => false,
		}
	}

	/// Token the session starts with before any grant call, if the credential carries one.
	pub(crate) fn initial_token(&self, now: OffsetDateTime) -> Result<Option<Token>, ConfigError> {
		let (access, expires_at, refresh) = match self {
			Self::Script(_) => return Ok(None),
			Self::Web(web) => match &web.access_token {
				Some(access) => (
					access,
					web.expires_at.unwrap_or(now + DEFAULT_TOKEN_TTL),
					web.refresh_token.as_ref(),
				),
				None => return Ok(None),
			},
			Self::Static(token) => (
				&token.access_token,
				token.expires_at.unwrap_or_else(|| {
					time::PrimitiveDateTime::new(time::Date::MAX, time::Time::MIDNIGHT).assume_utc()
				}),
				None,
			),
		};
		let mut builder =
			Token::builder().access_token(access.expose()).issued_at(now).expires_at(expires_at);

		if let Some(refresh) = refresh {
			builder = builder.refresh_token(refresh.expose());
		}

		Ok(Some(builder.build()?))
	}
}
impl From<ScriptCredential> for Credential {
	fn from(value: ScriptCredential) -> Self {
		Self::Script(value)
	}
}
impl From<WebCredential> for Credential {
	fn from(value: WebCredential) -> Self {
		Self::Web(value)
	}
}
impl From<StaticToken> for Credential {
	fn from(value: StaticToken) -> Self {
		Self::Static(value)
	}
}

fn require(field: &'static str, value: &str) -> Result<(), AuthError> {
	if value.trim().is_empty() { Err(AuthError::MissingCredentials { field }) } else { Ok(()) }
}
