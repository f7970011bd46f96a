//! Bearer token struct, lifecycle helpers, and builder.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, token::secret::TokenSecret},
};

/// Current lifecycle status for a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token is not yet valid because the issued-at instant is in the future.
	Pending,
	/// Token is currently valid.
	Active,
	/// Token reached its expiry instant.
	Expired,
}

/// Errors produced by [`TokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TokenBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// Bearer token issued by a grant flow (or supplied up front by the caller).
#[derive(Clone, Serialize, Deserialize)]
pub struct Token {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret, if the API issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Issued-at instant recorded when the grant response arrived.
	pub issued_at: OffsetDateTime,
	/// Expiry instant derived from issued_at plus expires_in or an absolute expiry.
	pub expires_at: OffsetDateTime,
	/// Scopes granted to the token, when the API reported them.
	pub scope: Option<ScopeSet>,
}
impl Token {
	/// Returns a builder.
	pub fn builder() -> TokenBuilder {
		TokenBuilder::default()
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		if instant < self.issued_at {
			return TokenStatus::Pending;
		}
		if instant >= self.expires_at {
			return TokenStatus::Expired;
		}

		TokenStatus::Active
	}

	/// Returns `true` if the token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Expired)
	}

	/// Returns `true` if the token can still be sent at `instant`.
	///
	/// The expiry must lie strictly after `instant + margin`. The margin is capped at half the
	/// token's lifetime so short-lived tokens stay usable right after they are issued, and a
	/// negative margin counts as zero. Pending tokens are usable: the API issued them, local
	/// clock skew does not invalidate them.
	pub fn is_usable_at(&self, instant: OffsetDateTime, margin: Duration) -> bool {
		let margin = margin.min((self.expires_at - self.issued_at) / 2).max(Duration::ZERO);

		instant.checked_add(margin).is_some_and(|cutoff| self.expires_at > cutoff)
	}

	/// Time left before expiry, clamped at zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let left = self.expires_at - instant;

		if left.is_negative() { Duration::ZERO } else { left }
	}

	/// Value for the `Authorization` header.
	pub fn bearer_header(&self) -> String {
		format!("bearer {}", self.access_token.expose())
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Token")
			.field("access_token", &self.access_token.fingerprint())
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.field("scope", &self.scope)
			.finish()
	}
}

/// Builder for [`Token`].
#[derive(Clone, Debug, Default)]
pub struct TokenBuilder {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	scope: Option<ScopeSet>,
}
impl TokenBuilder {
	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Records the granted scopes.
	pub fn scope(mut self, scope: ScopeSet) -> Self {
		self.scope = Some(scope);

		self
	}

	/// Consumes the builder and produces a [`Token`].
	pub fn build(self) -> Result<Token, TokenBuilderError> {
		let access_token = self.access_token.ok_or(TokenBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at + delta,
			(None, None) => return Err(TokenBuilderError::MissingExpiry),
		};

		Ok(Token {
			access_token,
			refresh_token: self.refresh_token,
			issued_at,
			expires_at,
			scope: self.scope,
		})
	}
}
