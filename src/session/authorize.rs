//! Authorization code helpers that bootstrap a [`WebCredential`].
//!
//! [`Session::start_authorization`] builds the URL the end user visits; once the API redirects
//! back with `state` + `code`, [`Session::exchange_authorization_code`] validates the state and
//! trades the code for tokens.

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret, WebCredential},
	error::AuthError,
	http::{ApiHttpClient, TransportErrorMapper},
	oauth::BasicFacade,
	obs::{self, OpKind, OpOutcome, OpSpan},
	session::Session,
};

const STATE_LEN: usize = 32;

/// How long the user grants access for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationDuration {
	/// One-hour access without a refresh token.
	Temporary,
	/// Access renewable through a refresh token.
	#[default]
	Permanent,
}
impl AuthorizationDuration {
	/// Returns the wire value of the `duration` parameter.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Temporary => "temporary",
			Self::Permanent => "permanent",
		}
	}
}

/// Parameters of an authorization request.
#[derive(Clone, Debug)]
pub struct AuthorizationRequest {
	/// OAuth client identifier of the web or installed app.
	pub client_id: String,
	/// Redirect URI registered for the app.
	pub redirect_uri: Url,
	/// Requested scopes.
	pub scope: ScopeSet,
	/// Requested access duration.
	pub duration: AuthorizationDuration,
}
impl AuthorizationRequest {
	/// Creates a permanent-duration request.
	pub fn new(client_id: impl Into<String>, redirect_uri: Url, scope: ScopeSet) -> Self {
		Self {
			client_id: client_id.into(),
			redirect_uri,
			scope,
			duration: AuthorizationDuration::Permanent,
		}
	}

	/// Overrides the access duration.
	pub fn with_duration(mut self, duration: AuthorizationDuration) -> Self {
		self.duration = duration;

		self
	}
}

/// Authorization in progress, returned by [`Session::start_authorization`].
#[derive(Clone, Debug)]
pub struct PendingAuthorization {
	/// Request the URL was built from.
	pub request: AuthorizationRequest,
	/// Opaque state value that must round-trip via the redirect handler.
	pub state: String,
	/// Fully-formed authorize URL that callers should send end users to.
	pub authorize_url: Url,
}
impl PendingAuthorization {
	/// Validates the returned `state` parameter after the authorization redirect.
	pub fn validate_state(&self, returned_state: &str) -> Result<()> {
		if returned_state == self.state {
			Ok(())
		} else {
			Err(AuthError::InvalidCredentials {
				reason: "authorization state mismatch".into(),
				status: None,
			}
			.into())
		}
	}
}

impl<C, M> Session<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds the authorize URL for `request` with a fresh random `state`.
	pub fn start_authorization(&self, request: AuthorizationRequest) -> PendingAuthorization {
		let state = random_string(STATE_LEN);
		let mut authorize_url = self.descriptor.endpoints.authorization.clone();

		authorize_url
			.query_pairs_mut()
			.append_pair("client_id", &request.client_id)
			.append_pair("response_type", "code")
			.append_pair("state", &state)
			.append_pair("redirect_uri", request.redirect_uri.as_str())
			.append_pair("duration", request.duration.as_str())
			.append_pair("scope", &request.scope.normalized());

		PendingAuthorization { request, state, authorize_url }
	}

	/// Trades an authorization code for tokens and returns a ready-to-use [`WebCredential`].
	///
	/// `client_secret` is empty for installed apps. Permanent authorizations come back with a
	/// refresh token; temporary ones only carry the one-hour access token.
	pub async fn exchange_authorization_code(
		&self,
		pending: &PendingAuthorization,
		client_secret: &str,
		returned_state: &str,
		code: &str,
	) -> Result<WebCredential> {
		const KIND: OpKind = OpKind::AuthorizationCode;

		let span = OpSpan::new(KIND, "exchange_authorization_code");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result: Result<WebCredential> = span
			.instrument(async {
				pending.validate_state(returned_state)?;

				let secret = TokenSecret::new(client_secret);
				let facade = <BasicFacade<C, M>>::new(
					&self.descriptor.endpoints.token,
					&pending.request.client_id,
					&secret,
					self.http_client.clone(),
					self.transport_mapper.clone(),
				)?;
				let token = facade
					.exchange_authorization_code(code, &pending.request.redirect_uri)
					.await?;

				Ok(WebCredential {
					client_id: pending.request.client_id.clone(),
					client_secret: secret,
					refresh_token: token.refresh_token,
					access_token: Some(token.access_token),
					expires_at: Some(token.expires_at),
				})
			})
			.await;

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}
