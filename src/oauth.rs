//! Grant facade over the `oauth2` crate.
//!
//! Reddit's token endpoint speaks standard OAuth 2.0 with HTTP Basic client authentication,
//! but it reports some failures (a wrong password, for instance) as HTTP 200 with an
//! `{"error": "..."}` body. The facade classifies those bodies alongside regular OAuth error
//! responses so the token manager only sees [`AuthError`] values.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RedirectUrl, RefreshToken, RequestTokenError, ResourceOwnerPassword,
	ResourceOwnerUsername, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, Token, TokenSecret},
	error::{AuthError, ConfigError},
	http::{
		ApiHttpClient, RequestStage, ResponseMetadata, ResponseMetadataSlot, TransportErrorMapper,
	},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// OAuth 2.0 grant types issued against the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Resource-owner password grant used by script apps.
	Password,
	/// Refresh Token grant for long-lived web sessions.
	RefreshToken,
	/// Authorization Code grant completing a web authorization.
	AuthorizationCode,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub fn as_str(self) -> &'static str {
		match self {
			GrantType::Password => "password",
			GrantType::RefreshToken => "refresh_token",
			GrantType::AuthorizationCode => "authorization_code",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

pub(crate) struct BasicFacade<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> BasicFacade<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds a facade that authenticates with HTTP Basic `client_id:client_secret`.
	///
	/// Installed apps have no secret; the empty string still goes into the Basic header, which
	/// is what the token endpoint expects from them.
	pub(crate) fn new(
		token_url: &Url,
		client_id: &str,
		client_secret: &TokenSecret,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self> {
		let token_url = TokenUrl::new(token_url.to_string())
			.map_err(|source| ConfigError::InvalidUrl { source })?;
		let oauth_client = BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_client_secret(ClientSecret::new(client_secret.expose().to_owned()))
			.set_auth_type(AuthType::BasicAuth)
			.set_token_uri(token_url);

		Ok(Self { oauth_client, http_client, error_mapper })
	}

	pub(crate) fn exchange_password<'a>(
		&'a self,
		username: &'a str,
		password: &'a TokenSecret,
	) -> FacadeFuture<'a, Token> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let username = ResourceOwnerUsername::new(username.to_owned());
			let password = ResourceOwnerPassword::new(password.expose().to_owned());
			let response = self
				.oauth_client
				.exchange_password(&username, &password)
				.request_async(&instrumented)
				.await
				.map_err(|err| {
					let mapper = self.error_mapper.as_ref();

					map_request_error(GrantType::Password, meta.take(), err, mapper)
				})?;

			token_from_response(&response, None)
		})
	}

	/// Renews access; the returned token keeps `refresh_token` when the response omits one.
	pub(crate) fn refresh_token<'a>(
		&'a self,
		refresh_token: &'a TokenSecret,
	) -> FacadeFuture<'a, Token> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let refresh_secret = RefreshToken::new(refresh_token.expose().to_owned());
			let response = self
				.oauth_client
				.exchange_refresh_token(&refresh_secret)
				.request_async(&instrumented)
				.await
				.map_err(|err| {
					map_request_error(
						GrantType::RefreshToken,
						meta.take(),
						err,
						self.error_mapper.as_ref(),
					)
				})?;

			token_from_response(&response, Some(refresh_token))
		})
	}

	pub(crate) fn exchange_authorization_code<'a>(
		&'a self,
		code: &'a str,
		redirect_uri: &'a Url,
	) -> FacadeFuture<'a, Token> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let redirect_url = RedirectUrl::new(redirect_uri.to_string())
				.map_err(|source| ConfigError::InvalidUrl { source })?;
			let response = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_redirect_uri(Cow::Owned(redirect_url))
				.request_async(&instrumented)
				.await
				.map_err(|err| {
					map_request_error(
						GrantType::AuthorizationCode,
						meta.take(),
						err,
						self.error_mapper.as_ref(),
					)
				})?;

			token_from_response(&response, None)
		})
	}
}

fn token_from_response(
	response: &BasicTokenResponse,
	previous_refresh: Option<&TokenSecret>,
) -> Result<Token> {
	let expires_in = response.expires_in().ok_or(ConfigError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(ConfigError::NonPositiveExpiresIn.into());
	}

	let issued_at = OffsetDateTime::now_utc();
	let expires_at = issued_at
		.checked_add(Duration::seconds(expires_in))
		.ok_or(ConfigError::ExpiresInOutOfRange)?;
	let mut builder = Token::builder()
		.access_token(response.access_token().secret().to_owned())
		.issued_at(issued_at)
		.expires_at(expires_at);

	if let Some(scopes) = response.scopes() {
		let scope =
			ScopeSet::new(scopes.iter().map(|scope| scope.as_ref())).map_err(ConfigError::from)?;

		builder = builder.scope(scope);
	}

	match (response.refresh_token(), previous_refresh) {
		(Some(fresh), _) => builder = builder.refresh_token(fresh.secret().to_owned()),
		(None, Some(previous)) => builder = builder.refresh_token(previous.expose()),
		(None, None) => {},
	}

	builder.build().map_err(|e| ConfigError::from(e).into())
}

fn map_request_error<E, M>(
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(grant, response, meta_ref),
		RequestTokenError::Request(error) =>
			mapper.map_transport_error(RequestStage::Grant(grant), meta_ref, error),
		RequestTokenError::Parse(error, body) => map_unparsed_body(grant, error, &body, meta_ref),
		RequestTokenError::Other(message) => AuthError::Network {
			message: format!("token endpoint returned an unexpected response: {message}"),
			status: meta_status(meta_ref),
			retry_after: meta_retry_after(meta_ref),
			source: None,
		}
		.into(),
	}
}

fn map_server_response_error(
	grant: GrantType,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let code = response.error().as_ref().to_owned();
	let reason = match response.error_description() {
		Some(description) => format!("{code} ({description})"),
		None => code.clone(),
	};

	classify_grant_error(grant, code.as_str(), reason, meta)
}

// Bodies that failed to parse as a token response still carry an `error` field when the
// endpoint rejected the grant with HTTP 200 or answered 401 with its own JSON shape.
fn map_unparsed_body(
	grant: GrantType,
	error: serde_path_to_error::Error<serde_json::Error>,
	body: &[u8],
	meta: Option<&ResponseMetadata>,
) -> Error {
	let code = serde_json::from_slice::<serde_json::Value>(body).ok().and_then(|value| {
		match value.get("error")? {
			serde_json::Value::String(code) => Some(code.to_owned()),
			serde_json::Value::Null => None,
			other => Some(other.to_string()),
		}
	});

	match code {
		Some(code) => classify_grant_error(grant, code.as_str(), code.clone(), meta),
		None => AuthError::Network {
			message: format!("the {grant} grant response could not be parsed"),
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
			source: Some(Box::new(error)),
		}
		.into(),
	}
}

fn classify_grant_error(
	grant: GrantType,
	code: &str,
	reason: String,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let status = meta_status(meta);
	let transient = matches!(code, "server_error" | "temporarily_unavailable")
		|| matches!(status, Some(429) | Some(500..=599));

	if transient {
		AuthError::Network {
			message: format!("the {grant} grant failed with `{reason}`"),
			status,
			retry_after: meta_retry_after(meta),
			source: None,
		}
		.into()
	} else {
		AuthError::InvalidCredentials { reason, status }.into()
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
