//! Session-level error types shared by the token manager, rate limiter, fetch pipeline, and
//! paginator.

// self
use crate::_prelude::*;

/// Session-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token acquisition or credential failure.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Resource request answered with a non-2xx status.
	#[error(transparent)]
	Http(#[from] HttpError),
	/// Response body is not the JSON shape the caller asked for.
	#[error(transparent)]
	Decode(#[from] DecodeError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS) on a resource request.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// A token or rate-limit wait outlived the request deadline.
	#[error("Deadline exceeded while waiting for {stage}.")]
	DeadlineExceeded {
		/// Suspension point that timed out.
		stage: WaitStage,
	},
}
impl Error {
	/// Returns the HTTP status attached to the failure, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Http(err) => Some(err.status),
			Self::Auth(AuthError::InvalidCredentials { status, .. })
			| Self::Auth(AuthError::Network { status, .. }) => *status,
			Self::Decode(err) => err.status,
			_ => None,
		}
	}
}

/// Suspension points that honor request deadlines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitStage {
	/// Waiting on (or performing) the session's single in-flight token acquisition.
	TokenAcquisition,
	/// Waiting for the rate-limit budget to reset.
	RateLimit,
}
impl Display for WaitStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::TokenAcquisition => f.write_str("token acquisition"),
			Self::RateLimit => f.write_str("the rate-limit reset"),
		}
	}
}

/// Authentication failures raised by the token manager.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// A required credential field is empty.
	#[error("Credential field `{field}` is missing.")]
	MissingCredentials {
		/// Name of the missing field.
		field: &'static str,
	},
	/// The API rejected the grant; retrying with the same credential will not help.
	#[error("The API rejected the credentials: {reason}.")]
	InvalidCredentials {
		/// API- or session-supplied reason string.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// The session holds no refresh token and the current token cannot be renewed.
	#[error("Token expired and no refresh token is available.")]
	RefreshTokenMissing,
	/// Grant call failed at the transport level or the endpoint was temporarily unavailable.
	#[error("Token endpoint could not be reached: {message}.")]
	Network {
		/// Human-readable summary.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
		/// Underlying transport failure.
		#[source]
		source: Option<BoxError>,
	},
}
impl AuthError {
	/// Wraps a transport-specific failure raised during a grant call.
	pub fn network(
		message: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network {
			message: message.into(),
			status: None,
			retry_after: None,
			source: Some(Box::new(src)),
		}
	}

	/// Returns `true` when the caller may retry the request that produced this error.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Network { .. })
	}
}

/// Non-2xx answer from a resource endpoint.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Request failed with HTTP status {status}.")]
pub struct HttpError {
	/// HTTP status code.
	pub status: u16,
	/// Response body decoded lossily as UTF-8.
	pub body: String,
}

/// Malformed JSON body.
#[derive(Debug, ThisError)]
#[error("Response body is not valid JSON for the requested shape.")]
pub struct DecodeError {
	/// Structured parsing failure including the JSON path.
	#[source]
	pub source: serde_path_to_error::Error<serde_json::Error>,
	/// HTTP status code, when available.
	pub status: Option<u16>,
}

/// Configuration and validation failures raised locally.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Endpoint or redirect URL cannot be parsed.
	#[error("URL is invalid.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Resource path cannot be joined onto the base URL.
	#[error("Resource path `{path}` cannot be resolved against the base URL.")]
	InvalidPath {
		/// Offending path.
		path: String,
	},
	/// Scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Token builder validation failed.
	#[error("Unable to build token.")]
	TokenBuild(#[from] crate::auth::TokenBuilderError),
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO) on resource requests.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request timed out inside the transport.
	#[error("Request timed out while calling the API.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
	/// Transport failed without a structured error.
	#[error("HTTP client error occurred while calling the API: {message}.")]
	Other {
		/// Transport-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout { source: Box::new(e) } } else { Self::network(e) }
	}
}
