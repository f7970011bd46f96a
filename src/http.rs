//! Transport primitives shared by grant calls and resource requests.
//!
//! The module exposes [`ApiHttpClient`] alongside [`ResponseMetadata`] and
//! [`ResponseMetadataSlot`] so downstream crates can plug in custom HTTP clients without losing
//! the session's error classification. Implementations call [`ResponseMetadataSlot::take`]
//! before dispatching a request and [`ResponseMetadataSlot::store`] once an HTTP status or retry
//! hint is known, enabling [`TransportErrorMapper`] to classify failures with consistent
//! metadata.

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{HeaderMap, header::RETRY_AFTER},
};
use time::format_description::well_known::Rfc2822;
// self
#[cfg(feature = "reqwest")] use crate::error::ConfigError;
use crate::{
	_prelude::*,
	error::{AuthError, TransportError},
	oauth::GrantType,
};

/// Abstraction over HTTP transports capable of executing every exchange a session performs.
///
/// The trait is the session's only dependency on an HTTP stack. Grant calls hand the returned
/// handle to the `oauth2` crate, and resource requests call [`AsyncHttpClient::call`] on it
/// directly, so one implementation serves both. Implementations must be
/// `Send + Sync + 'static` so they can be shared across session clones, and the handles they
/// return must own whatever state is required so their request futures remain `Send`.
pub trait ApiHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	///
	/// # Metadata Contract
	///
	/// - Call [`ResponseMetadataSlot::take`] before submitting the HTTP request so stale
	///   information never leaks across retries.
	/// - Once an HTTP response (successful or erroneous) provides status headers, save them with
	///   [`ResponseMetadataSlot::store`].
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Which kind of exchange a transport failure interrupted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestStage {
	/// Token endpoint call for the given grant.
	Grant(GrantType),
	/// Resource request against the API host.
	Resource,
}

/// Maps HTTP transport failures into session [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a session error.
	///
	/// Grant-stage failures should become [`AuthError::Network`] so callers can retry them;
	/// resource-stage failures should become [`TransportError`] values.
	fn map_transport_error(
		&self,
		stage: RequestStage,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Captures metadata from the most recent HTTP response for downstream error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Reqwest-backed [`ApiHttpClient`].
///
/// Reddit throttles clients with generic user agents and the token endpoint must not follow
/// redirects; [`Self::for_user_agent`] configures both. A custom [`ReqwestClient`] passed to
/// [`Self::with_client`] should be set up the same way.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient {
	client: ReqwestClient,
}
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

	/// Uses `client` as is.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { client }
	}

	/// Builds a client that identifies itself with `user_agent` and never follows redirects.
	pub fn for_user_agent(user_agent: &str) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.user_agent(user_agent)
			.redirect(reqwest::redirect::Policy::none())
			.timeout(Self::REQUEST_TIMEOUT)
			.build()?;

		Ok(Self { client })
	}

	/// Underlying reqwest client.
	pub fn client(&self) -> &ReqwestClient {
		&self.client
	}
}
#[cfg(feature = "reqwest")]
impl ApiHttpClient for ReqwestHttpClient {
	type Handle = ReqwestHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ReqwestHandle { client: self.client.clone(), slot }
	}
}

/// Per-exchange handle that records the status and `Retry-After` hint of the response.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHandle {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for ReqwestHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();

			let request = request.try_into().map_err(Box::new)?;
			let response = self.client.execute(request).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().clone();

			self.slot.store(ResponseMetadata {
				status: Some(status.as_u16()),
				retry_after: parse_retry_after(&headers),
			});

			let body = response.bytes().await.map_err(Box::new)?;
			let mut converted = HttpResponse::new(body.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		stage: RequestStage,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(stage, meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => match stage {
				RequestStage::Grant(grant) =>
					AuthError::network(format!("I/O failure during the {grant} grant"), inner)
						.into(),
				RequestStage::Resource => TransportError::Io(inner).into(),
			},
			HttpClientError::Other(message) => map_generic_transport_error(stage, meta, message),
			_ => map_generic_transport_error(stage, meta, "unknown transport failure"),
		}
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(
	stage: RequestStage,
	meta: Option<&ResponseMetadata>,
	err: ReqwestError,
) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}

	match stage {
		RequestStage::Grant(grant) => {
			let message = if err.is_timeout() {
				format!("request timed out during the {grant} grant")
			} else {
				format!("network failure during the {grant} grant")
			};

			AuthError::Network {
				message,
				status: meta.and_then(|m| m.status).or_else(|| err.status().map(|s| s.as_u16())),
				retry_after: meta.and_then(|m| m.retry_after),
				source: Some(Box::new(err)),
			}
			.into()
		},
		RequestStage::Resource => TransportError::from(err).into(),
	}
}

/// Maps a message-only transport failure for either stage.
pub fn map_generic_transport_error(
	stage: RequestStage,
	meta: Option<&ResponseMetadata>,
	message: impl Display,
) -> Error {
	match stage {
		RequestStage::Grant(grant) => AuthError::Network {
			message: format!("HTTP client error during the {grant} grant: {message}"),
			status: meta.and_then(|m| m.status),
			retry_after: meta.and_then(|m| m.retry_after),
			source: None,
		}
		.into(),
		RequestStage::Resource => TransportError::Other { message: message.to_string() }.into(),
	}
}

/// Reads `Retry-After` as either delay seconds or an HTTP date.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return i64::try_from(secs).ok().map(Duration::seconds);
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
