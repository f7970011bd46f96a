//! Sessions: one descriptor, one optional credential, one token, one rate-limit budget.
//!
//! A [`Session`] is the composition of a base (descriptor, transport, [`RateLimiter`]) with an
//! optional [`TokenManager`]. Anonymous sessions talk to the public host without an
//! `Authorization` header; authenticated sessions talk to the OAuth host with a bearer token.
//! Clones share every piece of state, so one session can serve many concurrent callers
//! without ever splitting its budget or issuing parallel grants.

pub mod authorize;
pub mod fetch;
pub mod token_manager;

mod metrics;

pub use authorize::*;
pub use fetch::*;
pub use metrics::GrantMetrics;
pub use token_manager::TokenManager;

// self
use crate::{
	_prelude::*,
	auth::Credential,
	config::ApiDescriptor,
	http::{ApiHttpClient, TransportErrorMapper},
	rate_limit::RateLimiter,
};
#[cfg(feature = "reqwest")]
use crate::http::{ReqwestHttpClient, ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Session specialized for the crate's default reqwest transport stack.
pub type ReqwestSession = Session<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Request pipeline bound to one credential (or none).
pub struct Session<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	descriptor: Arc<ApiDescriptor>,
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
	rate_limiter: Arc<RateLimiter>,
	authenticator: Option<Arc<TokenManager<C, M>>>,
}
impl<C, M> Session<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds a session over a caller-provided transport + mapper pair.
	///
	/// `credential` is validated here, once; `None` yields an anonymous session.
	pub fn with_http_client(
		descriptor: ApiDescriptor,
		credential: Option<Credential>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let http_client = http_client.into();
		let transport_mapper = mapper.into();
		let authenticator = match credential {
			Some(credential) => Some(Arc::new(TokenManager::new(
				&descriptor,
				credential,
				http_client.clone(),
				transport_mapper.clone(),
			)?)),
			None => None,
		};
		let rate_limiter = Arc::new(RateLimiter::new(&descriptor.rate_limit));

		Ok(Self {
			descriptor: Arc::new(descriptor),
			http_client,
			transport_mapper,
			rate_limiter,
			authenticator,
		})
	}

	/// Descriptor the session was built from.
	pub fn descriptor(&self) -> &ApiDescriptor {
		&self.descriptor
	}

	/// Returns `true` when requests carry a bearer token.
	pub fn is_authenticated(&self) -> bool {
		self.authenticator.is_some()
	}

	/// Token manager of an authenticated session.
	pub fn token_manager(&self) -> Option<&TokenManager<C, M>> {
		self.authenticator.as_deref()
	}

	/// Rate limiter shared by every clone of this session.
	pub fn rate_limiter(&self) -> &RateLimiter {
		&self.rate_limiter
	}
}
#[cfg(feature = "reqwest")]
impl Session<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates an anonymous session against the public host.
	pub fn anonymous(descriptor: ApiDescriptor) -> Result<Self> {
		let http_client = ReqwestHttpClient::for_user_agent(&descriptor.user_agent)?;

		Self::with_http_client(descriptor, None, http_client, ReqwestTransportErrorMapper)
	}

	/// Creates a session that authenticates with `credential`.
	pub fn authenticated(
		descriptor: ApiDescriptor,
		credential: impl Into<Credential>,
	) -> Result<Self> {
		let http_client = ReqwestHttpClient::for_user_agent(&descriptor.user_agent)?;

		Self::with_http_client(
			descriptor,
			Some(credential.into()),
			http_client,
			ReqwestTransportErrorMapper,
		)
	}
}
impl<C, M> Clone for Session<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			descriptor: self.descriptor.clone(),
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			rate_limiter: self.rate_limiter.clone(),
			authenticator: self.authenticator.clone(),
		}
	}
}
impl<C, M> Debug for Session<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("descriptor", &self.descriptor)
			.field("rate_limiter", &self.rate_limiter)
			.field("authenticator", &self.authenticator)
			.finish()
	}
}
