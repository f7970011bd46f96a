//! Token lifecycle for authenticated sessions.
//!
//! [`TokenManager::ensure_valid_token`] returns a token that stays valid for at least the
//! descriptor's expiry margin. Renewal is singleflight: callers that find the cached token
//! unusable queue on one async mutex, and whoever acquires it first re-checks the cache before
//! issuing the grant. Everyone behind it then reuses the fresh token instead of calling the
//! token endpoint again.

// self
use crate::{
	_prelude::*,
	auth::{Credential, Token, TokenSecret},
	config::ApiDescriptor,
	deadline::Deadline,
	error::{AuthError, WaitStage},
	http::{ApiHttpClient, TransportErrorMapper},
	oauth::BasicFacade,
	obs::{self, OpKind, OpOutcome, OpSpan},
	session::GrantMetrics,
};

/// Owns the credential and current token of one session.
pub struct TokenManager<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	credential: Credential,
	facade: Option<BasicFacade<C, M>>,
	token: RwLock<Option<Token>>,
	refresh_token: Mutex<Option<TokenSecret>>,
	singleflight: AsyncMutex<()>,
	expiry_margin: Duration,
	metrics: GrantMetrics,
}
impl<C, M> TokenManager<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Validates `credential` and prepares the grant client it needs.
	pub fn new(
		descriptor: &ApiDescriptor,
		credential: Credential,
		http_client: Arc<C>,
		transport_mapper: Arc<M>,
	) -> Result<Self> {
		credential.validate()?;

		let facade = match &credential {
			Credential::Script(script) => Some(BasicFacade::new(
				&descriptor.endpoints.token,
				&script.client_id,
				&script.client_secret,
				http_client,
				transport_mapper,
			)?),
			Credential::Web(web) => Some(BasicFacade::new(
				&descriptor.endpoints.token,
				&web.client_id,
				&web.client_secret,
				http_client,
				transport_mapper,
			)?),
			Credential::Static(_) => None,
		};
		let token = credential.initial_token(OffsetDateTime::now_utc())?;
		let refresh_token = match &credential {
			Credential::Web(web) => web.refresh_token.clone(),
			_ => None,
		};

		Ok(Self {
			credential,
			facade,
			token: RwLock::new(token),
			refresh_token: Mutex::new(refresh_token),
			singleflight: AsyncMutex::new(()),
			expiry_margin: descriptor.token_expiry_margin,
			metrics: GrantMetrics::default(),
		})
	}

	/// Credential the session was built from.
	pub fn credential(&self) -> &Credential {
		&self.credential
	}

	/// Grant counters for this session.
	pub fn metrics(&self) -> &GrantMetrics {
		&self.metrics
	}

	/// Cached token, usable or not.
	pub fn current_token(&self) -> Option<Token> {
		self.token.read().clone()
	}

	/// Returns `true` when `token` can still be sent at `now`.
	pub fn is_usable_at(&self, token: &Token, now: OffsetDateTime) -> bool {
		token.is_usable_at(now, self.expiry_margin)
	}

	/// Drops the cached token so the next request re-acquires one.
	///
	/// The refresh token of a web session is kept.
	pub fn invalidate(&self) {
		*self.token.write() = None;
	}

	/// Returns a token valid beyond the expiry margin, acquiring one when necessary.
	///
	/// At most one grant call is in flight per manager. Waiting for another caller's grant is
	/// bounded by `deadline`.
	pub async fn ensure_valid_token(&self, deadline: Option<Deadline>) -> Result<Token> {
		if let Some(token) = self.usable_token() {
			return Ok(token);
		}

		let _singleflight =
			Deadline::run(deadline, WaitStage::TokenAcquisition, self.singleflight.lock()).await?;

		if let Some(token) = self.usable_token() {
			return Ok(token);
		}

		self.acquire().await
	}

	fn usable_token(&self) -> Option<Token> {
		let now = OffsetDateTime::now_utc();

		self.token.read().as_ref().filter(|token| self.is_usable_at(token, now)).cloned()
	}

	// Caller must hold the singleflight guard.
	async fn acquire(&self) -> Result<Token> {
		let kind = match &self.credential {
			Credential::Script(_) => OpKind::PasswordGrant,
			Credential::Web(_) => OpKind::RefreshGrant,
			Credential::Static(_) => {
				self.invalidate();

				return Err(AuthError::RefreshTokenMissing.into());
			},
		};
		let refresh_token = self.refresh_token.lock().clone();

		if kind == OpKind::RefreshGrant && refresh_token.is_none() {
			self.invalidate();

			return Err(AuthError::RefreshTokenMissing.into());
		}

		let Some(facade) = self.facade.as_ref() else {
			return Err(AuthError::RefreshTokenMissing.into());
		};
		let span = OpSpan::new(kind, "ensure_valid_token");

		obs::record_op_outcome(kind, OpOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span
			.instrument(async {
				match (&self.credential, refresh_token.as_ref()) {
					(Credential::Script(script), _) =>
						facade.exchange_password(&script.username, &script.password).await,
					(_, Some(refresh)) => facade.refresh_token(refresh).await,
					(_, None) => Err(AuthError::RefreshTokenMissing.into()),
				}
			})
			.await;

		obs::record_op_outcome(kind, OpOutcome::of(&result));

		match result {
			Ok(token) => {
				self.metrics.record_success();

				if kind == OpKind::RefreshGrant {
					if let Some(refresh) = &token.refresh_token {
						*self.refresh_token.lock() = Some(refresh.clone());
					}
				}

				obs::diagnostic(format_args!(
					"{kind} issued token {} expiring at {}",
					token.access_token.fingerprint(),
					token.expires_at
				));

				*self.token.write() = Some(token.clone());

				Ok(token)
			},
			Err(e) => {
				self.metrics.record_failure();
				self.invalidate();

				Err(e)
			},
		}
	}
}
impl<C, M> Debug for TokenManager<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("credential", &self.credential.kind())
			.field("token", &*self.token.read())
			.field("expiry_margin", &self.expiry_margin)
			.field("metrics", &self.metrics)
			.finish()
	}
}
