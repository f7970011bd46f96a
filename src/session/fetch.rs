//! Per-request pipeline: path resolution, token gate, rate-limit gate, exchange, decoding.

// crates.io
use oauth2::{
	AsyncHttpClient, HttpRequest, HttpResponse,
	http::{
		Method,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT},
	},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::Token,
	deadline::Deadline,
	error::{ConfigError, DecodeError, HttpError},
	http::{
		ApiHttpClient, RequestStage, ResponseMetadataSlot, TransportErrorMapper, parse_retry_after,
	},
	obs::{self, OpKind, OpOutcome, OpSpan},
	rate_limit::Budget,
	session::Session,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Per-call knobs for [`Session::fetch`].
#[derive(Clone, Debug)]
pub struct FetchOptions {
	/// HTTP method; defaults to `GET`.
	pub method: Method,
	/// Query parameters appended after the session's own normalization.
	pub query: Vec<(String, String)>,
	/// Form-encoded request body.
	pub form: Option<Vec<(String, String)>>,
	/// Deadline for the token and rate-limit waits; falls back to the descriptor's `max_wait`.
	pub max_wait: Option<Duration>,
}
impl FetchOptions {
	/// `GET` without parameters.
	pub fn get() -> Self {
		Self::default()
	}

	/// `POST` with an empty form body.
	pub fn post() -> Self {
		Self::default().method(Method::POST).with_form()
	}

	/// Overrides the HTTP method.
	pub fn method(mut self, method: Method) -> Self {
		self.method = method;

		self
	}

	/// Appends a query parameter.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Appends a form field, switching the body to form encoding.
	pub fn form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.form.get_or_insert_with(Vec::new).push((key.into(), value.into()));

		self
	}

	/// Bounds how long the call may wait on the token and rate-limit gates.
	pub fn max_wait(mut self, max_wait: Duration) -> Self {
		self.max_wait = Some(max_wait);

		self
	}

	fn with_form(mut self) -> Self {
		self.form.get_or_insert_with(Vec::new);

		self
	}
}
impl Default for FetchOptions {
	fn default() -> Self {
		Self { method: Method::GET, query: Vec::new(), form: None, max_wait: None }
	}
}

impl<C, M> Session<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Performs one request and returns the decoded JSON body.
	pub async fn fetch(&self, path: &str, options: FetchOptions) -> Result<serde_json::Value> {
		self.fetch_as(path, options).await
	}

	/// Performs one request and decodes the body into `T`.
	///
	/// Non-2xx answers fail with [`HttpError`]; 2xx answers whose body does not match `T` fail
	/// with [`DecodeError`]. A 429 resynchronizes the budget and, when the descriptor allows
	/// it, is retried once.
	pub async fn fetch_as<T>(&self, path: &str, options: FetchOptions) -> Result<T>
	where
		T: DeserializeOwned,
	{
		const KIND: OpKind = OpKind::Fetch;

		let span = OpSpan::new(KIND, "fetch");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.fetch_inner(path, &options)).await;

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}

	/// Resolves `path` against the session's base URL with the session's query normalization.
	///
	/// `path` may carry its own query string (`/api/submit?url=https://...`); only the part
	/// before `?` must be a relative path on the session's host. Anonymous sessions get the
	/// `.json` suffix, and `raw_json=1` is added unless the path already sets it.
	pub fn resolve_url(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
		let trimmed = path.trim();
		let path_part = trimmed.split(['?', '#']).next().unwrap_or_default();

		if path_part.is_empty() || path_part.contains("://") || path_part.starts_with("//") {
			return Err(ConfigError::InvalidPath { path: path.to_owned() }.into());
		}

		let authenticated = self.is_authenticated();
		let quirks = &self.descriptor.quirks;
		let base = self.descriptor.base_url(authenticated);
		let relative =
			if trimmed.starts_with('/') { trimmed.to_owned() } else { format!("/{trimmed}") };
		let mut url =
			base.join(&relative).map_err(|source| ConfigError::InvalidUrl { source })?;

		if url.origin() != base.origin() {
			return Err(ConfigError::InvalidPath { path: path.to_owned() }.into());
		}

		if !authenticated && quirks.public_json_suffix && !url.path().ends_with(".json") {
			let path = format!("{}.json", url.path().trim_end_matches('/'));

			url.set_path(&path);
		}

		let has_raw_json = url.query_pairs().any(|(key, _)| key == "raw_json");

		{
			let mut pairs = url.query_pairs_mut();

			if quirks.raw_json && !has_raw_json {
				pairs.append_pair("raw_json", "1");
			}
			for (key, value) in query {
				pairs.append_pair(key, value);
			}
		}

		Ok(url)
	}

	async fn fetch_inner<T>(&self, path: &str, options: &FetchOptions) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let deadline = Deadline::from_max_wait(options.max_wait.or(self.descriptor.max_wait));
		let url = self.resolve_url(path, &options.query)?;
		let mut retried = false;

		loop {
			let response = self.exchange(&url, options, deadline).await?;

			let throttled = response.status().as_u16() == 429;

			if throttled && self.descriptor.quirks.retry_on_429 && !retried {
				obs::diagnostic(format_args!("429 from {}; retrying after resync", url.path()));

				retried = true;

				continue;
			}

			return decode(response);
		}
	}

	async fn exchange(
		&self,
		url: &Url,
		options: &FetchOptions,
		deadline: Option<Deadline>,
	) -> Result<HttpResponse> {
		let mut token = match &self.authenticator {
			Some(manager) => Some(manager.ensure_valid_token(deadline).await?),
			None => None,
		};
		let permit = self.rate_limiter.before_send(deadline).await?;

		// The rate-limit wait may have outlived the token.
		if let Some(manager) = &self.authenticator {
			let now = OffsetDateTime::now_utc();

			if token.as_ref().is_some_and(|current| !manager.is_usable_at(current, now)) {
				token = Some(manager.ensure_valid_token(deadline).await?);
			}
		}

		let request = self.build_request(url, options, token.as_ref())?;
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());
		let response = match handle.call(request).await {
			Ok(response) => response,
			Err(e) => {
				let meta = meta.take();

				return Err(self.transport_mapper.map_transport_error(
					RequestStage::Resource,
					meta.as_ref(),
					e,
				));
			},
		};

		self.rate_limiter.after_receive(response.headers());

		match response.status().as_u16() {
			401 =>
				if let Some(manager) = &self.authenticator {
					obs::diagnostic("401 from the API; dropping the cached token");
					manager.invalidate();
				},
			429 => match self.rate_limiter.snapshot() {
				Budget::Tracked(state) if state.remaining == 0 => {},
				_ => self.rate_limiter.throttle(parse_retry_after(response.headers())),
			},
			_ => {},
		}

		drop(permit);

		Ok(response)
	}

	fn build_request(
		&self,
		url: &Url,
		options: &FetchOptions,
		token: Option<&Token>,
	) -> Result<HttpRequest> {
		let mut builder = oauth2::http::Request::builder()
			.method(options.method.clone())
			.uri(url.as_str())
			.header(USER_AGENT, self.descriptor.user_agent.as_str())
			.header(ACCEPT, "application/json");

		if let Some(token) = token {
			builder = builder.header(AUTHORIZATION, token.bearer_header());
		}

		let body = match &options.form {
			Some(fields) => {
				builder = builder.header(CONTENT_TYPE, FORM_CONTENT_TYPE);

				url::form_urlencoded::Serializer::new(String::new())
					.extend_pairs(fields)
					.finish()
					.into_bytes()
			},
			None => Vec::new(),
		};

		builder.body(body).map_err(|e| ConfigError::from(e).into())
	}
}

fn decode<T>(response: HttpResponse) -> Result<T>
where
	T: DeserializeOwned,
{
	let status = response.status().as_u16();

	if !response.status().is_success() {
		return Err(HttpError {
			status,
			body: String::from_utf8_lossy(response.body()).into_owned(),
		}
		.into());
	}

	let mut de = serde_json::Deserializer::from_slice(response.body());

	serde_path_to_error::deserialize(&mut de)
		.map_err(|source| DecodeError { source, status: Some(status) }.into())
}
