//! Shared fixtures for integration tests: a scripted transport, descriptors, and response
//! builders.

#![allow(dead_code)]

// std
use std::{
	future::Future,
	pin::Pin,
	sync::{Arc, Mutex},
	time::Instant,
};
// crates.io
use serde_json::Value;
// self
use reddit_session::{
	auth::Credential,
	config::ApiDescriptor,
	error::Error,
	http::{
		ApiHttpClient, RequestStage, ResponseMetadata, ResponseMetadataSlot, TransportErrorMapper,
		map_generic_transport_error,
	},
	oauth::oauth2::{
		AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
		http::{HeaderMap, Method},
	},
	session::Session,
	url::Url,
};

pub const USER_AGENT: &str = "test:reddit-session:v0.1.0 (by /u/tester)";

/// Reply produced by a [`FakeHttpClient`] responder; `Err` simulates a transport failure.
pub type Reply = Result<HttpResponse, String>;

type Responder = dyn Fn(&RecordedRequest, usize) -> Reply + Send + Sync;

/// Request captured by the fake transport.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
	pub method: Method,
	pub url: Url,
	pub headers: HeaderMap,
	pub body: String,
	pub sent_at: Instant,
}
impl RecordedRequest {
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}

	pub fn query(&self, key: &str) -> Option<String> {
		self.url.query_pairs().find(|(k, _)| k == key).map(|(_, v)| v.into_owned())
	}
}

struct FakeState {
	responder: Box<Responder>,
	requests: Mutex<Vec<RecordedRequest>>,
}

/// Transport that answers every request through a scripted responder and records it.
#[derive(Clone)]
pub struct FakeHttpClient {
	state: Arc<FakeState>,
}
impl FakeHttpClient {
	/// `responder` receives each request plus its zero-based index across the whole session.
	pub fn new<F>(responder: F) -> Self
	where
		F: Fn(&RecordedRequest, usize) -> Reply + Send + Sync + 'static,
	{
		Self {
			state: Arc::new(FakeState {
				responder: Box::new(responder),
				requests: Mutex::new(Vec::new()),
			}),
		}
	}

	pub fn requests(&self) -> Vec<RecordedRequest> {
		self.state.requests.lock().expect("Request log should not be poisoned.").clone()
	}
}
impl ApiHttpClient for FakeHttpClient {
	type Handle = FakeHttpHandle;
	type TransportError = std::io::Error;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		FakeHttpHandle { state: self.state.clone(), slot }
	}
}

pub struct FakeHttpHandle {
	state: Arc<FakeState>,
	slot: ResponseMetadataSlot,
}
impl<'a> AsyncHttpClient<'a> for FakeHttpHandle {
	type Error = HttpClientError<std::io::Error>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send + Sync>>;

	fn call(&'a self, request: HttpRequest) -> Self::Future {
		self.slot.take();

		let recorded = RecordedRequest {
			method: request.method().clone(),
			url: Url::parse(&request.uri().to_string()).expect("Request URI should be absolute."),
			headers: request.headers().clone(),
			body: String::from_utf8_lossy(request.body()).into_owned(),
			sent_at: Instant::now(),
		};
		let index = {
			let mut requests =
				self.state.requests.lock().expect("Request log should not be poisoned.");

			requests.push(recorded.clone());

			requests.len() - 1
		};
		let reply = (self.state.responder)(&recorded, index);

		if let Ok(response) = &reply {
			self.slot.store(ResponseMetadata {
				status: Some(response.status().as_u16()),
				retry_after: None,
			});
		}

		Box::pin(async move { reply.map_err(HttpClientError::Other) })
	}
}

/// Mapper that classifies every fake transport failure through the crate's generic mapping.
#[derive(Clone, Debug, Default)]
pub struct FakeMapper;
impl TransportErrorMapper<std::io::Error> for FakeMapper {
	fn map_transport_error(
		&self,
		stage: RequestStage,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<std::io::Error>,
	) -> Error {
		map_generic_transport_error(stage, meta, err)
	}
}

pub type FakeSession = Session<FakeHttpClient, FakeMapper>;

pub fn descriptor(base: &str) -> ApiDescriptor {
	let base = Url::parse(base).expect("Base URL fixture should parse.");

	ApiDescriptor::builder(USER_AGENT)
		.single_host(&base)
		.expect("Single-host endpoints should join.")
		.build()
		.expect("Descriptor fixture should be valid.")
}

pub fn fake_session(
	client: &FakeHttpClient,
	descriptor: ApiDescriptor,
	credential: Option<Credential>,
) -> FakeSession {
	Session::with_http_client(descriptor, credential, client.clone(), FakeMapper)
		.expect("Session fixture should build.")
}

pub fn json_response(status: u16, body: Value) -> HttpResponse {
	json_response_with_headers(status, body, &[])
}

pub fn json_response_with_headers(
	status: u16,
	body: Value,
	headers: &[(&'static str, &str)],
) -> HttpResponse {
	raw_response(status, body.to_string(), headers)
}

pub fn raw_response(
	status: u16,
	body: impl Into<String>,
	headers: &[(&'static str, &str)],
) -> HttpResponse {
	let mut builder = reddit_session::oauth::oauth2::http::Response::builder()
		.status(status)
		.header("content-type", "application/json");

	for (name, value) in headers {
		builder = builder.header(*name, *value);
	}

	builder.body(body.into().into_bytes()).expect("Response fixture should build.")
}

/// Listing envelope whose children are `{"name": "t3_<n>"}` for every `n` in `ids`.
pub fn listing(ids: impl IntoIterator<Item = usize>, after: Option<&str>) -> Value {
	let children = ids
		.into_iter()
		.map(|id| serde_json::json!({ "kind": "t3", "data": { "name": format!("t3_{id}") } }))
		.collect::<Vec<_>>();

	serde_json::json!({
		"kind": "Listing",
		"data": { "children": children, "after": after, "before": null }
	})
}

pub fn token_body(access_token: &str, refresh_token: Option<&str>) -> Value {
	token_body_expiring_in(access_token, refresh_token, 3600)
}

pub fn token_body_expiring_in(
	access_token: &str,
	refresh_token: Option<&str>,
	expires_in: u64,
) -> Value {
	let mut body = serde_json::json!({
		"access_token": access_token,
		"token_type": "bearer",
		"expires_in": expires_in,
		"scope": "*"
	});

	if let Some(refresh) = refresh_token {
		body["refresh_token"] = Value::String(refresh.to_owned());
	}

	body
}
