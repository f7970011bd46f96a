#![cfg(feature = "reqwest")]

mod common;

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use httpmock::prelude::*;
use serde_json::json;
use tokio::task::JoinSet;
// self
use common::*;
use reddit_session::{
	auth::ScriptCredential,
	error::{AuthError, Error, HttpError},
	session::{FetchOptions, ReqwestSession},
};

const CLIENT_ID: &str = "script-id";
const CLIENT_SECRET: &str = "script-secret";
const TOKEN_PATH: &str = "/api/v1/access_token";

fn script_session(server: &MockServer, password: &str) -> ReqwestSession {
	ReqwestSession::authenticated(
		descriptor(&server.base_url()),
		ScriptCredential::new(CLIENT_ID, CLIENT_SECRET, "tester", password),
	)
	.expect("Script session should build.")
}

fn basic_auth() -> String {
	format!("Basic {}", STANDARD.encode(format!("{CLIENT_ID}:{CLIENT_SECRET}")))
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials_and_stores_no_token() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"error": "invalid_grant"}"#);
		})
		.await;
	let resource_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/me");
			then.status(200).header("content-type", "application/json").body("{}");
		})
		.await;
	let session = script_session(&server, "wrong-password");
	let err = session
		.fetch("/api/v1/me", FetchOptions::get())
		.await
		.expect_err("The grant must be rejected.");

	match err {
		Error::Auth(AuthError::InvalidCredentials { reason, .. }) =>
			assert_eq!(reason, "invalid_grant"),
		other => panic!("Unexpected error variant: {other:?}."),
	}

	let manager = session.token_manager().expect("Script sessions carry a token manager.");

	assert!(manager.current_token().is_none());
	assert_eq!(manager.metrics().failures(), 1);

	token_mock.assert_calls_async(1).await;
	resource_mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn password_grant_token_is_reused_as_a_bearer() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH).header("authorization", basic_auth());
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-1", None).to_string());
		})
		.await;
	let resource_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v1/me")
				.query_param("raw_json", "1")
				.header("authorization", "bearer access-1")
				.header("user-agent", USER_AGENT);
			then.status(200)
				.header("content-type", "application/json")
				.header("x-ratelimit-remaining", "599.0")
				.header("x-ratelimit-reset", "540")
				.header("x-ratelimit-used", "1")
				.body(r#"{"name": "tester"}"#);
		})
		.await;
	let session = script_session(&server, "hunter2");

	for _ in 0..2 {
		let me =
			session.fetch("/api/v1/me", FetchOptions::get()).await.expect("Fetch should pass.");

		assert_eq!(me, json!({"name": "tester"}));
	}

	let token = session
		.token_manager()
		.and_then(|manager| manager.current_token())
		.expect("A token should be cached.");

	assert_eq!(token.access_token.expose(), "access-1");
	assert!(token.refresh_token.is_none());
	assert!(token.expires_at > time::OffsetDateTime::now_utc());

	token_mock.assert_calls_async(1).await;
	resource_mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn concurrent_fetches_share_one_password_grant() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_millis(200))
				.body(token_body("shared", None).to_string());
		})
		.await;
	let resource_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/me").header("authorization", "bearer shared");
			then.status(200).header("content-type", "application/json").body("{}");
		})
		.await;
	let session = script_session(&server, "hunter2");
	let mut tasks = JoinSet::new();

	for _ in 0..10 {
		let session = session.clone();

		tasks.spawn(async move { session.fetch("/api/v1/me", FetchOptions::get()).await });
	}

	while let Some(joined) = tasks.join_next().await {
		joined.expect("Task should not panic.").expect("Every fetch should succeed.");
	}

	let manager = session.token_manager().expect("Script sessions carry a token manager.");

	assert_eq!(manager.metrics().attempts(), 1);

	token_mock.assert_calls_async(1).await;
	resource_mock.assert_calls_async(10).await;
}

#[tokio::test]
async fn short_lived_tokens_still_share_one_grant() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_millis(200))
				.body(token_body_expiring_in("shared", None, 10).to_string());
		})
		.await;
	let resource_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/me").header("authorization", "bearer shared");
			then.status(200).header("content-type", "application/json").body("{}");
		})
		.await;
	let session = script_session(&server, "hunter2");
	let mut tasks = JoinSet::new();

	// Ten seconds is shorter than the default expiry margin.
	for _ in 0..10 {
		let session = session.clone();

		tasks.spawn(async move { session.fetch("/api/v1/me", FetchOptions::get()).await });
	}

	while let Some(joined) = tasks.join_next().await {
		joined.expect("Task should not panic.").expect("Every fetch should succeed.");
	}

	let manager = session.token_manager().expect("Script sessions carry a token manager.");

	assert_eq!(manager.metrics().attempts(), 1);

	token_mock.assert_calls_async(1).await;
	resource_mock.assert_calls_async(10).await;
}

#[tokio::test]
async fn unauthorized_resource_drops_the_cached_token() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("revoked", None).to_string());
		})
		.await;
	let resource_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/me");
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"message": "Unauthorized", "error": 401}"#);
		})
		.await;
	let session = script_session(&server, "hunter2");

	for _ in 0..2 {
		let err = session
			.fetch("/api/v1/me", FetchOptions::get())
			.await
			.expect_err("The resource rejects the token.");

		assert!(matches!(err, Error::Http(HttpError { status: 401, .. })));
		assert!(session.token_manager().and_then(|m| m.current_token()).is_none());
	}

	token_mock.assert_calls_async(2).await;
	resource_mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn overloaded_token_endpoint_is_retryable() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(503).header("content-type", "text/html").body("<html>busy</html>");
		})
		.await;
	let session = script_session(&server, "hunter2");
	let err = session
		.fetch("/api/v1/me", FetchOptions::get())
		.await
		.expect_err("The token endpoint is down.");

	match err {
		Error::Auth(auth @ AuthError::Network { .. }) => {
			assert!(auth.is_retryable());
			assert_eq!(Error::from(auth).status(), Some(503));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	token_mock.assert_calls_async(1).await;
}
