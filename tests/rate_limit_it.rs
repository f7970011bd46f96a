mod common;

// std
use std::time::Duration as StdDuration;
// crates.io
use serde_json::json;
use time::{Duration, OffsetDateTime};
// self
use common::*;
use reddit_session::{
	auth::{StaticToken, WebCredential},
	config::{ApiDescriptor, ApiQuirks, RateLimitDefaults},
	error::{Error, HttpError, WaitStage},
	rate_limit::{Budget, HEADER_REMAINING, HEADER_RESET, HEADER_USED, MAX_RESET},
	session::FetchOptions,
	url::Url,
};

fn static_session(client: &FakeHttpClient, descriptor: ApiDescriptor) -> FakeSession {
	fake_session(client, descriptor, Some(StaticToken::new("static-token").into()))
}

fn without_429_retry() -> ApiDescriptor {
	let base = Url::parse("http://127.0.0.1:9").expect("Base URL fixture should parse.");
	let mut quirks = ApiQuirks::default();

	quirks.retry_on_429 = false;

	ApiDescriptor::builder(USER_AGENT)
		.single_host(&base)
		.expect("Single-host endpoints should join.")
		.quirks(quirks)
		.build()
		.expect("Descriptor fixture should be valid.")
}

fn ok_with_budget(remaining: &str, reset: &str) -> Reply {
	Ok(json_response_with_headers(
		200,
		json!({"ok": true}),
		&[(HEADER_REMAINING, remaining), (HEADER_RESET, reset), (HEADER_USED, "600")],
	))
}

#[tokio::test]
async fn exhausted_budget_delays_the_next_send_until_the_reset() {
	let client = FakeHttpClient::new(|_, index| match index {
		0 => ok_with_budget("0", "2"),
		_ => ok_with_budget("599", "600"),
	});
	let session = static_session(&client, descriptor("http://127.0.0.1:9"));

	session.fetch("/api/v1/me", FetchOptions::get()).await.expect("First fetch should pass.");

	match session.rate_limiter().snapshot() {
		Budget::Tracked(state) => assert_eq!(state.remaining, 0),
		other => panic!("Unexpected budget: {other:?}."),
	}

	session.fetch("/api/v1/me", FetchOptions::get()).await.expect("Second fetch should pass.");

	let requests = client.requests();

	assert_eq!(requests.len(), 2);
	assert!(requests[1].sent_at - requests[0].sent_at >= StdDuration::from_millis(1_950));
}

#[tokio::test]
async fn too_many_requests_is_resynchronized_and_retried_once() {
	let client = FakeHttpClient::new(|_, index| match index {
		0 => Ok(json_response_with_headers(
			429,
			json!({"message": "Too Many Requests", "error": 429}),
			&[(HEADER_REMAINING, "0"), (HEADER_RESET, "1")],
		)),
		_ => ok_with_budget("598", "599"),
	});
	let session = static_session(&client, descriptor("http://127.0.0.1:9"));
	let body = session.fetch("/api/v1/me", FetchOptions::get()).await.expect("Retry should pass.");
	let requests = client.requests();

	assert_eq!(body, json!({"ok": true}));
	assert_eq!(requests.len(), 2);
	assert!(requests[1].sent_at - requests[0].sent_at >= StdDuration::from_millis(950));
}

#[tokio::test]
async fn repeated_too_many_requests_surfaces_the_http_error() {
	let client = FakeHttpClient::new(|_, _| {
		Ok(json_response_with_headers(
			429,
			json!({"message": "Too Many Requests", "error": 429}),
			&[(HEADER_REMAINING, "0"), (HEADER_RESET, "0")],
		))
	});
	let session = static_session(&client, descriptor("http://127.0.0.1:9"));
	let err = session
		.fetch("/api/v1/me", FetchOptions::get())
		.await
		.expect_err("The retry also hits 429.");

	assert!(matches!(err, Error::Http(HttpError { status: 429, .. })));
	assert_eq!(client.requests().len(), 2);
}

#[tokio::test]
async fn too_many_requests_without_headers_throttles_the_budget() {
	let client = FakeHttpClient::new(|_, _| {
		Ok(raw_response(429, "{}", &[("retry-after", "30")]))
	});
	let session = static_session(&client, without_429_retry());
	let err = session
		.fetch("/api/v1/me", FetchOptions::get())
		.await
		.expect_err("429 is surfaced when retries are disabled.");

	assert!(matches!(err, Error::Http(HttpError { status: 429, .. })));
	assert_eq!(client.requests().len(), 1);

	match session.rate_limiter().snapshot() {
		Budget::Tracked(state) => assert_eq!(state.remaining, 0),
		other => panic!("Unexpected budget: {other:?}."),
	}
}

#[tokio::test]
async fn missing_headers_never_block() {
	let client = FakeHttpClient::new(|_, _| Ok(json_response(200, json!({}))));
	let base = Url::parse("http://127.0.0.1:9").expect("Base URL fixture should parse.");
	let descriptor = ApiDescriptor::builder(USER_AGENT)
		.single_host(&base)
		.expect("Single-host endpoints should join.")
		.rate_limit(RateLimitDefaults { initial_remaining: 1, window: Duration::minutes(10) })
		.build()
		.expect("Descriptor fixture should be valid.");
	let session = static_session(&client, descriptor);
	let started = std::time::Instant::now();

	for _ in 0..3 {
		session.fetch("/api/v1/me", FetchOptions::get()).await.expect("Fetch should pass.");
	}

	assert!(started.elapsed() < StdDuration::from_secs(1));
	assert_eq!(session.rate_limiter().snapshot(), Budget::Unconstrained);
	assert_eq!(client.requests().len(), 3);
}

#[tokio::test]
async fn deadline_bounds_the_rate_limit_wait() {
	let client = FakeHttpClient::new(|_, _| ok_with_budget("0", "60"));
	let session = static_session(&client, descriptor("http://127.0.0.1:9"));

	session.fetch("/api/v1/me", FetchOptions::get()).await.expect("First fetch should pass.");

	let err = session
		.fetch("/api/v1/me", FetchOptions::get().max_wait(Duration::seconds(1)))
		.await
		.expect_err("The reset lies a minute away.");

	assert!(matches!(err, Error::DeadlineExceeded { stage: WaitStage::RateLimit }));
	assert_eq!(client.requests().len(), 1);
}

#[tokio::test]
async fn error_responses_still_update_the_budget() {
	let client = FakeHttpClient::new(|_, _| {
		Ok(json_response_with_headers(
			404,
			json!({"message": "Not Found", "error": 404}),
			&[(HEADER_REMAINING, "41.0"), (HEADER_RESET, "120")],
		))
	});
	let session = static_session(&client, descriptor("http://127.0.0.1:9"));
	let err = session
		.fetch("/r/definitely-missing/about", FetchOptions::get())
		.await
		.expect_err("404 is an error.");

	assert_eq!(err.status(), Some(404));

	match session.rate_limiter().snapshot() {
		Budget::Tracked(state) => assert_eq!(state.remaining, 41),
		other => panic!("Unexpected budget: {other:?}."),
	}
}

#[tokio::test]
async fn enormous_retry_after_is_clamped_instead_of_overflowing() {
	let client = FakeHttpClient::new(|_, _| {
		Ok(raw_response(429, "{}", &[("retry-after", "99999999999999")]))
	});
	let session = static_session(&client, without_429_retry());
	let err = session
		.fetch("/api/v1/me", FetchOptions::get())
		.await
		.expect_err("429 is surfaced when retries are disabled.");

	assert!(matches!(err, Error::Http(HttpError { status: 429, .. })));

	match session.rate_limiter().snapshot() {
		Budget::Tracked(state) => {
			assert_eq!(state.remaining, 0);
			assert!(state.reset_at <= OffsetDateTime::now_utc() + MAX_RESET);
		},
		other => panic!("Unexpected budget: {other:?}."),
	}

	let err = session
		.fetch("/api/v1/me", FetchOptions::get().max_wait(Duration::seconds(1)))
		.await
		.expect_err("The clamped pause still exceeds the deadline.");

	assert!(matches!(err, Error::DeadlineExceeded { stage: WaitStage::RateLimit }));
	assert_eq!(client.requests().len(), 1);
}

#[tokio::test]
async fn unrepresentable_reset_leaves_the_budget_unconstrained() {
	let client = FakeHttpClient::new(|_, _| ok_with_budget("0", "1e12"));
	let session = static_session(&client, descriptor("http://127.0.0.1:9"));
	let started = std::time::Instant::now();

	for _ in 0..2 {
		session.fetch("/api/v1/me", FetchOptions::get()).await.expect("Fetch should pass.");
	}

	assert!(started.elapsed() < StdDuration::from_secs(1));
	assert_eq!(session.rate_limiter().snapshot(), Budget::Unconstrained);
	assert_eq!(client.requests().len(), 2);
}

#[tokio::test]
async fn token_expiring_during_the_rate_limit_wait_is_refreshed() {
	let client = FakeHttpClient::new(|request, index| {
		if request.url.path() == "/api/v1/access_token" {
			Ok(json_response(200, token_body("fresh", None)))
		} else if index == 0 {
			ok_with_budget("0", "3")
		} else {
			ok_with_budget("599", "600")
		}
	});
	// A four second lifetime caps the usability margin at two seconds, so the seed is still
	// usable when the second fetch starts and stale once the three second reset has passed.
	let credential = WebCredential::new("web-id", "web-secret", "refresh-1")
		.with_access_token("seeded", Some(OffsetDateTime::now_utc() + Duration::seconds(4)));
	let session =
		fake_session(&client, descriptor("http://127.0.0.1:9"), Some(credential.into()));

	session.fetch("/api/v1/me", FetchOptions::get()).await.expect("First fetch should pass.");
	session.fetch("/api/v1/me", FetchOptions::get()).await.expect("Second fetch should pass.");

	let requests = client.requests();

	assert_eq!(requests.len(), 3);
	assert_eq!(requests[0].header("authorization"), Some("bearer seeded"));
	assert_eq!(requests[1].method.as_str(), "POST");
	assert_eq!(requests[1].url.path(), "/api/v1/access_token");
	assert!(requests[1].body.contains("grant_type=refresh_token"));
	assert!(requests[1].sent_at - requests[0].sent_at >= StdDuration::from_millis(2_950));
	assert_eq!(requests[2].header("authorization"), Some("bearer fresh"));
}
