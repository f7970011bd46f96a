//! Demonstrates a script-app session walking a subreddit listing against a local mock server.
//!
//! The password grant runs once and the listing request carries the resulting bearer token. The
//! paginator stops as soon as the server returns no `after` cursor.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde::Deserialize;
use serde_json::json;
// self
use reddit_session::{
	auth::ScriptCredential,
	config::ApiDescriptor,
	listing::ListingRequest,
	session::ReqwestSession,
	url::Url,
};

#[derive(Debug, Deserialize)]
struct Link {
	name: String,
	title: String,
}

fn page(range: std::ops::Range<usize>, after: Option<&str>) -> String {
	let children = range
		.map(|n| {
			json!({"kind": "t3", "data": {"name": format!("t3_{n}"), "title": format!("Post {n}")}})
		})
		.collect::<Vec<_>>();

	json!({"kind": "Listing", "data": {"children": children, "after": after}}).to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/access_token");
			then.status(200).header("content-type", "application/json").body(
				json!({
					"access_token": "demo-access",
					"token_type": "bearer",
					"expires_in": 3600,
					"scope": "*"
				})
				.to_string(),
			);
		})
		.await;
	let listing_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/r/rust/new")
				.query_param("limit", "25")
				.header("authorization", "bearer demo-access");
			then.status(200)
				.header("content-type", "application/json")
				.header("x-ratelimit-remaining", "599.0")
				.header("x-ratelimit-reset", "600")
				.header("x-ratelimit-used", "1")
				.body(page(0..25, None));
		})
		.await;
	let descriptor = ApiDescriptor::builder("demo:reddit-session:v0.1.0 (by /u/demo)")
		.single_host(&Url::parse(&server.base_url())?)?
		.build()?;
	let session = ReqwestSession::authenticated(
		descriptor,
		ScriptCredential::new("demo-client", "demo-secret", "demo", "hunter2"),
	)?;
	let links: Vec<Link> =
		session.paginate(&ListingRequest::new("/r/rust/new").page_size(25), 100).await?;

	for link in links.iter().take(3) {
		println!("{} {}", link.name, link.title);
	}

	println!("Fetched {} links; budget {:?}.", links.len(), session.rate_limiter().snapshot());

	token_mock.assert_async().await;
	listing_mock.assert_async().await;

	Ok(())
}
