mod common;

// crates.io
use serde::Deserialize;
use serde_json::json;
// self
use common::*;
use reddit_session::{
	auth::StaticToken,
	error::{Error, HttpError},
	listing::{Cursor, ListingRequest},
};

#[derive(Debug, Deserialize, PartialEq)]
struct Link {
	name: String,
}

// Pages of 100, 100 and 40 items chained through `after`.
fn three_pages() -> FakeHttpClient {
	FakeHttpClient::new(|request, _| {
		let page = match request.query("after").as_deref() {
			None => listing(0..100, Some("t3_99")),
			Some("t3_99") => listing(100..200, Some("t3_199")),
			Some("t3_199") => listing(200..240, None),
			Some(other) => panic!("Unexpected cursor {other}."),
		};

		Ok(json_response(200, page))
	})
}

fn static_session(client: &FakeHttpClient) -> FakeSession {
	fake_session(
		client,
		descriptor("http://127.0.0.1:9"),
		Some(StaticToken::new("static-token").into()),
	)
}

#[tokio::test]
async fn paginate_flattens_every_page_in_server_order() {
	let client = three_pages();
	let session = static_session(&client);
	let items: Vec<Link> = session
		.paginate(&ListingRequest::new("/r/rust/new"), 1_000)
		.await
		.expect("Traversal should succeed.");

	assert_eq!(items.len(), 240);
	assert!(items.iter().enumerate().all(|(i, link)| link.name == format!("t3_{i}")));

	let requests = client.requests();

	assert_eq!(requests.len(), 3);
	assert_eq!(requests[0].query("after"), None);
	assert_eq!(requests[1].query("after").as_deref(), Some("t3_99"));
	assert_eq!(requests[1].query("count").as_deref(), Some("100"));
	assert_eq!(requests[2].query("after").as_deref(), Some("t3_199"));
	assert_eq!(requests[2].query("count").as_deref(), Some("200"));
	assert!(requests.iter().all(|r| r.query("limit").as_deref() == Some("100")));
	assert!(requests.iter().all(|r| r.header("authorization") == Some("bearer static-token")));
}

#[tokio::test]
async fn item_limit_stops_requesting_without_truncating_pages() {
	let client = three_pages();
	let session = static_session(&client);
	let items: Vec<Link> = session
		.paginate(&ListingRequest::new("/r/rust/new"), 150)
		.await
		.expect("Traversal should succeed.");

	assert_eq!(client.requests().len(), 2);
	assert_eq!(items.len(), 200);
	assert_eq!(items.last(), Some(&Link { name: "t3_199".into() }));
}

#[tokio::test]
async fn zero_item_limit_issues_no_request() {
	let client = three_pages();
	let session = static_session(&client);
	let items: Vec<Link> = session
		.paginate(&ListingRequest::new("/r/rust/new"), 0)
		.await
		.expect("Empty traversal should succeed.");

	assert!(items.is_empty());
	assert!(client.requests().is_empty());
}

#[tokio::test]
async fn failed_page_keeps_already_delivered_pages() {
	let client = FakeHttpClient::new(|_, index| match index {
		0 => Ok(json_response(200, listing(0..100, Some("t3_99")))),
		_ => Ok(raw_response(500, "upstream exploded", &[])),
	});
	let session = static_session(&client);
	let mut delivered = Vec::new();
	let err = session
		.paginate_with(&ListingRequest::new("/r/rust/new"), 1_000, |page: &[Link]| {
			delivered.push(page.len())
		})
		.await
		.expect_err("The second page fails.");

	assert_eq!(delivered, vec![100]);
	assert_eq!(client.requests().len(), 2);

	match err {
		Error::Http(HttpError { status, body }) => {
			assert_eq!(status, 500);
			assert_eq!(body, "upstream exploded");
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}
}

#[tokio::test]
async fn on_page_sees_each_page_exactly_once() {
	let client = three_pages();
	let session = static_session(&client);
	let mut sizes = Vec::new();
	let items: Vec<Link> = session
		.paginate_with(&ListingRequest::new("/r/rust/new"), 1_000, |page: &[Link]| {
			sizes.push(page.len())
		})
		.await
		.expect("Traversal should succeed.");

	assert_eq!(sizes, vec![100, 100, 40]);
	assert_eq!(items.len(), 240);
}

#[tokio::test]
async fn repeated_cursor_ends_the_traversal() {
	let client =
		FakeHttpClient::new(|_, _| Ok(json_response(200, listing(0..10, Some("t3_stuck")))));
	let session = static_session(&client);
	let items: Vec<Link> = session
		.paginate(&ListingRequest::new("/r/rust/new"), 1_000)
		.await
		.expect("Traversal should stop cleanly.");
	let requests = client.requests();

	assert_eq!(requests.len(), 2);
	assert_eq!(items.len(), 20);
	assert_eq!(requests[1].query("after").as_deref(), Some("t3_stuck"));
}

#[tokio::test]
async fn anonymous_listings_use_the_public_json_paths() {
	let client = FakeHttpClient::new(|_, _| Ok(json_response(200, listing(0..3, None))));
	let session = fake_session(&client, descriptor("http://127.0.0.1:9"), None);
	let request = ListingRequest::new("/r/rust/top").param("t", "week").page_size(3);
	let page = session
		.fetch_listing_page::<Link>(&request, None, 0)
		.await
		.expect("Page should decode.");

	assert_eq!(page.items.len(), 3);
	assert_eq!(page.after, None);

	let requests = client.requests();
	let sent = &requests[0];

	assert_eq!(sent.url.path(), "/r/rust/top.json");
	assert_eq!(sent.query("raw_json").as_deref(), Some("1"));
	assert_eq!(sent.query("limit").as_deref(), Some("3"));
	assert_eq!(sent.query("t").as_deref(), Some("week"));
	assert_eq!(sent.header("authorization"), None);
	assert_eq!(sent.header("user-agent"), Some(USER_AGENT));
}

#[tokio::test]
async fn explicit_cursor_is_forwarded_verbatim() {
	let client =
		FakeHttpClient::new(|_, _| Ok(json_response(200, json!({"data": {"children": []}}))));
	let session = static_session(&client);
	let page = session
		.fetch_listing_page::<Link>(
			&ListingRequest::new("/user/someone/submitted"),
			Some(&Cursor::new("t3_opaque")),
			42,
		)
		.await
		.expect("Empty page should decode.");

	assert!(page.items.is_empty());

	let requests = client.requests();

	assert_eq!(requests[0].query("after").as_deref(), Some("t3_opaque"));
	assert_eq!(requests[0].query("count").as_deref(), Some("42"));
}
