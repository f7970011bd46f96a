//! Cursor-linked listings and the paginator that walks them.
//!
//! Every list endpoint answers with the same envelope:
//!
//! ```json
//! { "data": { "children": [{ "data": { ... } }], "after": "t3_abc", "before": null } }
//! ```
//!
//! [`Session::paginate`] follows `after` until it is `null` or the caller's item limit is
//! reached. Pages are never truncated: a page that crosses the limit is delivered whole.

// std
use std::collections::HashSet;
// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	http::{ApiHttpClient, TransportErrorMapper},
	obs::{self, OpKind, OpOutcome, OpSpan},
	session::{FetchOptions, Session},
};

/// Page size requested when the caller does not choose one; also the API's maximum.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Opaque listing position (a fullname such as `t3_abc123`).
///
/// Cursors are only ever echoed back as `after`/`before` query values; they are never parsed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);
impl Cursor {
	/// Wraps a raw cursor value.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Raw cursor value.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Display for Cursor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// One decoded listing page.
#[derive(Clone, Debug, PartialEq)]
pub struct ListingPage<T> {
	/// Items in server order.
	pub items: Vec<T>,
	/// Cursor of the next page; `None` ends the traversal.
	pub after: Option<Cursor>,
	/// Cursor of the previous page.
	pub before: Option<Cursor>,
}
impl<'de, T> Deserialize<'de> for ListingPage<T>
where
	T: Deserialize<'de>,
{
	fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let envelope = ListingEnvelope::<T>::deserialize(deserializer)?;
		let ListingData { children, after, before } = envelope.data;

		Ok(Self {
			items: children.into_iter().map(|child| child.data).collect(),
			after: after.filter(|cursor| !cursor.0.is_empty()),
			before: before.filter(|cursor| !cursor.0.is_empty()),
		})
	}
}

#[derive(Deserialize)]
struct ListingEnvelope<T> {
	data: ListingData<T>,
}

#[derive(Deserialize)]
struct ListingData<T> {
	children: Vec<ListingChild<T>>,
	#[serde(default)]
	after: Option<Cursor>,
	#[serde(default)]
	before: Option<Cursor>,
}

#[derive(Deserialize)]
struct ListingChild<T> {
	data: T,
}

/// Listing endpoint plus the parameters sent with every page.
#[derive(Clone, Debug)]
pub struct ListingRequest {
	/// Endpoint path, e.g. `/r/rust/new`.
	pub path: String,
	/// Extra query parameters (sort, time window, ...).
	pub params: Vec<(String, String)>,
	/// Items requested per page, sent as `limit`.
	pub page_size: u32,
}
impl ListingRequest {
	/// Creates a request for `path` with the default page size.
	pub fn new(path: impl Into<String>) -> Self {
		Self { path: path.into(), params: Vec::new(), page_size: DEFAULT_PAGE_SIZE }
	}

	/// Appends a query parameter.
	pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.params.push((key.into(), value.into()));

		self
	}

	/// Overrides the page size.
	pub fn page_size(mut self, page_size: u32) -> Self {
		self.page_size = page_size;

		self
	}

	fn page_options(&self, after: Option<&Cursor>, count: usize) -> FetchOptions {
		let mut options = FetchOptions::get().query("limit", self.page_size.to_string());

		for (key, value) in &self.params {
			options = options.query(key.as_str(), value.as_str());
		}
		if let Some(after) = after {
			options = options.query("after", after.as_str()).query("count", count.to_string());
		}

		options
	}
}

impl<C, M> Session<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Fetches and decodes a single listing page.
	///
	/// `count` is the number of items the caller has already seen in this traversal.
	pub async fn fetch_listing_page<T>(
		&self,
		request: &ListingRequest,
		after: Option<&Cursor>,
		count: usize,
	) -> Result<ListingPage<T>>
	where
		T: DeserializeOwned,
	{
		self.fetch_as(&request.path, request.page_options(after, count)).await
	}

	/// Walks the listing and returns every item of every fetched page, in server order.
	pub async fn paginate<T>(&self, request: &ListingRequest, item_limit: usize) -> Result<Vec<T>>
	where
		T: DeserializeOwned,
	{
		self.paginate_with(request, item_limit, |_: &[T]| {}).await
	}

	/// Like [`Session::paginate`], calling `on_page` with each page's items as it arrives.
	///
	/// Traversal stops when a page has no `after` cursor, when `item_limit` items have been
	/// collected, or when the API hands back a cursor that was already requested. A failed page
	/// aborts the traversal with its error; pages already passed to `on_page` stay delivered.
	/// An `item_limit` of zero returns without issuing a request.
	pub async fn paginate_with<T, F>(
		&self,
		request: &ListingRequest,
		item_limit: usize,
		mut on_page: F,
	) -> Result<Vec<T>>
	where
		T: DeserializeOwned,
		F: FnMut(&[T]),
	{
		const KIND: OpKind = OpKind::Paginate;

		let span = OpSpan::new(KIND, "paginate");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async {
				let mut items = Vec::new();
				let mut cursor = None::<Cursor>;
				let mut requested = HashSet::new();

				while items.len() < item_limit {
					let page = self
						.fetch_listing_page::<T>(request, cursor.as_ref(), items.len())
						.await?;

					on_page(&page.items);
					items.extend(page.items);

					let Some(after) = page.after else {
						break;
					};

					if !requested.insert(after.clone()) {
						obs::diagnostic(format_args!(
							"listing {} repeated cursor {after}; stopping",
							request.path
						));

						break;
					}

					cursor = Some(after);
				}

				Ok(items)
			})
			.await;

		obs::record_op_outcome(KIND, OpOutcome::of(&result));

		result
	}
}
