//! Authenticated request pipeline for the Reddit API: OAuth 2.0 token lifecycle,
//! header-driven rate limiting, and cursor-walking listings behind one session type.
//!
//! ```no_run
//! # async fn run() -> reddit_session::error::Result<()> {
//! use reddit_session::{
//! 	auth::ScriptCredential,
//! 	config::ApiDescriptor,
//! 	listing::ListingRequest,
//! 	session::ReqwestSession,
//! };
//!
//! let descriptor = ApiDescriptor::reddit("linux:my-bot:v0.1.0 (by /u/me)")
//! 	.expect("Production descriptor is valid.");
//! let session = ReqwestSession::authenticated(
//! 	descriptor,
//! 	ScriptCredential::new("client-id", "client-secret", "me", "hunter2"),
//! )?;
//! let posts: Vec<serde_json::Value> =
//! 	session.paginate(&ListingRequest::new("/r/rust/new"), 250).await?;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod deadline;
pub mod error;
pub mod http;
pub mod listing;
pub mod oauth;
pub mod obs;
pub mod rate_limit;
pub mod session;

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
