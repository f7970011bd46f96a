//! Optional observability helpers for session operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `reddit_session.op` with the `op` and
//!   `stage` (call site) fields, plus `debug!` diagnostics for rate-limit waits, missing
//!   rate-limit headers, and repeated listing cursors.
//! - Enable `metrics` to increment the `reddit_session_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`, and to publish the rate-limit gauges.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Session operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Password grant issued for a script credential.
	PasswordGrant,
	/// Refresh-token grant issued for a web credential.
	RefreshGrant,
	/// Authorization-code exchange.
	AuthorizationCode,
	/// Single resource request.
	Fetch,
	/// Listing traversal.
	Paginate,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::PasswordGrant => "password_grant",
			OpKind::RefreshGrant => "refresh_grant",
			OpKind::AuthorizationCode => "authorization_code",
			OpKind::Fetch => "fetch",
			OpKind::Paginate => "paginate",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a session operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}

	/// Maps a result onto its terminal outcome.
	pub fn of<T, E>(result: &Result<T, E>) -> Self {
		if result.is_ok() { OpOutcome::Success } else { OpOutcome::Failure }
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Emits a `debug`-level diagnostic when tracing is enabled.
pub(crate) fn diagnostic(message: impl Display) {
	#[cfg(feature = "tracing")]
	{
		::tracing::debug!(target: "reddit_session", "{message}");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = message;
	}
}
