// self
use crate::{
	_prelude::*,
	obs::{OpKind, OpOutcome},
};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_op_outcome(kind: OpKind, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"reddit_session_op_total",
			"op" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Publishes the budget the limiter currently tracks.
pub fn record_ratelimit_remaining(remaining: u64) {
	#[cfg(feature = "metrics")]
	{
		metrics::gauge!("reddit_session_ratelimit_remaining").set(remaining as f64);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = remaining;
	}
}

/// Records how long a caller was suspended waiting for the budget to reset.
pub fn record_ratelimit_wait(wait: Duration) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!("reddit_session_ratelimit_wait_seconds").record(wait.as_seconds_f64());
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = wait;
	}
}
