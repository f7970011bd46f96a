// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for network grant calls issued by a token manager.
///
/// Callers that find a usable cached token never touch these counters, so `attempts` equals
/// the number of grant requests that reached the token endpoint (or failed trying).
#[derive(Debug, Default)]
pub struct GrantMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
}
impl GrantMetrics {
	/// Returns the total number of grant attempts.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of grants that produced a token.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed grants.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}
}
