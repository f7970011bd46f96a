//! Request deadlines honored at the token-acquisition and rate-limit suspension points.

// crates.io
use tokio::time::Instant;
// self
use crate::{_prelude::*, error::WaitStage};

/// Instant after which a request stops waiting and fails with [`Error::DeadlineExceeded`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);
impl Deadline {
	/// Upper bound applied to every wait.
	pub const FAR_FUTURE: std::time::Duration = std::time::Duration::from_secs(86_400 * 365 * 30);

	/// Deadline `wait` from now; negative waits expire immediately.
	///
	/// Waits too long for the monotonic clock saturate at [`Self::FAR_FUTURE`].
	pub fn after(wait: Duration) -> Self {
		let now = Instant::now();
		let wait = to_std(wait).min(Self::FAR_FUTURE);

		Self(now.checked_add(wait).unwrap_or(now))
	}

	/// Builds an optional deadline from an optional maximum wait.
	pub fn from_max_wait(max_wait: Option<Duration>) -> Option<Self> {
		max_wait.map(Self::after)
	}

	/// Time left before the deadline, saturating at zero.
	pub fn remaining(&self) -> Duration {
		let left = self.0.saturating_duration_since(Instant::now());

		Duration::try_from(left).unwrap_or(Duration::MAX)
	}

	/// Returns `true` once the deadline has passed.
	pub fn is_expired(&self) -> bool {
		Instant::now() >= self.0
	}

	/// Awaits `fut` unless the deadline passes first.
	pub async fn run<F, T>(deadline: Option<Self>, stage: WaitStage, fut: F) -> Result<T>
	where
		F: Future<Output = T>,
	{
		match deadline {
			Some(Self(at)) => tokio::time::timeout_at(at, fut)
				.await
				.map_err(|_| Error::DeadlineExceeded { stage }),
			None => Ok(fut.await),
		}
	}
}

pub(crate) fn to_std(duration: Duration) -> std::time::Duration {
	std::time::Duration::try_from(duration).unwrap_or(std::time::Duration::ZERO)
}
