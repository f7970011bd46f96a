//! Header-driven request budget shared by every request a session issues.
//!
//! The API reports the remaining budget and the seconds until it resets on every response.
//! [`RateLimiter::before_send`] spends one unit of the locally tracked budget (suspending the
//! caller when it is exhausted) and [`RateLimiter::after_receive`] overwrites the local view
//! with the server's numbers, including on error responses.

// crates.io
use async_lock::MutexGuardArc;
use oauth2::http::HeaderMap;
// self
use crate::{
	_prelude::*,
	config::RateLimitDefaults,
	deadline::{self, Deadline},
	error::WaitStage,
	obs,
};

/// Header carrying the remaining request budget (a decimal number).
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
/// Header carrying the seconds until the budget resets.
pub const HEADER_RESET: &str = "x-ratelimit-reset";
/// Header carrying the requests already spent in the current window.
pub const HEADER_USED: &str = "x-ratelimit-used";

/// Pause applied after a 429 that carried neither rate-limit headers nor `Retry-After`.
pub const DEFAULT_THROTTLE: Duration = Duration::seconds(5);
/// Longest reset delay the limiter accepts from the server.
///
/// Reddit windows last ten minutes; a larger `x-ratelimit-reset` is treated as malformed and a
/// larger `Retry-After` is clamped to this value.
pub const MAX_RESET: Duration = Duration::hours(1);

/// Server-reported budget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitState {
	/// Requests left in the current window.
	pub remaining: u64,
	/// Instant the window resets.
	pub reset_at: OffsetDateTime,
	/// Requests already spent in the window, when reported.
	pub used: Option<u64>,
}
impl RateLimitState {
	/// Parses the rate-limit headers of a response received at `now`.
	///
	/// Returns `None` when either the remaining count or the reset delay is missing or
	/// malformed, or when the reset lies more than [`MAX_RESET`] away. Fractional counts are
	/// floored and negative values clamp to zero.
	pub fn from_headers(headers: &HeaderMap, now: OffsetDateTime) -> Option<Self> {
		let remaining = header_number(headers, HEADER_REMAINING)?;
		let reset = header_number(headers, HEADER_RESET)?.max(0.);

		if reset > MAX_RESET.as_seconds_f64() {
			return None;
		}

		let reset_at = now.checked_add(Duration::checked_seconds_f64(reset)?)?;
		let used = header_number(headers, HEADER_USED).map(|used| used.floor().max(0.) as u64);

		Some(Self { remaining: remaining.floor().max(0.) as u64, reset_at, used })
	}
}

/// Budget as the limiter currently sees it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Budget {
	/// The last response carried usable rate-limit headers.
	Tracked(RateLimitState),
	/// No usable headers were seen; requests are never delayed.
	Unconstrained,
}

/// Proof that a request may be sent.
///
/// Keep the permit alive until [`RateLimiter::after_receive`] has run. When the budget was
/// exhausted and its window has already reset, the permit holds the limiter's gate so the
/// probe request is the only one in flight until its headers are applied.
#[must_use]
pub struct RateLimitPermit {
	probe: Option<MutexGuardArc<()>>,
}
impl RateLimitPermit {
	/// Returns `true` when this permit authorizes the single post-reset probe request.
	pub fn is_probe(&self) -> bool {
		self.probe.is_some()
	}
}
impl Debug for RateLimitPermit {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimitPermit").field("probe", &self.is_probe()).finish()
	}
}

enum Reservation {
	Granted,
	Probe,
	Wait(Duration),
}

/// Per-session rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
	budget: Mutex<Budget>,
	gate: Arc<AsyncMutex<()>>,
}
impl RateLimiter {
	/// Starts from an optimistic budget: `initial_remaining` requests for one window.
	pub fn new(defaults: &RateLimitDefaults) -> Self {
		Self::with_state(RateLimitState {
			remaining: defaults.initial_remaining,
			reset_at: OffsetDateTime::now_utc() + defaults.window,
			used: None,
		})
	}

	/// Starts from a known budget.
	pub fn with_state(state: RateLimitState) -> Self {
		Self::with_budget(Budget::Tracked(state))
	}

	/// Starts without any constraint until the first response reports one.
	pub fn unconstrained() -> Self {
		Self::with_budget(Budget::Unconstrained)
	}

	fn with_budget(budget: Budget) -> Self {
		Self { budget: Mutex::new(budget), gate: Arc::new(AsyncMutex::new(())) }
	}

	/// Returns a copy of the current budget.
	pub fn snapshot(&self) -> Budget {
		self.budget.lock().clone()
	}

	/// Suspends the caller until the budget allows one more request.
	///
	/// Waiting for the window to reset fails fast with [`Error::DeadlineExceeded`] when the
	/// reset lies beyond `deadline`; queueing behind another caller's wait is bounded by it.
	pub async fn before_send(&self, deadline: Option<Deadline>) -> Result<RateLimitPermit> {
		let guard = Deadline::run(deadline, WaitStage::RateLimit, self.gate.lock_arc()).await?;

		loop {
			let reservation = self.reserve(OffsetDateTime::now_utc());

			match reservation {
				Reservation::Granted => return Ok(RateLimitPermit { probe: None }),
				Reservation::Probe => return Ok(RateLimitPermit { probe: Some(guard) }),
				Reservation::Wait(wait) => {
					if deadline.is_some_and(|deadline| deadline.remaining() < wait) {
						obs::diagnostic(format_args!(
							"rate-limit reset in {wait} lies beyond the request deadline"
						));

						return Err(Error::DeadlineExceeded { stage: WaitStage::RateLimit });
					}

					obs::diagnostic(format_args!("rate-limit budget exhausted; waiting {wait}"));
					obs::record_ratelimit_wait(wait);
					tokio::time::sleep(deadline::to_std(wait)).await;
				},
			}
		}
	}

	/// Replaces the local budget with the one reported by a response.
	///
	/// Runs for every completed exchange, whatever its status. Missing or malformed headers
	/// switch the limiter to [`Budget::Unconstrained`].
	pub fn after_receive(&self, headers: &HeaderMap) {
		let budget = match RateLimitState::from_headers(headers, OffsetDateTime::now_utc()) {
			Some(state) => {
				obs::record_ratelimit_remaining(state.remaining);

				Budget::Tracked(state)
			},
			None => {
				obs::diagnostic("no usable rate-limit headers; budget unconstrained");

				Budget::Unconstrained
			},
		};

		*self.budget.lock() = budget;
	}

	/// Forces the budget to zero after the server answered 429.
	///
	/// The window resets after `retry_after` (clamped to [`MAX_RESET`]) when supplied, at the
	/// tracked reset when it is still ahead, and after [`DEFAULT_THROTTLE`] otherwise.
	pub fn throttle(&self, retry_after: Option<Duration>) {
		let now = OffsetDateTime::now_utc();
		let pause = retry_after.unwrap_or(DEFAULT_THROTTLE).clamp(Duration::ZERO, MAX_RESET);
		let mut budget = self.budget.lock();
		let (reset_at, used) = match (&*budget, retry_after) {
			(Budget::Tracked(state), None) if state.reset_at > now =>
				(Some(state.reset_at), state.used),
			(Budget::Tracked(state), _) => (now.checked_add(pause), state.used),
			(Budget::Unconstrained, _) => (now.checked_add(pause), None),
		};
		let Some(reset_at) = reset_at else {
			obs::diagnostic("429 reset cannot be represented; budget unconstrained");

			*budget = Budget::Unconstrained;

			return;
		};

		obs::record_ratelimit_remaining(0);

		*budget = Budget::Tracked(RateLimitState { remaining: 0, reset_at, used });
	}

	fn reserve(&self, now: OffsetDateTime) -> Reservation {
		let mut budget = self.budget.lock();

		match &mut *budget {
			Budget::Unconstrained => Reservation::Granted,
			Budget::Tracked(state) if state.remaining > 0 => {
				state.remaining -= 1;

				Reservation::Granted
			},
			Budget::Tracked(state) if now < state.reset_at =>
				Reservation::Wait(state.reset_at - now),
			Budget::Tracked(_) => Reservation::Probe,
		}
	}
}

fn header_number(headers: &HeaderMap, name: &str) -> Option<f64> {
	headers
		.get(name)?
		.to_str()
		.ok()?
		.trim()
		.parse::<f64>()
		.ok()
		.filter(|value| value.is_finite())
}
