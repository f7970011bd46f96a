// self
use crate::_prelude::*;

/// Request pipeline toggles matching how the Reddit API behaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiQuirks {
	/// Append `raw_json=1` so bodies carry unescaped `<`, `>`, and `&`.
	pub raw_json: bool,
	/// Append `.json` to anonymous resource paths; the public host serves HTML otherwise.
	pub public_json_suffix: bool,
	/// Retry a request once after a 429 once the budget has been resynchronized.
	pub retry_on_429: bool,
}
impl Default for ApiQuirks {
	fn default() -> Self {
		Self { raw_json: true, public_json_suffix: true, retry_on_429: true }
	}
}
