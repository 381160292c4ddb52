//! Retry schedule for 429 responses from the rate-limited upstream.

// crates.io
use reqwest::header::{HeaderMap, RETRY_AFTER};
use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;

/// Bounded exponential backoff tuned to a calendar-based upstream quota.
///
/// The defaults wait a minute before the first retry, grow by half again per
/// attempt, and never exceed five minutes: 60 s, 90 s, 135 s for the stock
/// three-retry budget.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
	/// Additional attempts permitted after the first 429.
	pub max_retries: u32,
	/// Delay before the first retry.
	pub initial_backoff: Duration,
	/// Multiplier applied to the delay after every retry.
	pub backoff_multiplier: f64,
	/// Ceiling no single wait may exceed.
	pub max_backoff: Duration,
}
impl RetryPolicy {
	/// Overrides the retry budget.
	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Overrides the delay before the first retry.
	pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
		self.initial_backoff = backoff;

		self
	}

	/// Overrides the per-wait ceiling.
	pub fn with_max_backoff(mut self, backoff: Duration) -> Self {
		self.max_backoff = backoff;

		self
	}

	/// Delay before retry number `retry` (zero-based), capped at the ceiling.
	pub fn backoff_for(&self, retry: u32) -> Duration {
		let scaled =
			self.initial_backoff.as_seconds_f64() * self.backoff_multiplier.powi(retry as i32);
		let delay = Duration::seconds_f64(scaled);

		if delay > self.max_backoff { self.max_backoff } else { delay }
	}

	/// Full deterministic wait schedule for a call that exhausts its budget.
	pub fn schedule(&self) -> Vec<Duration> {
		(0..self.max_retries).map(|retry| self.backoff_for(retry)).collect()
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_retries: 3,
			initial_backoff: Duration::seconds(60),
			backoff_multiplier: 1.5,
			max_backoff: Duration::seconds(300),
		}
	}
}

/// Reads a `Retry-After` hint, accepting delta-seconds or an HTTP date.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

/// Converts a crate duration into the std form transports expect, clamping
/// negatives to zero.
pub(crate) fn to_std_duration(duration: Duration) -> std::time::Duration {
	duration.try_into().unwrap_or(std::time::Duration::ZERO)
}
