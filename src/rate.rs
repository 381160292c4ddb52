//! Sliding-window call accounting for observability and admission decisions.
//!
//! The tracker is purely observational: it never blocks or rejects a call,
//! and its figures are exact only within a single process.

// self
use crate::_prelude::*;

/// Length of the rolling daily accounting window.
pub const DAILY_WINDOW: Duration = Duration::seconds(86_400);
/// Width of the instantaneous call-rate window.
pub const SECOND_WINDOW: Duration = Duration::seconds(1);
/// Maximum retained entries in the recent-call log.
pub const CALL_LOG_CAP: usize = 1000;

/// One proxied call as retained by the bounded log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CallLogEntry {
	/// Instant the call was admitted.
	#[serde(with = "time::serde::timestamp")]
	pub at: OffsetDateTime,
	/// Upstream endpoint path.
	pub endpoint: String,
	/// HTTP method of the call.
	pub method: String,
}

/// Point-in-time view of the tracker's accounting.
#[derive(Clone, Debug, Serialize)]
pub struct RateSnapshot {
	/// Calls admitted since the daily window last rolled over.
	pub daily_calls: u64,
	/// Instant the daily counter resets next.
	#[serde(with = "time::serde::timestamp")]
	pub daily_reset_at: OffsetDateTime,
	/// Calls observed in the trailing second.
	pub calls_last_second: usize,
	/// Most recent calls, oldest first, capped at [`CALL_LOG_CAP`].
	pub recent_calls: Vec<CallLogEntry>,
}

#[derive(Debug)]
struct RateWindowState {
	daily_calls: u64,
	daily_reset_at: OffsetDateTime,
	second_window: VecDeque<OffsetDateTime>,
	call_log: VecDeque<CallLogEntry>,
}

/// Tracks the daily call count and the trailing one-second call rate.
#[derive(Debug)]
pub struct RateLimitTracker {
	inner: Mutex<RateWindowState>,
}
impl RateLimitTracker {
	/// Creates a tracker whose daily window starts now.
	pub fn new() -> Self {
		Self::new_at(OffsetDateTime::now_utc())
	}

	/// Instant-pinned variant of [`new`](Self::new).
	pub fn new_at(now: OffsetDateTime) -> Self {
		Self {
			inner: Mutex::new(RateWindowState {
				daily_calls: 0,
				daily_reset_at: now + DAILY_WINDOW,
				second_window: VecDeque::new(),
				call_log: VecDeque::new(),
			}),
		}
	}

	/// Accounts one admitted call.
	pub fn record_call(&self, endpoint: &str, method: &str) {
		self.record_call_at(OffsetDateTime::now_utc(), endpoint, method);
	}

	/// Instant-pinned variant of [`record_call`](Self::record_call).
	pub fn record_call_at(&self, now: OffsetDateTime, endpoint: &str, method: &str) {
		let mut state = self.inner.lock();

		if now > state.daily_reset_at {
			state.daily_calls = 0;
			state.call_log.clear();
			state.daily_reset_at = now + DAILY_WINDOW;
		}

		state.daily_calls += 1;
		state.call_log.push_back(CallLogEntry {
			at: now,
			endpoint: endpoint.to_owned(),
			method: method.to_owned(),
		});

		while state.call_log.len() > CALL_LOG_CAP {
			state.call_log.pop_front();
		}

		Self::prune_second_window(&mut state, now);
		state.second_window.push_back(now);
	}

	/// Returns the current accounting view.
	pub fn snapshot(&self) -> RateSnapshot {
		self.snapshot_at(OffsetDateTime::now_utc())
	}

	/// Instant-pinned variant of [`snapshot`](Self::snapshot).
	pub fn snapshot_at(&self, now: OffsetDateTime) -> RateSnapshot {
		let mut state = self.inner.lock();

		Self::prune_second_window(&mut state, now);

		RateSnapshot {
			daily_calls: state.daily_calls,
			daily_reset_at: state.daily_reset_at,
			calls_last_second: state.second_window.len(),
			recent_calls: state.call_log.iter().cloned().collect(),
		}
	}

	fn prune_second_window(state: &mut RateWindowState, now: OffsetDateTime) {
		let cutoff = now - SECOND_WINDOW;

		while state.second_window.front().is_some_and(|ts| *ts <= cutoff) {
			state.second_window.pop_front();
		}
	}
}
impl Default for RateLimitTracker {
	fn default() -> Self {
		Self::new()
	}
}
