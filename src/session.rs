//! Per-caller session records kept visible across independent worker processes.
//!
//! Each process holds an in-memory map of the sessions it has created or seen
//! and shares a best-effort on-disk document with its siblings. The disk copy
//! is a mergeable replica, not a linearizable store: a session extended by one
//! process becomes visible to another only at that process's next read of the
//! document.

pub mod replica;

pub use replica::SessionReplica;

// std
use std::path::PathBuf;
// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::_prelude::*;

/// Inactivity timeout applied on creation and re-applied by every validation.
pub const SESSION_TTL: Duration = Duration::hours(1);

const SESSION_ID_LEN: usize = 32;
const SESSION_ID_MAX_LEN: usize = 128;

/// Error returned when a raw session identifier fails validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum SessionIdError {
	/// The identifier was empty.
	#[error("Session identifier cannot be empty.")]
	Empty,
	/// The identifier contains whitespace characters.
	#[error("Session identifier contains whitespace.")]
	ContainsWhitespace,
	/// The identifier exceeded the allowed character count.
	#[error("Session identifier exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
}

/// Opaque identifier handed to a caller at login and echoed back on every
/// proxied request via the `X-Session-ID` header.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);
impl SessionId {
	/// Validates and wraps a raw identifier.
	pub fn new(value: impl AsRef<str>) -> Result<Self, SessionIdError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}

	/// Draws a fresh random identifier.
	pub fn generate() -> Self {
		Self(rand::rng().sample_iter(Alphanumeric).take(SESSION_ID_LEN).map(char::from).collect())
	}
}
impl AsRef<str> for SessionId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<SessionId> for String {
	fn from(value: SessionId) -> Self {
		value.0
	}
}
impl TryFrom<String> for SessionId {
	type Error = SessionIdError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view(&value)?;

		Ok(Self(value))
	}
}
impl FromStr for SessionId {
	type Err = SessionIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl Debug for SessionId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "SessionId({})", self.0)
	}
}
impl Display for SessionId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

fn validate_view(view: &str) -> Result<(), SessionIdError> {
	if view.is_empty() {
		return Err(SessionIdError::Empty);
	}
	if view.chars().any(char::is_whitespace) {
		return Err(SessionIdError::ContainsWhitespace);
	}
	if view.len() > SESSION_ID_MAX_LEN {
		return Err(SessionIdError::TooLong { max: SESSION_ID_MAX_LEN });
	}

	Ok(())
}

/// Mutable per-caller state: an expiry instant plus an opaque payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
	/// Instant the session lapses unless revalidated first.
	#[serde(with = "time::serde::timestamp")]
	pub expires: OffsetDateTime,
	/// Caller-supplied attributes carried for the session's lifetime.
	pub payload: JsonMap<String, Value>,
}
impl SessionRecord {
	/// Returns `true` once the record has lapsed at `instant`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires
	}
}

/// Maintains the in-memory session map and its cross-process disk replica.
///
/// An explicit injected value rather than process-global state, so tests can
/// run several independent coordinators inside one process.
#[derive(Debug)]
pub struct SessionCoordinator {
	sessions: RwLock<HashMap<SessionId, SessionRecord>>,
	replica: SessionReplica,
}
impl SessionCoordinator {
	/// Opens a coordinator over the shared document at `path`.
	pub fn open(path: impl Into<PathBuf>) -> Self {
		Self { sessions: RwLock::new(HashMap::new()), replica: SessionReplica::new(path) }
	}

	/// Creates a session expiring one [`SESSION_TTL`] from now.
	pub fn create(&self, payload: JsonMap<String, Value>) -> SessionId {
		self.create_at(payload, OffsetDateTime::now_utc())
	}

	/// Instant-pinned variant of [`create`](Self::create).
	pub fn create_at(&self, payload: JsonMap<String, Value>, now: OffsetDateTime) -> SessionId {
		let id = SessionId::generate();
		let record = SessionRecord { expires: now + SESSION_TTL, payload };
		let snapshot = {
			let mut guard = self.sessions.write();

			guard.insert(id.clone(), record);
			guard.clone()
		};

		// Replica writes are best-effort; the in-memory entry is authoritative here.
		let _ = self.replica.persist_merged(&snapshot, now);

		id
	}

	/// Validates a session and extends its expiry by the inactivity timeout,
	/// in memory and in the shared document.
	pub fn validate(&self, id: &SessionId) -> Result<SessionRecord> {
		self.validate_at(id, OffsetDateTime::now_utc())
	}

	/// Instant-pinned variant of [`validate`](Self::validate).
	pub fn validate_at(&self, id: &SessionId, now: OffsetDateTime) -> Result<SessionRecord> {
		if !self.sessions.read().contains_key(id) {
			self.import_missing();
		}

		let refreshed = {
			let mut guard = self.sessions.write();
			let Some(record) = guard.get_mut(id) else { return Err(Error::SessionExpired) };

			if record.is_expired_at(now) {
				guard.remove(id);

				return Err(Error::SessionExpired);
			}

			record.expires = now + SESSION_TTL;

			record.clone()
		};
		let snapshot = self.sessions.read().clone();
		let _ = self.replica.persist_merged(&snapshot, now);

		Ok(refreshed)
	}

	/// Extends a session's expiry without returning its payload.
	pub fn touch(&self, id: &SessionId) -> Result<()> {
		self.validate(id).map(|_| ())
	}

	/// Instant-pinned variant of [`touch`](Self::touch).
	pub fn touch_at(&self, id: &SessionId, now: OffsetDateTime) -> Result<()> {
		self.validate_at(id, now).map(|_| ())
	}

	/// Drops every expired session; returns how many were removed.
	pub fn expire_sweep(&self) -> usize {
		self.expire_sweep_at(OffsetDateTime::now_utc())
	}

	/// Instant-pinned variant of [`expire_sweep`](Self::expire_sweep).
	pub fn expire_sweep_at(&self, now: OffsetDateTime) -> usize {
		let (removed, snapshot) = {
			let mut guard = self.sessions.write();
			let before = guard.len();

			guard.retain(|_, record| !record.is_expired_at(now));

			(before - guard.len(), guard.clone())
		};

		if removed > 0 {
			let _ = self.replica.persist_merged(&snapshot, now);
		}

		removed
	}

	/// Number of sessions currently held in this process's memory.
	pub fn in_memory_len(&self) -> usize {
		self.sessions.read().len()
	}

	/// Pulls entries this process has not seen from the shared document,
	/// never overwriting ones it already holds.
	fn import_missing(&self) {
		let imported = self.replica.load();

		if imported.is_empty() {
			return;
		}

		let mut guard = self.sessions.write();

		for (id, record) in imported {
			guard.entry(id).or_insert(record);
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::fs;
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::_preludet::temp_store_path;

	fn cleanup(path: &std::path::Path) {
		fs::remove_file(path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary session document {}: {e}", path.display())
		});
	}

	#[test]
	fn identifiers_validate_and_generate() {
		assert_eq!(SessionId::new(""), Err(SessionIdError::Empty));
		assert_eq!(SessionId::new("with space"), Err(SessionIdError::ContainsWhitespace));
		assert_eq!(
			SessionId::new("a".repeat(SESSION_ID_MAX_LEN + 1)),
			Err(SessionIdError::TooLong { max: SESSION_ID_MAX_LEN }),
		);

		let generated = SessionId::generate();

		assert_eq!(generated.as_ref().len(), SESSION_ID_LEN);
		assert_ne!(generated, SessionId::generate());
	}

	#[test]
	fn validation_honors_the_inactivity_window() {
		let path = temp_store_path("sessions_expiry");
		let coordinator = SessionCoordinator::open(&path);
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let id = coordinator.create_at(JsonMap::new(), now);

		assert!(coordinator.validate_at(&id, now + Duration::seconds(3599)).is_ok());

		// The validation above pushed the expiry out; rebuild a fresh session to
		// probe the far edge of the original window.
		let id = coordinator.create_at(JsonMap::new(), now);
		let err = coordinator
			.validate_at(&id, now + Duration::seconds(3601))
			.expect_err("A lapsed session must fail validation.");

		assert!(matches!(err, Error::SessionExpired));
		// The record stays dead even after a disk re-import on the next miss.
		assert!(coordinator.validate_at(&id, now + Duration::seconds(3601)).is_err());

		cleanup(&path);
	}

	#[test]
	fn validation_extends_the_expiry() {
		let path = temp_store_path("sessions_touch");
		let coordinator = SessionCoordinator::open(&path);
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let id = coordinator.create_at(JsonMap::new(), now);
		let later = now + Duration::minutes(50);
		let refreshed = coordinator
			.validate_at(&id, later)
			.expect("An in-window session should validate successfully.");

		assert_eq!(refreshed.expires, later + SESSION_TTL);

		coordinator
			.touch_at(&id, later + Duration::minutes(5))
			.expect("Touch should extend the refreshed session.");

		cleanup(&path);
	}

	#[test]
	fn sweep_removes_only_lapsed_sessions() {
		let path = temp_store_path("sessions_sweep");
		let coordinator = SessionCoordinator::open(&path);
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let _stale_a = coordinator.create_at(JsonMap::new(), now - Duration::hours(2));
		let _stale_b = coordinator.create_at(JsonMap::new(), now - Duration::hours(3));
		let fresh = coordinator.create_at(JsonMap::new(), now);

		assert_eq!(coordinator.expire_sweep_at(now), 2);
		assert_eq!(coordinator.in_memory_len(), 1);
		assert!(coordinator.validate_at(&fresh, now).is_ok());
		assert_eq!(coordinator.expire_sweep_at(now), 0);

		cleanup(&path);
	}

	#[test]
	fn sessions_created_elsewhere_are_imported_on_miss() {
		let path = temp_store_path("sessions_shared");
		let worker_a = SessionCoordinator::open(&path);
		let worker_b = SessionCoordinator::open(&path);
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let mut payload = JsonMap::new();

		payload.insert("user".into(), Value::String("operator".into()));

		let id = worker_a.create_at(payload.clone(), now);
		let seen = worker_b
			.validate_at(&id, now + Duration::minutes(5))
			.expect("A sibling worker should validate via the shared document.");

		assert_eq!(seen.payload, payload);

		cleanup(&path);
	}

	#[test]
	fn import_never_overwrites_entries_already_held() {
		let path = temp_store_path("sessions_first_writer");
		let worker_a = SessionCoordinator::open(&path);
		let worker_b = SessionCoordinator::open(&path);
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let id = worker_a.create_at(JsonMap::new(), now);

		// B imports the entry, then extends it far beyond A's view.
		let extended = worker_b
			.validate_at(&id, now + Duration::minutes(30))
			.expect("Import on miss should make the session visible.");

		// A forced re-import on an unknown id must not roll back B's extension.
		let unknown = SessionId::generate();
		let _ = worker_b.validate_at(&unknown, now);

		let still_extended = worker_b
			.validate_at(&id, now + Duration::minutes(31))
			.expect("The extended session should remain valid in B.");

		assert!(still_extended.expires >= extended.expires);

		cleanup(&path);
	}
}
