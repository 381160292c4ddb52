//! Shared on-disk session document read and merged by every worker process.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	session::{SessionId, SessionRecord},
	store::StoreError,
};

/// Read-merge-write replica of the cross-process session document.
///
/// The document is a JSON map of `session_id -> {expires, payload}`. There is
/// no file lock: concurrent writers race and the last rename wins. The
/// deployment accepts that trade (a lost update shortens one session
/// extension, nothing worse) in exchange for cross-worker visibility.
#[derive(Clone, Debug)]
pub struct SessionReplica {
	path: PathBuf,
}
impl SessionReplica {
	/// Creates a replica over the document at `path`.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// Path of the underlying document.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Loads the shared document, treating missing or unreadable contents as empty.
	pub fn load(&self) -> HashMap<SessionId, SessionRecord> {
		let Ok(bytes) = fs::read(&self.path) else { return HashMap::new() };

		serde_json::from_slice(&bytes).unwrap_or_default()
	}

	/// Rewrites the document with `ours` layered over what is currently on
	/// disk, dropping entries already expired at `now`.
	pub fn persist_merged(
		&self,
		ours: &HashMap<SessionId, SessionRecord>,
		now: OffsetDateTime,
	) -> Result<(), StoreError> {
		let mut merged = self.load();

		for (id, record) in ours {
			merged.insert(id.clone(), record.clone());
		}

		merged.retain(|_, record| !record.is_expired_at(now));

		self.write_document(&merged)
	}

	fn write_document(
		&self,
		contents: &HashMap<SessionId, SessionRecord>,
	) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize session document: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create session directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::_preludet::temp_store_path;

	fn record(expires: OffsetDateTime) -> SessionRecord {
		SessionRecord { expires, payload: JsonMap::new() }
	}

	#[test]
	fn unreadable_documents_load_as_empty() {
		let replica = SessionReplica::new(temp_store_path("sessions_missing"));

		assert!(replica.load().is_empty());

		let path = temp_store_path("sessions_corrupt");

		fs::write(&path, b"not json at all").expect("Failed to plant corrupt session document.");

		assert!(SessionReplica::new(&path).load().is_empty());

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary session document {}: {e}", path.display())
		});
	}

	#[test]
	fn merge_prefers_local_entries_and_drops_expired() {
		let path = temp_store_path("sessions_merge");
		let replica = SessionReplica::new(&path);
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let shared_id = SessionId::generate();
		let foreign_id = SessionId::generate();
		let dead_id = SessionId::generate();
		let on_disk = HashMap::from_iter([
			(shared_id.clone(), record(now + Duration::minutes(5))),
			(foreign_id.clone(), record(now + Duration::minutes(30))),
			(dead_id.clone(), record(now - Duration::minutes(1))),
		]);

		replica.write_document(&on_disk).expect("Seeding the document should succeed.");

		let ours = HashMap::from_iter([(shared_id.clone(), record(now + Duration::hours(1)))]);

		replica.persist_merged(&ours, now).expect("Merge persist should succeed.");

		let merged = replica.load();

		assert_eq!(merged.len(), 2);
		assert_eq!(merged[&shared_id].expires, now + Duration::hours(1));
		assert_eq!(merged[&foreign_id].expires, now + Duration::minutes(30));
		assert!(!merged.contains_key(&dead_id));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary session document {}: {e}", path.display())
		});
	}
}
