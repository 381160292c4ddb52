//! Single-document JSON token cache shared between worker processes.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{StoreError, StoreFuture, TokenStore},
	token::TokenRecord,
};

/// Persists the cached token record to one JSON document.
///
/// The document carries no lock: sibling worker processes read and rewrite it
/// freely and the last rename wins. A missing, torn, or malformed document
/// loads as "no cached token" so a broken cache can only ever cost an extra
/// exchange, never a failed request.
#[derive(Clone, Debug)]
pub struct FileTokenStore {
	path: PathBuf,
}
impl FileTokenStore {
	/// Creates a store reading and writing the document at `path`.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// Path of the underlying document.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_record(path: &Path) -> Option<TokenRecord> {
		let bytes = fs::read(path).ok()?;

		serde_json::from_slice(&bytes).ok()
	}

	fn persist_record(&self, record: &TokenRecord) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(record).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize token record: {e}"),
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
				message: format!("Failed to create cache directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}
}
impl TokenStore for FileTokenStore {
	fn load(&self) -> StoreFuture<'_, Option<TokenRecord>> {
		Box::pin(async move { Ok(Self::load_record(&self.path)) })
	}

	fn save<'a>(&'a self, record: &'a TokenRecord) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.persist_record(record) })
	}
}
