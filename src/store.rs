//! Storage contract and built-in backends for the gateway's cached token record.

pub mod file;
pub mod memory;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;

// self
use crate::{_prelude::*, token::TokenRecord};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistence contract for the gateway's single cached token record.
///
/// Exactly one record exists per deployment; sibling worker processes share the
/// same backing medium and the last writer wins. Implementations backed by
/// shared media must treat unreadable or malformed data as absent rather than
/// fatal; the lifecycle manager falls back to a fresh exchange.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Loads the cached record, if a readable one exists.
	fn load(&self) -> StoreFuture<'_, Option<TokenRecord>>;

	/// Persists or replaces the cached record.
	fn save<'a>(&'a self, record: &'a TokenRecord) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`TokenStore`] and session-replica backends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failure surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage medium.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
