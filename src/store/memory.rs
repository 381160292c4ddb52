//! In-process [`TokenStore`] used by tests and single-worker demos.

// self
use crate::{
	_prelude::*,
	store::{StoreFuture, TokenStore},
	token::TokenRecord,
};

/// Keeps the cached record in process memory; nothing is shared across workers.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenStore(Arc<RwLock<Option<TokenRecord>>>);
impl MemoryTokenStore {
	/// Returns a clone of the currently cached record, if any.
	pub fn snapshot(&self) -> Option<TokenRecord> {
		self.0.read().clone()
	}

	/// Seeds the store with a record, replacing whatever was held.
	pub fn seed(&self, record: TokenRecord) {
		*self.0.write() = Some(record);
	}
}
impl TokenStore for MemoryTokenStore {
	fn load(&self) -> StoreFuture<'_, Option<TokenRecord>> {
		let slot = self.0.clone();

		Box::pin(async move { Ok(slot.read().clone()) })
	}

	fn save<'a>(&'a self, record: &'a TokenRecord) -> StoreFuture<'a, ()> {
		let slot = self.0.clone();
		let record = record.clone();

		Box::pin(async move {
			*slot.write() = Some(record);

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use super::*;

	#[test]
	fn save_replaces_the_held_record() {
		let store = MemoryTokenStore::default();
		let now = OffsetDateTime::now_utc();
		let first = TokenRecord::new("first", now, now + Duration::hours(1))
			.expect("First fixture should build successfully.");
		let second = TokenRecord::new("second", now, now + Duration::hours(2))
			.expect("Second fixture should build successfully.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for memory store test.");

		rt.block_on(store.save(&first)).expect("First save should succeed.");
		rt.block_on(store.save(&second)).expect("Second save should succeed.");

		let held = rt
			.block_on(store.load())
			.expect("Load should not error.")
			.expect("Store should hold the replacement record.");

		assert_eq!(held.access_token.expose(), "second");
	}
}
