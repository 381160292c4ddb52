//! Resilient OAuth2 client-credentials gateway core—cached token lifecycles, rate-aware
//! retries, and cross-process session tracking for proxying protected management APIs.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]
#![cfg_attr(test, allow(unused_crate_dependencies))]

pub mod client;
pub mod config;
pub mod error;
pub mod gate;
pub mod lifecycle;
pub mod obs;
pub mod rate;
pub mod session;
pub mod store;
pub mod token;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::{env, path::PathBuf, process};
	// self
	use crate::{
		client::{ResilientApiClient, RetryPolicy},
		config::GatewayConfig,
		lifecycle::TokenLifecycleManager,
		store::{MemoryTokenStore, TokenStore},
	};

	/// Returns a process-unique path under the OS temp directory for store tests.
	pub fn temp_store_path(prefix: &str) -> PathBuf {
		let unique = format!(
			"cloudgate_{prefix}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	/// Builds a configuration pointed at mock endpoints with a temp cache directory.
	pub fn test_config(api_base: &str, token_url: &str) -> GatewayConfig {
		GatewayConfig::new(
			Url::parse(token_url).expect("Mock token endpoint should parse successfully."),
			Url::parse(api_base).expect("Mock API base should parse successfully."),
			"client-under-test",
			"secret-under-test",
		)
		.with_cache_dir(env::temp_dir())
	}

	/// Retry policy with millisecond waits so mock-server tests never stall.
	pub fn quick_retry_policy() -> RetryPolicy {
		RetryPolicy::default()
			.with_initial_backoff(Duration::milliseconds(5))
			.with_max_backoff(Duration::milliseconds(20))
	}

	/// Opens a lifecycle manager over the provided store against a mock token endpoint.
	pub async fn build_test_lifecycle(
		token_url: &str,
		store: Arc<MemoryTokenStore>,
	) -> Arc<TokenLifecycleManager> {
		let config = test_config("http://127.0.0.1:1/", token_url);
		let backend: Arc<dyn TokenStore> = store;
		let manager = TokenLifecycleManager::open(&config, backend)
			.await
			.expect("Test lifecycle manager should open successfully.");

		Arc::new(manager)
	}

	/// Builds a resilient client against mock API + token endpoints over the
	/// provided store, so tests can seed the cached record before the manager
	/// loads it and inspect it afterwards.
	pub async fn build_test_client(
		api_base: &str,
		token_url: &str,
		store: Arc<MemoryTokenStore>,
	) -> ResilientApiClient {
		let config = test_config(api_base, token_url);
		let backend: Arc<dyn TokenStore> = store;
		let tokens = TokenLifecycleManager::open(&config, backend)
			.await
			.expect("Test lifecycle manager should open successfully.");

		ResilientApiClient::new(&config, Arc::new(tokens))
			.expect("Test client should build successfully.")
			.with_retry_policy(quick_retry_policy())
	}
}

mod _prelude {
	pub use std::{
		collections::{HashMap, VecDeque},
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError, Method, StatusCode};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::{Map as JsonMap, Value};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
