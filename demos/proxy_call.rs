//! Minimal end-to-end run: configure from the environment, mint a session, and
//! proxy one read against the protected API.
//!
//! ```sh
//! CLOUDGATE_TOKEN_URL=https://sso.example.com/oauth2/token \
//! CLOUDGATE_API_BASE=https://api.example.com \
//! CLOUDGATE_CLIENT_ID=... CLOUDGATE_CLIENT_SECRET=... \
//! cargo run --example proxy_call
//! ```

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
// self
use cloudgate::{
	client::ResilientApiClient,
	config::GatewayConfig,
	gate::Gateway,
	lifecycle::TokenLifecycleManager,
	rate::RateLimitTracker,
	session::SessionCoordinator,
	store::FileTokenStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = GatewayConfig::from_env()?;
	let store = Arc::new(FileTokenStore::new(config.token_cache_path()));
	let tokens = Arc::new(TokenLifecycleManager::open(&config, store).await?);
	let client = ResilientApiClient::new(&config, tokens)?;
	let gateway = Gateway::new(
		client,
		SessionCoordinator::open(config.session_store_path()),
		RateLimitTracker::new(),
	);
	let session = gateway.sessions.create(serde_json::Map::new());
	let devices = gateway.get(Some(session.as_ref()), "/monitoring/v1/devices", &[]).await?;

	println!("{devices:#}");

	let snapshot = gateway.rate.snapshot();

	println!("daily calls: {}, last second: {}", snapshot.daily_calls, snapshot.calls_last_second);

	Ok(())
}
