//! Environment-backed configuration for the gateway boundary.

// std
use std::{
	env,
	ffi::OsString,
	path::{Path, PathBuf},
};
// self
use crate::{_prelude::*, error::ConfigError, token::BearerSecret};

/// Environment variable selecting the directory for the shared cache documents.
pub const CACHE_DIR_ENV: &str = "CLOUDGATE_CACHE_DIR";
/// Environment variable carrying the OAuth2 token endpoint URL.
pub const TOKEN_URL_ENV: &str = "CLOUDGATE_TOKEN_URL";
/// Environment variable carrying the protected API's base URL.
pub const API_BASE_ENV: &str = "CLOUDGATE_API_BASE";
/// Environment variable carrying the OAuth2 client identifier.
pub const CLIENT_ID_ENV: &str = "CLOUDGATE_CLIENT_ID";
/// Environment variable carrying the OAuth2 client secret.
pub const CLIENT_SECRET_ENV: &str = "CLOUDGATE_CLIENT_SECRET";
/// Environment variable carrying the optional customer scoping identifier.
pub const CUSTOMER_ID_ENV: &str = "CLOUDGATE_CUSTOMER_ID";

/// File name of the token cache document inside the cache directory.
pub const TOKEN_CACHE_FILE: &str = "token_cache.json";
/// File name of the shared session document inside the cache directory.
pub const SESSION_STORE_FILE: &str = "sessions.json";

/// Connection settings for the token endpoint and the protected API.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
	/// OAuth2 token endpoint receiving the client-credentials exchange.
	pub token_url: Url,
	/// Base URL of the protected management API.
	pub api_base: Url,
	/// OAuth2 client identifier.
	pub client_id: String,
	/// OAuth2 client secret.
	pub client_secret: BearerSecret,
	/// Customer scoping identifier forwarded to the API, when provisioned.
	pub customer_id: Option<String>,
	/// Directory holding the token cache and session documents.
	pub cache_dir: PathBuf,
	/// Network bound applied to every proxied API call.
	pub request_timeout: Duration,
}
impl GatewayConfig {
	/// Default network bound applied to proxied API calls.
	pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::seconds(30);

	/// Creates a configuration with explicit endpoints and credentials.
	///
	/// The cache directory resolves from [`CACHE_DIR_ENV`], falling back to the
	/// working directory.
	pub fn new(
		token_url: Url,
		api_base: Url,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Self {
		Self {
			token_url,
			api_base,
			client_id: client_id.into(),
			client_secret: BearerSecret::new(client_secret),
			customer_id: None,
			cache_dir: resolve_cache_dir(env::var_os(CACHE_DIR_ENV)),
			request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
		}
	}

	/// Reads the full configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		let mut config = Self::new(
			url_env(TOKEN_URL_ENV)?,
			url_env(API_BASE_ENV)?,
			required_env(CLIENT_ID_ENV)?,
			required_env(CLIENT_SECRET_ENV)?,
		);

		config.customer_id = env::var(CUSTOMER_ID_ENV).ok().filter(|v| !v.is_empty());

		Ok(config)
	}

	/// Sets the customer scoping identifier.
	pub fn with_customer_id(mut self, customer_id: impl Into<String>) -> Self {
		self.customer_id = Some(customer_id.into());

		self
	}

	/// Overrides the cache directory.
	pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.cache_dir = dir.into();

		self
	}

	/// Overrides the proxied-call network bound.
	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Path of the token cache document.
	pub fn token_cache_path(&self) -> PathBuf {
		self.cache_dir.join(TOKEN_CACHE_FILE)
	}

	/// Path of the shared session document.
	pub fn session_store_path(&self) -> PathBuf {
		self.cache_dir.join(SESSION_STORE_FILE)
	}
}

fn required_env(name: &'static str) -> Result<String, ConfigError> {
	env::var(name).ok().filter(|v| !v.is_empty()).ok_or(ConfigError::MissingEnv { name })
}

fn url_env(name: &'static str) -> Result<Url, ConfigError> {
	Url::parse(&required_env(name)?).map_err(|e| ConfigError::InvalidUrl { name, source: e })
}

fn resolve_cache_dir(overridden: Option<OsString>) -> PathBuf {
	overridden.filter(|v| !v.is_empty()).map(PathBuf::from).unwrap_or_else(|| Path::new(".").into())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn build_config() -> GatewayConfig {
		GatewayConfig::new(
			Url::parse("https://sso.example.com/oauth2/token")
				.expect("Token URL fixture should parse."),
			Url::parse("https://api.example.com/").expect("API base fixture should parse."),
			"client-1",
			"secret-1",
		)
	}

	#[test]
	fn cache_dir_override_wins_over_working_directory() {
		assert_eq!(resolve_cache_dir(None), PathBuf::from("."));
		assert_eq!(resolve_cache_dir(Some("".into())), PathBuf::from("."));
		assert_eq!(resolve_cache_dir(Some("/var/cache/gw".into())), PathBuf::from("/var/cache/gw"));
	}

	#[test]
	fn cache_paths_join_the_selected_directory() {
		let config = build_config().with_cache_dir("/tmp/gw");

		assert_eq!(config.token_cache_path(), PathBuf::from("/tmp/gw/token_cache.json"));
		assert_eq!(config.session_store_path(), PathBuf::from("/tmp/gw/sessions.json"));
	}

	#[test]
	fn secret_never_leaks_through_debug() {
		let config = build_config();

		assert!(!format!("{config:?}").contains("secret-1"));
	}
}
