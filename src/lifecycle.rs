//! Token lifecycle management: the refresh decision, the OAuth2
//! client-credentials exchange, and write-through persistence.
//!
//! [`TokenLifecycleManager::get_access_token`] runs before *every* proxied
//! call. A cached record is served only while
//! `now < expires_at -` [`EXPIRY_BUFFER`](crate::token::EXPIRY_BUFFER);
//! anything else (forced, absent, inside the buffer) funnels into one
//! singleflight-guarded exchange so concurrent callers piggy-back on the same
//! in-flight refresh instead of stampeding the token endpoint.

// self
use crate::{
	_prelude::*,
	client::retry::to_std_duration,
	config::GatewayConfig,
	error::ConfigError,
	obs::{self, CallKind, CallOutcome, CallSpan},
	store::TokenStore,
	token::{BearerSecret, TokenRecord},
};

/// Network bound applied to every token exchange.
pub const TOKEN_EXCHANGE_TIMEOUT: Duration = Duration::seconds(30);
/// Fallback lifetime applied when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN: Duration = Duration::seconds(7200);

/// Wire shape of a successful client-credentials response.
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
	access_token: String,
	#[serde(default)]
	expires_in: Option<i64>,
}

/// Owns the refresh decision and the OAuth2 client-credentials exchange,
/// writing every minted record through the shared store.
pub struct TokenLifecycleManager {
	http: ReqwestClient,
	token_url: Url,
	client_id: String,
	client_secret: BearerSecret,
	store: Arc<dyn TokenStore>,
	current: RwLock<Option<TokenRecord>>,
	refresh_guard: AsyncMutex<()>,
}
impl TokenLifecycleManager {
	/// Opens the manager, eagerly loading the shared cache and discarding any
	/// record that is not usable right now.
	pub async fn open(config: &GatewayConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
		let http = ReqwestClient::builder()
			.timeout(to_std_duration(TOKEN_EXCHANGE_TIMEOUT))
			.build()
			.map_err(ConfigError::http_client_build)?;
		let now = OffsetDateTime::now_utc();
		let cached = store.load().await?.filter(|record| record.is_usable_at(now));

		Ok(Self {
			http,
			token_url: config.token_url.clone(),
			client_id: config.client_id.clone(),
			client_secret: config.client_secret.clone(),
			store,
			current: RwLock::new(cached),
			refresh_guard: AsyncMutex::new(()),
		})
	}

	/// Returns a bearer credential guaranteed to outlive the expiry buffer.
	///
	/// Refreshes when forced, when no record is held, or when the held record
	/// has entered the buffer window; otherwise serves the cached credential.
	/// Exchange failures surface as [`Error::Auth`]; a stale token is never
	/// silently returned.
	pub async fn get_access_token(&self, force_refresh: bool) -> Result<String> {
		if let Some(token) = self.cached_token(force_refresh) {
			return Ok(token);
		}

		let _singleflight = self.refresh_guard.lock().await;

		// A sibling caller may have refreshed while this one waited on the guard.
		if let Some(token) = self.cached_token(force_refresh) {
			return Ok(token);
		}

		let record = self.exchange().await?;
		let token = record.access_token.expose().to_owned();

		self.store.save(&record).await?;
		*self.current.write() = Some(record);

		Ok(token)
	}

	/// True when a call at `instant` must mint a fresh credential.
	pub fn refresh_required_at(
		record: Option<&TokenRecord>,
		instant: OffsetDateTime,
		force: bool,
	) -> bool {
		force || record.is_none_or(|r| !r.is_usable_at(instant))
	}

	fn cached_token(&self, force: bool) -> Option<String> {
		let guard = self.current.read();
		let record = guard.as_ref();

		if Self::refresh_required_at(record, OffsetDateTime::now_utc(), force) {
			return None;
		}

		record.map(|r| r.access_token.expose().to_owned())
	}

	async fn exchange(&self) -> Result<TokenRecord> {
		const KIND: CallKind = CallKind::TokenExchange;

		let span = CallSpan::new(KIND, "exchange");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let form = [
					("grant_type", "client_credentials"),
					("client_id", self.client_id.as_str()),
					("client_secret", self.client_secret.expose()),
				];
				let response = self
					.http
					.post(self.token_url.clone())
					.form(&form)
					.send()
					.await
					.map_err(|e| Error::Auth {
						reason: format!("token endpoint unreachable: {e}"),
					})?;
				let status = response.status();

				if !status.is_success() {
					let body = response.text().await.unwrap_or_default();

					return Err(Error::Auth {
						reason: format!("token endpoint returned {}: {body}", status.as_u16()),
					});
				}

				let bytes = response.bytes().await.map_err(|e| Error::Auth {
					reason: format!("token endpoint response could not be read: {e}"),
				})?;
				let mut deserializer = serde_json::Deserializer::from_slice(&bytes);
				let parsed: TokenEndpointResponse =
					serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
						Error::Auth { reason: format!("token endpoint returned malformed JSON: {e}") }
					})?;
				let now = OffsetDateTime::now_utc();
				let lifetime = parsed.expires_in.map(Duration::seconds).unwrap_or(DEFAULT_EXPIRES_IN);

				TokenRecord::new(parsed.access_token, now, now + lifetime).map_err(|e| Error::Auth {
					reason: format!("token endpoint returned an unusable expiry: {e}"),
				})
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		result
	}
}
impl Debug for TokenLifecycleManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenLifecycleManager")
			.field("token_url", &self.token_url.as_str())
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.finish()
	}
}
