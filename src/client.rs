//! Resilient HTTP client for the protected API: token attachment on every
//! call, bounded 429 backoff, and a single re-authentication on 401.
//!
//! The two retry budgets are independent and may both fire within a single
//! logical call: up to [`RetryPolicy::max_retries`] extra attempts for rate
//! limiting, and exactly one forced token refresh for an authorization
//! failure. The backoff wait is cooperative (the task yields to the runtime
//! instead of pinning its worker thread), but the schedule itself (60 s,
//! then x1.5 per retry, capped at 300 s) follows the upstream's
//! calendar-based quota.

pub mod retry;

pub use retry::RetryPolicy;

// self
use crate::{
	_prelude::*,
	client::retry::{parse_retry_after, to_std_duration},
	config::GatewayConfig,
	error::{ConfigError, NetworkError},
	lifecycle::TokenLifecycleManager,
	obs::{self, CallKind, CallOutcome, CallSpan},
};

/// HTTP client wrapper that keeps calls against the protected API alive
/// through rate-limit windows and credential expiry.
#[derive(Debug)]
pub struct ResilientApiClient {
	http: ReqwestClient,
	api_base: Url,
	tokens: Arc<TokenLifecycleManager>,
	retry: RetryPolicy,
}
impl ResilientApiClient {
	/// Builds a client from the shared configuration and lifecycle manager.
	pub fn new(config: &GatewayConfig, tokens: Arc<TokenLifecycleManager>) -> Result<Self> {
		let http = ReqwestClient::builder()
			.timeout(to_std_duration(config.request_timeout))
			.build()
			.map_err(ConfigError::http_client_build)?;

		Ok(Self {
			http,
			api_base: config.api_base.clone(),
			tokens,
			retry: RetryPolicy::default(),
		})
	}

	/// Replaces the retry policy; tests shrink the waits to milliseconds.
	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Issues a GET against `endpoint` with optional query parameters.
	pub async fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Value> {
		self.dispatch(Method::GET, endpoint, None, query).await
	}

	/// Issues a POST against `endpoint` with an optional JSON body.
	pub async fn post(&self, endpoint: &str, body: Option<&Value>) -> Result<Value> {
		self.dispatch(Method::POST, endpoint, body, &[]).await
	}

	/// Issues a PUT against `endpoint` with an optional JSON body.
	pub async fn put(&self, endpoint: &str, body: Option<&Value>) -> Result<Value> {
		self.dispatch(Method::PUT, endpoint, body, &[]).await
	}

	/// Issues a PATCH against `endpoint` with an optional JSON body.
	pub async fn patch(&self, endpoint: &str, body: Option<&Value>) -> Result<Value> {
		self.dispatch(Method::PATCH, endpoint, body, &[]).await
	}

	/// Issues a DELETE against `endpoint`.
	pub async fn delete(&self, endpoint: &str) -> Result<Value> {
		self.dispatch(Method::DELETE, endpoint, None, &[]).await
	}

	async fn dispatch(
		&self,
		method: Method,
		endpoint: &str,
		body: Option<&Value>,
		query: &[(&str, &str)],
	) -> Result<Value> {
		const KIND: CallKind = CallKind::Proxy;

		let span = CallSpan::new(KIND, "dispatch");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span.instrument(self.dispatch_inner(method, endpoint, body, query)).await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		result
	}

	async fn dispatch_inner(
		&self,
		method: Method,
		endpoint: &str,
		body: Option<&Value>,
		query: &[(&str, &str)],
	) -> Result<Value> {
		let url = self.endpoint_url(endpoint)?;
		let mut reauthenticated = false;
		let mut force_refresh = false;
		let mut rate_retries = 0_u32;

		loop {
			// Runs on every attempt, not only after a failure, so a credential that
			// just entered the buffer window is replaced before use.
			let token = self.tokens.get_access_token(force_refresh).await?;

			force_refresh = false;

			let mut request = self.http.request(method.clone(), url.clone()).bearer_auth(&token);

			if !query.is_empty() {
				request = request.query(query);
			}
			if let Some(body) = body {
				request = request.json(body);
			}

			let response = request.send().await.map_err(NetworkError::from)?;
			let status = response.status();

			if status == StatusCode::TOO_MANY_REQUESTS {
				if rate_retries < self.retry.max_retries {
					let mut delay = self.retry.backoff_for(rate_retries);

					// An upstream hint may lengthen the wait, never shorten it.
					if let Some(hint) = parse_retry_after(response.headers()) {
						if hint > delay {
							delay = hint.min(self.retry.max_backoff);
						}
					}

					obs::record_call_outcome(CallKind::Proxy, CallOutcome::Retry);
					tokio::time::sleep(to_std_duration(delay)).await;

					rate_retries += 1;

					continue;
				}

				return Err(Error::RateLimit { attempts: rate_retries + 1 });
			}
			if status == StatusCode::UNAUTHORIZED {
				if !reauthenticated {
					// One shot only; a second 401 means the credential itself is bad.
					reauthenticated = true;
					force_refresh = true;

					continue;
				}

				return Err(Error::Auth {
					reason: "upstream rejected a freshly refreshed credential".into(),
				});
			}
			if !status.is_success() {
				return Err(Error::from_status(status, error_message(response).await));
			}

			return decode_body(response).await;
		}
	}

	fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
		let full = format!(
			"{}/{}",
			self.api_base.as_str().trim_end_matches('/'),
			endpoint.trim_start_matches('/'),
		);

		Url::parse(&full).map_err(|e| {
			ConfigError::InvalidEndpoint { endpoint: endpoint.into(), source: e }.into()
		})
	}
}

/// Extracts the most useful error text from a non-success response.
///
/// Prefers the conventional `error`/`message` fields of a JSON body so the
/// upstream's own wording survives; falls back to the raw body.
async fn error_message(response: reqwest::Response) -> String {
	let text = response.text().await.unwrap_or_default();

	if let Ok(value) = serde_json::from_str::<Value>(&text) {
		if let Some(message) =
			value.get("error").or_else(|| value.get("message")).and_then(Value::as_str)
		{
			return message.to_owned();
		}
	}

	text
}

/// Decodes a success body, treating an empty payload as an empty JSON object.
///
/// The upstream responds with no content to some POST/DELETE operations.
async fn decode_body(response: reqwest::Response) -> Result<Value> {
	let bytes = response.bytes().await.map_err(NetworkError::from)?;

	if bytes.is_empty() {
		return Ok(Value::Object(JsonMap::new()));
	}

	let mut deserializer = serde_json::Deserializer::from_slice(&bytes);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|e| NetworkError::Decode { source: e }.into())
}
