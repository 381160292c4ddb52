//! Request-admission layer wrapped uniformly around every proxied handler:
//! session check, call tracking, and error shaping.
//!
//! The layers compose in a fixed order (authorize, account, dispatch) and
//! every failure leaves through [`error_response`], so a caller always
//! receives a JSON object with an `error` field and a status mirroring the
//! upstream, never a raw panic or backtrace.

// self
use crate::{
	_prelude::*,
	client::ResilientApiClient,
	rate::RateLimitTracker,
	session::{SessionCoordinator, SessionId, SessionRecord},
};

/// Header identifying the caller's session on every proxied request.
pub const SESSION_HEADER: &str = "X-Session-ID";

/// Composes the session, rate, and client layers behind one admission surface.
///
/// The stores are explicit injected values rather than module-level state, so
/// tests can run several independent gateways inside one process.
#[derive(Debug)]
pub struct Gateway {
	/// Upstream client used for every proxied call.
	pub client: ResilientApiClient,
	/// Session authority consulted before any call is admitted.
	pub sessions: SessionCoordinator,
	/// Observational call accounting, updated after admission and never
	/// consulted to block a request.
	pub rate: RateLimitTracker,
}
impl Gateway {
	/// Assembles a gateway from its three layers.
	pub fn new(
		client: ResilientApiClient,
		sessions: SessionCoordinator,
		rate: RateLimitTracker,
	) -> Self {
		Self { client, sessions, rate }
	}

	/// Admits a request from its `X-Session-ID` header value, extending the
	/// session's expiry on success.
	pub fn authorize(&self, header: Option<&str>) -> Result<SessionRecord> {
		let raw = header.ok_or(Error::SessionExpired)?;
		let id = SessionId::new(raw).map_err(|_| Error::SessionExpired)?;

		self.sessions.validate(&id)
	}

	/// Proxies a read.
	///
	/// A 404 from a partially provisioned upstream resource degrades to an
	/// empty result so read paths stay usable; every other failure propagates.
	pub async fn get(
		&self,
		header: Option<&str>,
		endpoint: &str,
		query: &[(&str, &str)],
	) -> Result<Value> {
		self.authorize(header)?;
		self.rate.record_call(endpoint, Method::GET.as_str());

		match self.client.get(endpoint, query).await {
			Err(Error::NotFound { .. }) => Ok(Value::Object(JsonMap::new())),
			other => other,
		}
	}

	/// Proxies a create.
	pub async fn post(
		&self,
		header: Option<&str>,
		endpoint: &str,
		body: Option<&Value>,
	) -> Result<Value> {
		self.authorize(header)?;
		self.rate.record_call(endpoint, Method::POST.as_str());
		self.client.post(endpoint, body).await
	}

	/// Proxies a full replacement.
	pub async fn put(
		&self,
		header: Option<&str>,
		endpoint: &str,
		body: Option<&Value>,
	) -> Result<Value> {
		self.authorize(header)?;
		self.rate.record_call(endpoint, Method::PUT.as_str());
		self.client.put(endpoint, body).await
	}

	/// Proxies a partial update.
	pub async fn patch(
		&self,
		header: Option<&str>,
		endpoint: &str,
		body: Option<&Value>,
	) -> Result<Value> {
		self.authorize(header)?;
		self.rate.record_call(endpoint, Method::PATCH.as_str());
		self.client.patch(endpoint, body).await
	}

	/// Proxies a deletion.
	pub async fn delete(&self, header: Option<&str>, endpoint: &str) -> Result<Value> {
		self.authorize(header)?;
		self.rate.record_call(endpoint, Method::DELETE.as_str());
		self.client.delete(endpoint).await
	}
}

/// Shapes an error into the uniform JSON body contract: an HTTP status plus an
/// object carrying at least `error`.
pub fn error_response(error: &Error) -> (u16, Value) {
	let message = match error {
		Error::SessionExpired => "Invalid or expired session".to_owned(),
		other => other.to_string(),
	};

	(error.status_code(), serde_json::json!({ "error": message }))
}
