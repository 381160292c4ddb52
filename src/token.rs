//! Cached token records shared between worker processes, plus the redacting
//! bearer-secret wrapper.

// self
use crate::_prelude::*;

/// Safety margin subtracted from a token's nominal expiry so a credential is
/// renewed before it can lapse mid-flight of a subsequent request.
pub const EXPIRY_BUFFER: Duration = Duration::seconds(300);

/// Redacted bearer credential keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BearerSecret(String);
impl BearerSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner credential. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for BearerSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for BearerSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("BearerSecret").field(&"<redacted>").finish()
	}
}
impl Display for BearerSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Errors produced when assembling a [`TokenRecord`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenRecordError {
	/// The expiry instant does not lie after the caching instant.
	#[error("Token expiry must lie after the caching instant.")]
	NonPositiveLifetime,
}

/// Cached access token together with its validity window.
///
/// Serialized with unix-second timestamps so the on-disk cache document reads
/// `{access_token, expires_at, cached_at}` and stays legible to every sibling
/// worker process.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
	/// Bearer credential presented to the protected API.
	pub access_token: BearerSecret,
	/// Instant the credential stops being accepted upstream.
	#[serde(with = "time::serde::timestamp")]
	pub expires_at: OffsetDateTime,
	/// Instant this record was minted and written to the cache.
	#[serde(with = "time::serde::timestamp")]
	pub cached_at: OffsetDateTime,
}
impl TokenRecord {
	/// Builds a record, enforcing that the expiry lies after the caching instant.
	pub fn new(
		access_token: impl Into<String>,
		cached_at: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> Result<Self, TokenRecordError> {
		if expires_at <= cached_at {
			return Err(TokenRecordError::NonPositiveLifetime);
		}

		Ok(Self { access_token: BearerSecret::new(access_token), expires_at, cached_at })
	}

	/// Returns `true` while the credential may still be handed out at `instant`,
	/// i.e. `instant < expires_at -` [`EXPIRY_BUFFER`].
	pub fn is_usable_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.expires_at - EXPIRY_BUFFER
	}

	/// Convenience helper that checks usability against the current UTC instant.
	pub fn is_usable(&self) -> bool {
		self.is_usable_at(OffsetDateTime::now_utc())
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("access_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.field("cached_at", &self.cached_at)
			.finish()
	}
}
