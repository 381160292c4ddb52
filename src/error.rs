//! Gateway-level error types shared across the token, client, session, and store layers.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
///
/// Upstream HTTP statuses map into this taxonomy through [`Error::from_status`];
/// classification never inspects response message text.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout) or an undecodable upstream body.
	#[error(transparent)]
	Network(#[from] NetworkError),

	/// Token exchange failed, or the upstream rejected a freshly minted credential.
	#[error("Authorization failed: {reason}.")]
	Auth {
		/// Upstream- or gateway-supplied reason string.
		reason: String,
	},
	/// The 429 retry budget was exhausted without a successful response.
	#[error("Rate limit retries exhausted after {attempts} attempts.")]
	RateLimit {
		/// Total attempts performed, including the initial one.
		attempts: u32,
	},
	/// Upstream rejected the request body or parameters.
	#[error("Upstream rejected the request: {message}.")]
	BadRequest {
		/// Upstream message, passed through verbatim.
		message: String,
	},
	/// The credential lacks access to the requested resource.
	#[error("Upstream denied access: {message}.")]
	Forbidden {
		/// Upstream message, passed through verbatim.
		message: String,
	},
	/// The requested resource does not exist upstream.
	#[error("Upstream resource not found: {message}.")]
	NotFound {
		/// Upstream message, passed through verbatim.
		message: String,
	},
	/// Upstream reported an internal failure.
	#[error("Upstream server error ({status}): {message}.")]
	Server {
		/// HTTP status code returned by the upstream.
		status: u16,
		/// Upstream message, passed through verbatim.
		message: String,
	},
	/// The caller's session is missing, unknown, or past its expiry.
	#[error("Invalid or expired session.")]
	SessionExpired,
}
impl Error {
	/// Classifies a non-success upstream status into the typed taxonomy.
	pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
		let message = message.into();

		match status.as_u16() {
			400 => Self::BadRequest { message },
			401 => Self::Auth { reason: message },
			403 => Self::Forbidden { message },
			404 => Self::NotFound { message },
			429 => Self::RateLimit { attempts: 1 },
			status => Self::Server { status, message },
		}
	}

	/// HTTP status a gateway response should carry for this error.
	///
	/// Mirrors the upstream status wherever one exists; local failures fall back
	/// to 500 and transport failures to 502.
	pub fn status_code(&self) -> u16 {
		match self {
			Self::Storage(_) | Self::Config(_) => 500,
			Self::Network(_) => 502,
			Self::Auth { .. } | Self::SessionExpired => 401,
			Self::RateLimit { .. } => 429,
			Self::BadRequest { .. } => 400,
			Self::Forbidden { .. } => 403,
			Self::NotFound { .. } => 404,
			Self::Server { status, .. } => *status,
		}
	}
}

/// Configuration and validation failures raised by the gateway.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Required environment variable is not set.
	#[error("Environment variable `{name}` is not set.")]
	MissingEnv {
		/// Name of the missing variable.
		name: &'static str,
	},
	/// Environment variable holds an unparsable URL.
	#[error("Environment variable `{name}` does not hold a valid URL.")]
	InvalidUrl {
		/// Name of the offending variable.
		name: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoint path cannot be combined with the configured base URL.
	#[error("Endpoint `{endpoint}` cannot be joined onto the API base URL.")]
	InvalidEndpoint {
		/// Offending endpoint path.
		endpoint: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Transport-level failures for proxied API calls.
#[derive(Debug, ThisError)]
pub enum NetworkError {
	/// Underlying HTTP client reported a connection or timeout failure.
	#[error("Network error occurred while calling the upstream API.")]
	Transport {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// A success response carried a body that could not be decoded as JSON.
	#[error("Upstream returned an undecodable JSON body.")]
	Decode {
		/// Structured parsing failure with the offending path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl NetworkError {
	/// Wraps a transport-specific network error.
	pub fn transport(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Transport { source: Box::new(src) }
	}
}
impl From<ReqwestError> for NetworkError {
	fn from(e: ReqwestError) -> Self {
		Self::transport(e)
	}
}
