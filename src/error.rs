//! Crate-level error types shared by the client, the coordinator, and the transport.

// self
use crate::{_prelude::*, cache::CacheError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Shared coordinator failure.
	#[error("{0}")]
	Cache(
		#[from]
		#[source]
		CacheError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS) while calling the upstream API.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Response body could not be decoded into the expected shape.
	#[error(transparent)]
	Decode(#[from] DecodeError),

	/// Upstream API answered with a non-2xx status.
	#[error("Upstream API returned HTTP {status}: {body}.")]
	HttpStatus {
		/// HTTP status code.
		status: u16,
		/// Raw response body, kept for diagnostics.
		body: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
}
impl Error {
	/// Returns `true` when either the cache or the upstream API could not be reached.
	pub fn is_connection_unavailable(&self) -> bool {
		matches!(
			self,
			Self::Cache(CacheError::Connection { .. })
				| Self::Transport(TransportError::Network { .. })
		)
	}

	/// HTTP status code carried by [`Error::HttpStatus`].
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::HttpStatus { status, .. } => Some(*status),
			_ => None,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Endpoint cannot be joined onto the base URL.
	#[error("Endpoint `{endpoint}` is not a valid path under the base URL.")]
	InvalidEndpoint {
		/// Endpoint supplied by the caller.
		endpoint: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Header value contains characters HTTP does not allow.
	#[error("Header `{name}` has an invalid value.")]
	InvalidHeader {
		/// Header name.
		name: &'static str,
	},
	/// Cache port is not a valid TCP port.
	#[error("Cache port `{value}` is not a valid port number.")]
	InvalidPort {
		/// Raw value read from the environment.
		value: String,
	},
	/// Cache URL could not be parsed by the backend.
	#[error("Cache URL is invalid.")]
	InvalidCacheUrl {
		/// Underlying backend failure.
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

/// Transport-level failures (network, IO) while talking to the upstream API.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the upstream API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Body stream broke after the status line was received.
	#[error("Failed to read the upstream response body.")]
	Body {
		/// Transport-specific read error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a body read failure.
	pub fn body(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Body { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Response decoding failures.
#[derive(Debug, ThisError)]
pub enum DecodeError {
	/// Body was not valid JSON for the requested type.
	#[error("Response from `{endpoint}` is malformed.")]
	Json {
		/// Endpoint or URL the body came from.
		endpoint: String,
		/// Structured parsing failure, including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Paginated endpoint returned something other than a JSON array.
	#[error("Paginated response from `{endpoint}` is not a list.")]
	UnexpectedShape {
		/// Endpoint or URL the body came from.
		endpoint: String,
	},
}
