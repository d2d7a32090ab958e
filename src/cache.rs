//! Shared key-value coordinator contracts and built-in backends.
//!
//! Every process that talks to the upstream API reads and writes one rate-limit record
//! through a [`SharedCache`]. The only multi-key mutation is
//! [`SharedCache::run_conditional_multi_set`], which backends must execute as a single
//! indivisible step so concurrent writers never interleave.

pub mod memory;
#[cfg(feature = "redis")] pub mod redis;

pub use memory::MemoryCache;
#[cfg(feature = "redis")] pub use self::redis::RedisCache;

// self
use crate::_prelude::*;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Boxed future returned by [`SharedCache`] operations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + 'a + Send>>;

/// Minimal async key-value interface over a cache shared by many processes.
pub trait SharedCache
where
	Self: Send + Sync,
{
	/// Returns the value stored under `key`, or `None` when unset or expired.
	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>>;

	/// Stores `value` under `key`, expiring after `ttl` seconds when provided.
	fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl: Option<u64>) -> CacheFuture<'a, ()>;

	/// Atomically writes the rate-limit record unless the stored timestamp is newer.
	///
	/// Resolves to `true` when the write was applied and `false` when a fresher record was
	/// already present, in which case nothing changes.
	fn run_conditional_multi_set<'a>(
		&'a self,
		write: &'a ConditionalWrite,
	) -> CacheFuture<'a, bool>;

	/// Releases the underlying connection. Calling it again, or before any use, is a no-op.
	fn close(&self) -> CacheFuture<'_, ()>;
}

/// Error type produced by [`SharedCache`] implementations.
#[derive(Debug, ThisError)]
pub enum CacheError {
	/// The cache could not be reached.
	#[error("Shared cache is unavailable.")]
	Connection {
		/// Backend-specific connection failure.
		#[source]
		source: BoxError,
	},
	/// The cache answered but the command failed.
	#[error("Shared cache command failed: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
impl CacheError {
	/// Wraps a connectivity failure.
	pub fn connection(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Connection { source: Box::new(src) }
	}
}

/// Cache keys that together hold one rate-limit record.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordKeys {
	/// Logical write time of the record; the ordering guard.
	pub timestamp: String,
	/// Unix timestamp at which the upstream quota refills.
	pub reset: String,
	/// Requests left in the current window.
	pub remaining: String,
	/// Maximum requests per window.
	pub limit: String,
}
impl RecordKeys {
	/// Derives the four record keys from a shared prefix.
	pub fn new(prefix: &str) -> Self {
		Self {
			timestamp: format!("{prefix}:timestamp"),
			reset: format!("{prefix}:reset"),
			remaining: format!("{prefix}:remaining"),
			limit: format!("{prefix}:limit"),
		}
	}
}

/// Timestamp-fenced write of the full rate-limit record.
///
/// Empty `remaining` or `limit` values are not written, mirroring responses that omit those
/// headers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConditionalWrite {
	/// Target keys.
	pub keys: RecordKeys,
	/// Candidate logical time in unix milliseconds; applied only if `>=` the stored one.
	pub timestamp_ms: i64,
	/// Expiry shared by every written key, in seconds.
	pub ttl_secs: u64,
	/// Value for the `reset` key.
	pub reset: String,
	/// Value for the `remaining` key, or empty to skip.
	pub remaining: String,
	/// Value for the `limit` key, or empty to skip.
	pub limit: String,
}
impl ConditionalWrite {
	/// Key/value pairs that will be written when the fence passes.
	pub fn entries(&self) -> impl Iterator<Item = (&str, String)> {
		[
			(self.keys.timestamp.as_str(), self.timestamp_ms.to_string()),
			(self.keys.reset.as_str(), self.reset.clone()),
			(self.keys.remaining.as_str(), self.remaining.clone()),
			(self.keys.limit.as_str(), self.limit.clone()),
		]
		.into_iter()
		.filter(|(_, value)| !value.is_empty())
	}
}
