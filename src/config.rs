//! Client and coordinator configuration.

// std
use std::{env, time::Duration as StdDuration};
// self
use crate::{_prelude::*, cache::RecordKeys, error::ConfigError};

/// Connection settings for the shared rate-limit coordinator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
	/// Cache host name.
	pub host: String,
	/// Cache TCP port.
	pub port: u16,
	/// Upper bound for establishing the first connection.
	pub connect_timeout: StdDuration,
}
impl CacheConfig {
	/// Default cache host.
	pub const DEFAULT_HOST: &'static str = "localhost";
	/// Default cache port.
	pub const DEFAULT_PORT: u16 = 6379;
	/// Default connect timeout.
	pub const DEFAULT_CONNECT_TIMEOUT: StdDuration = StdDuration::from_secs(5);

	/// Reads `REDIS_HOST` and `REDIS_PORT`, falling back to the defaults for unset variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| env::var(name).ok())
	}

	/// Same as [`CacheConfig::from_env`] but resolves variables through `lookup`.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		let mut config = Self::default();

		if let Some(host) = lookup("REDIS_HOST").filter(|value| !value.trim().is_empty()) {
			config.host = host.trim().to_owned();
		}
		if let Some(port) = lookup("REDIS_PORT").filter(|value| !value.trim().is_empty()) {
			config.port = port
				.trim()
				.parse()
				.map_err(|_| ConfigError::InvalidPort { value: port.clone() })?;
		}

		Ok(config)
	}

	/// Overrides the host.
	pub fn with_host(mut self, host: impl Into<String>) -> Self {
		self.host = host.into();

		self
	}

	/// Overrides the port.
	pub fn with_port(mut self, port: u16) -> Self {
		self.port = port;

		self
	}

	/// Overrides the connect timeout.
	pub fn with_connect_timeout(mut self, timeout: StdDuration) -> Self {
		self.connect_timeout = timeout;

		self
	}

	/// Connection URL understood by the Redis client.
	pub fn url(&self) -> String {
		format!("redis://{}:{}", self.host, self.port)
	}
}
impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			host: Self::DEFAULT_HOST.into(),
			port: Self::DEFAULT_PORT,
			connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
		}
	}
}

/// Behavior knobs for [`ApiClient`](crate::client::ApiClient).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
	/// Root every endpoint is resolved against.
	pub base_url: Url,
	/// Value sent in the `User-Agent` header.
	pub user_agent: String,
	/// Pre-flight throttling kicks in once the shared `remaining` count drops below this.
	pub throttle_threshold: u64,
	/// Lower bound for the rate-limit record's time-to-live.
	pub ttl_floor: Duration,
	/// Page size used by [`ApiClient::user_events`](crate::client::ApiClient::user_events).
	pub page_size: u32,
	/// Cache keys of the shared rate-limit record.
	pub record_keys: RecordKeys,
}
impl ClientConfig {
	/// GitHub REST API root.
	pub const DEFAULT_BASE_URL: &'static str = "https://api.github.com";
	/// Default `User-Agent`.
	pub const DEFAULT_USER_AGENT: &'static str =
		concat!("github-pacer/", env!("CARGO_PKG_VERSION"));
	/// Default low-water mark for pre-flight throttling.
	pub const DEFAULT_THROTTLE_THRESHOLD: u64 = 10;
	/// Default minimum record TTL.
	pub const DEFAULT_TTL_FLOOR: Duration = Duration::seconds(60);
	/// Default pagination page size.
	pub const DEFAULT_PAGE_SIZE: u32 = 100;
	/// Default rate-limit record prefix.
	pub const DEFAULT_RECORD_PREFIX: &'static str = "github:ratelimit";

	/// Overrides the base URL. A trailing slash is added so relative endpoints nest under it.
	pub fn with_base_url(mut self, mut base_url: Url) -> Self {
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());

			base_url.set_path(&path);
		}

		self.base_url = base_url;

		self
	}

	/// Overrides the `User-Agent`.
	pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = user_agent.into();

		self
	}

	/// Overrides the pre-flight throttle threshold.
	pub fn with_throttle_threshold(mut self, threshold: u64) -> Self {
		self.throttle_threshold = threshold;

		self
	}

	/// Overrides the minimum record TTL (negative values clamp to zero).
	pub fn with_ttl_floor(mut self, floor: Duration) -> Self {
		self.ttl_floor = if floor.is_negative() { Duration::ZERO } else { floor };

		self
	}

	/// Stores the rate-limit record under `prefix` instead of the default.
	///
	/// Every process sharing one budget must use the same prefix.
	pub fn with_record_prefix(mut self, prefix: &str) -> Self {
		self.record_keys = RecordKeys::new(prefix);

		self
	}

	/// Overrides the default page size (zero is bumped to one).
	pub fn with_page_size(mut self, page_size: u32) -> Self {
		self.page_size = page_size.max(1);

		self
	}
}
impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			base_url: Url::parse(Self::DEFAULT_BASE_URL)
				.expect("Default base URL is a valid absolute URL."),
			user_agent: Self::DEFAULT_USER_AGENT.into(),
			throttle_threshold: Self::DEFAULT_THROTTLE_THRESHOLD,
			ttl_floor: Self::DEFAULT_TTL_FLOOR,
			page_size: Self::DEFAULT_PAGE_SIZE,
			record_keys: RecordKeys::new(Self::DEFAULT_RECORD_PREFIX),
		}
	}
}
