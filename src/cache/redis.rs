//! Redis-backed [`SharedCache`] shared by every process that draws on one API budget.

// crates.io
use redis::{AsyncCommands, Client, RedisError, Script, aio::ConnectionManager};
// self
use crate::{
	_prelude::*,
	cache::{CacheError, CacheFuture, ConditionalWrite, SharedCache},
	config::CacheConfig,
	error::ConfigError,
	obs,
};

// KEYS: timestamp, reset, remaining, limit.
// ARGV: candidate timestamp, ttl, reset, remaining, limit.
const CONDITIONAL_MULTI_SET_LUA: &str = r#"
local stored = tonumber(redis.call("GET", KEYS[1]))
local candidate = tonumber(ARGV[1])

if stored and candidate < stored then
	return 0
end

local ttl = math.max(tonumber(ARGV[2]), 1)

redis.call("SET", KEYS[1], ARGV[1], "EX", ttl)
redis.call("SET", KEYS[2], ARGV[3], "EX", ttl)

if ARGV[4] ~= "" then
	redis.call("SET", KEYS[3], ARGV[4], "EX", ttl)
end
if ARGV[5] ~= "" then
	redis.call("SET", KEYS[4], ARGV[5], "EX", ttl)
end

return 1
"#;

/// Coordinator backed by a Redis server.
///
/// The connection is opened lazily on first use and memoized; concurrent first callers
/// wait on the same async mutex so exactly one [`ConnectionManager`] is created. The
/// manager reconnects on its own after transient drops. [`SharedCache::close`] drops it,
/// and the next call opens a fresh one.
#[derive(Clone)]
pub struct RedisCache {
	client: Client,
	config: CacheConfig,
	connection: Arc<AsyncMutex<Option<ConnectionManager>>>,
	conditional_multi_set: Arc<Script>,
}
impl RedisCache {
	/// Builds a coordinator for `config` without connecting.
	pub fn new(config: CacheConfig) -> Result<Self, ConfigError> {
		let client = Client::open(config.url())
			.map_err(|e| ConfigError::InvalidCacheUrl { source: Box::new(e) })?;

		Ok(Self {
			client,
			config,
			connection: Default::default(),
			conditional_multi_set: Arc::new(Script::new(CONDITIONAL_MULTI_SET_LUA)),
		})
	}

	/// Builds a coordinator from `REDIS_HOST`/`REDIS_PORT`.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::new(CacheConfig::from_env()?)
	}

	/// Returns `true` while a memoized connection exists.
	pub async fn is_open(&self) -> bool {
		self.connection.lock().await.is_some()
	}

	async fn connection(&self) -> Result<ConnectionManager, CacheError> {
		let mut slot = self.connection.lock().await;

		if let Some(connection) = slot.as_ref() {
			return Ok(connection.clone());
		}

		let connection = tokio::time::timeout(
			self.config.connect_timeout,
			self.client.get_connection_manager(),
		)
		.await
		.map_err(CacheError::connection)?
		.map_err(map_redis_error)?;

		obs::connection_opened("redis");

		*slot = Some(connection.clone());

		Ok(connection)
	}
}
impl Debug for RedisCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RedisCache").field("config", &self.config).finish()
	}
}
impl SharedCache for RedisCache {
	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
		Box::pin(async move {
			let mut connection = self.connection().await?;
			let value: Option<String> = connection.get(key).await.map_err(map_redis_error)?;

			Ok(value)
		})
	}

	fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl: Option<u64>) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			let mut connection = self.connection().await?;
			let outcome: Result<(), RedisError> = match ttl {
				Some(secs) => connection.set_ex(key, value, secs).await,
				None => connection.set(key, value).await,
			};

			outcome.map_err(map_redis_error)
		})
	}

	fn run_conditional_multi_set<'a>(
		&'a self,
		write: &'a ConditionalWrite,
	) -> CacheFuture<'a, bool> {
		Box::pin(async move {
			let mut connection = self.connection().await?;
			let applied: i64 = self
				.conditional_multi_set
				.key(&write.keys.timestamp)
				.key(&write.keys.reset)
				.key(&write.keys.remaining)
				.key(&write.keys.limit)
				.arg(write.timestamp_ms)
				.arg(write.ttl_secs)
				.arg(&write.reset)
				.arg(&write.remaining)
				.arg(&write.limit)
				.invoke_async(&mut connection)
				.await
				.map_err(map_redis_error)?;

			Ok(applied == 1)
		})
	}

	fn close(&self) -> CacheFuture<'_, ()> {
		Box::pin(async move {
			if self.connection.lock().await.take().is_some() {
				obs::connection_closed("redis");
			}

			Ok(())
		})
	}
}

fn map_redis_error(e: RedisError) -> CacheError {
	if e.is_io_error() || e.is_connection_refusal() || e.is_timeout() || e.is_connection_dropped()
	{
		CacheError::connection(e)
	} else {
		CacheError::Backend { message: e.to_string() }
	}
}
