//! Thread-safe in-memory [`SharedCache`] for single-process deployments and tests.

// self
use crate::{
	_prelude::*,
	cache::{CacheFuture, ConditionalWrite, SharedCache},
};

type EntryMap = Arc<RwLock<HashMap<String, Entry>>>;

#[derive(Clone, Debug)]
struct Entry {
	value: String,
	expires_at: Option<OffsetDateTime>,
}
impl Entry {
	fn new(value: String, ttl: Option<u64>, now: OffsetDateTime) -> Self {
		// A deadline past the representable range never expires.
		let expires_at = ttl
			.and_then(|secs| i64::try_from(secs).ok())
			.and_then(|secs| now.checked_add(Duration::seconds(secs)));

		Self { value, expires_at }
	}

	fn is_live_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_none_or(|deadline| deadline > now)
	}
}

/// Coordinator that keeps the rate-limit record in-process.
///
/// Only useful when a single process talks to the upstream API, since nothing is shared
/// across process boundaries. The conditional multi-set runs under one write guard, which
/// gives it the same all-or-nothing semantics as the Redis script.
#[derive(Clone, Debug, Default)]
pub struct MemoryCache(EntryMap);
impl MemoryCache {
	/// Returns the expiry instant of `key`, if it is set and has one.
	pub fn expires_at(&self, key: &str) -> Option<OffsetDateTime> {
		let now = OffsetDateTime::now_utc();

		self.0
			.read()
			.get(key)
			.filter(|entry| entry.is_live_at(now))
			.and_then(|entry| entry.expires_at)
	}

	fn get_now(map: &EntryMap, key: &str) -> Option<String> {
		let now = OffsetDateTime::now_utc();

		map.read().get(key).filter(|entry| entry.is_live_at(now)).map(|entry| entry.value.clone())
	}

	fn set_now(map: &EntryMap, key: &str, value: &str, ttl: Option<u64>) {
		let entry = Entry::new(value.to_owned(), ttl, OffsetDateTime::now_utc());

		map.write().insert(key.to_owned(), entry);
	}

	fn conditional_set_now(map: &EntryMap, write: &ConditionalWrite) -> bool {
		let now = OffsetDateTime::now_utc();
		let mut guard = map.write();
		let current = guard
			.get(&write.keys.timestamp)
			.filter(|entry| entry.is_live_at(now))
			.and_then(|entry| entry.value.parse::<i64>().ok());

		if current.is_some_and(|stored| write.timestamp_ms < stored) {
			return false;
		}

		// Same one-second minimum as the Redis script, which cannot `SET EX 0`.
		let ttl = write.ttl_secs.max(1);

		for (key, value) in write.entries() {
			guard.insert(key.to_owned(), Entry::new(value, Some(ttl), now));
		}

		true
	}
}
impl SharedCache for MemoryCache {
	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
		Box::pin(async move { Ok(Self::get_now(&self.0, key)) })
	}

	fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl: Option<u64>) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			Self::set_now(&self.0, key, value, ttl);

			Ok(())
		})
	}

	fn run_conditional_multi_set<'a>(
		&'a self,
		write: &'a ConditionalWrite,
	) -> CacheFuture<'a, bool> {
		Box::pin(async move { Ok(Self::conditional_set_now(&self.0, write)) })
	}

	fn close(&self) -> CacheFuture<'_, ()> {
		Box::pin(async { Ok(()) })
	}
}
