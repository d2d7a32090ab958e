#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use github_pacer::{
	cache::{MemoryCache, SharedCache},
	client::ApiClient,
	config::ClientConfig,
	http::SharedHttpClient,
	url::Url,
};
use time::OffsetDateTime;

pub const TEST_TOKEN: &str = "test-token";

pub fn build_client(base_url: &str) -> (ApiClient, Arc<MemoryCache>) {
	build_client_with(base_url, |config| config)
}

pub fn build_client_with(
	base_url: &str,
	configure: impl FnOnce(ClientConfig) -> ClientConfig,
) -> (ApiClient, Arc<MemoryCache>) {
	let base_url = Url::parse(base_url).expect("Mock server base URL should parse successfully.");
	let config = configure(
		ClientConfig::default().with_base_url(base_url).with_user_agent("github-pacer-tests"),
	);
	let backend = Arc::new(MemoryCache::default());
	let cache: Arc<dyn SharedCache> = backend.clone();

	(ApiClient::with_parts(TEST_TOKEN, config, SharedHttpClient::default(), cache), backend)
}

pub async fn cached(cache: &MemoryCache, key: &str) -> Option<String> {
	cache.get(key).await.expect("Cache get should succeed.")
}

pub fn unix_now() -> i64 {
	OffsetDateTime::now_utc().unix_timestamp()
}
