//! Fetches every public event of a user from a mocked API that serves two pages, then prints
//! the rate-limit record the client left in the shared coordinator.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
use url::Url;
// self
use github_pacer::{
	cache::{MemoryCache, SharedCache},
	client::ApiClient,
	config::ClientConfig,
	http::SharedHttpClient,
	reqwest::Client,
};

fn event(id: &str, kind: &str) -> serde_json::Value {
	json!({
		"id": id,
		"type": kind,
		"actor": { "id": 1, "login": "octocat" },
		"repo": { "id": 1296269, "name": "octocat/Hello-World" },
		"payload": {},
		"public": true,
		"created_at": "2024-03-01T10:00:00Z"
	})
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let reset = time::OffsetDateTime::now_utc().unix_timestamp() + 3600;
	let first = server
		.mock_async(|when, then| {
			when.method(GET).path("/users/octocat/events").query_param("per_page", "2");
			then.status(200)
				.header("content-type", "application/json")
				.header("link", format!("<{}>; rel=\"next\"", server.url("/user/1/events?page=2")))
				.header("x-ratelimit-reset", reset.to_string())
				.header("x-ratelimit-remaining", "4999")
				.header("x-ratelimit-limit", "5000")
				.json_body(json!([event("1", "PushEvent"), event("2", "IssuesEvent")]));
		})
		.await;
	let second = server
		.mock_async(|when, then| {
			when.method(GET).path("/user/1/events").query_param("page", "2");
			then.status(200)
				.header("content-type", "application/json")
				.header("x-ratelimit-reset", reset.to_string())
				.header("x-ratelimit-remaining", "4998")
				.header("x-ratelimit-limit", "5000")
				.json_body(json!([event("3", "IssueCommentEvent")]));
		})
		.await;
	let cache = Arc::new(MemoryCache::default());
	let config = ClientConfig::default()
		.with_base_url(Url::parse(&server.base_url())?)
		.with_user_agent("github-pacer-demo");
	let http = SharedHttpClient::with_client(Client::builder().build()?);
	let client = ApiClient::with_parts("demo-token", config, http, cache.clone());

	for event in client.user_events("octocat", Some(2)).await? {
		let kind = event.kind().map_or("other", |kind| kind.as_str());

		println!("{} {} on {}.", event.id, kind, event.repo.name);
	}

	let keys = &client.config().record_keys;

	println!(
		"Shared budget: {}/{} until {}.",
		cache.get(&keys.remaining).await?.unwrap_or_default(),
		cache.get(&keys.limit).await?.unwrap_or_default(),
		cache.get(&keys.reset).await?.unwrap_or_default(),
	);

	client.close().await?;
	first.assert_async().await;
	second.assert_async().await;

	Ok(())
}
