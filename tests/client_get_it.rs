mod common;

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use common::*;
use github_pacer::{
	cache::SharedCache,
	error::{DecodeError, Error},
	models::EventKind,
};

#[tokio::test]
async fn get_sends_auth_headers_and_query() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/repos/octocat/hello/issues")
				.header("authorization", "Bearer test-token")
				.header("accept", "application/vnd.github.v3+json")
				.header("user-agent", "github-pacer-tests")
				.query_param("state", "open");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "total": 1 }));
		})
		.await;
	let (client, _cache) = build_client(&server.base_url());
	let body = client
		.get("repos/octocat/hello/issues", &[("state", "open")])
		.await
		.expect("Single fetch should succeed.");

	mock.assert_async().await;

	assert_eq!(body, json!({ "total": 1 }));
}

#[tokio::test]
async fn get_returns_object_body_without_requiring_a_list() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/user");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "id": 1, "login": "octocat" }));
		})
		.await;
	let (client, _cache) = build_client(&server.base_url());
	let body = client.get("/user", &[]).await.expect("Leading slash should be accepted.");

	mock.assert_calls_async(1).await;

	assert_eq!(body["login"], "octocat");
}

#[tokio::test]
async fn non_success_status_surfaces_and_skips_record_write() {
	let server = MockServer::start_async().await;
	let reset = unix_now() + 3600;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/user");
			then.status(401)
				.header("x-ratelimit-reset", reset.to_string())
				.header("x-ratelimit-remaining", "4999")
				.body("{\"message\":\"Bad credentials\"}");
		})
		.await;
	let (client, cache) = build_client(&server.base_url());
	let err = client.get("user", &[]).await.expect_err("401 should surface as an error.");

	mock.assert_async().await;

	match &err {
		Error::HttpStatus { status, body, .. } => {
			assert_eq!(*status, 401);
			assert!(body.contains("Bad credentials"));
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	let keys = &client.config().record_keys;

	assert_eq!(cache.get(&keys.remaining).await.expect("Cache get should succeed."), None);
	assert_eq!(cache.get(&keys.timestamp).await.expect("Cache get should succeed."), None);
}

#[tokio::test]
async fn forbidden_status_keeps_retry_after_hint() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/user");
			then.status(403).header("retry-after", "42").body("rate limited");
		})
		.await;

	let (client, _cache) = build_client(&server.base_url());
	let err = client.get("user", &[]).await.expect_err("403 should surface as an error.");

	assert_eq!(err.status(), Some(403));
	assert!(matches!(
		err,
		Error::HttpStatus { retry_after: Some(hint), .. } if hint == time::Duration::seconds(42)
	));
}

#[tokio::test]
async fn invalid_json_is_a_decode_error() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/user");
			then.status(200).header("content-type", "application/json").body("{not json");
		})
		.await;

	let (client, _cache) = build_client(&server.base_url());
	let err = client.get("user", &[]).await.expect_err("Malformed JSON should fail.");

	assert!(matches!(err, Error::Decode(DecodeError::Json { .. })));
}

#[tokio::test]
async fn unreachable_upstream_is_a_connection_error() {
	let (client, _cache) = build_client("http://127.0.0.1:1/");
	let err = client.get("user", &[]).await.expect_err("Closed port should fail.");

	assert!(err.is_connection_unavailable(), "Unexpected error: {err:?}.");
}

#[tokio::test]
async fn user_info_decodes_typed_profile() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/user").header("authorization", "Bearer test-token");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"id": 583231,
				"login": "octocat",
				"name": "The Octocat",
				"created_at": "2011-01-25T18:44:36Z",
				"followers": 20
			}));
		})
		.await;

	let (client, _cache) = build_client(&server.base_url());
	let user = client.user_info().await.expect("User info should decode.");

	assert_eq!(user.id, 583231);
	assert_eq!(user.name.as_deref(), Some("The Octocat"));
	assert_eq!(user.extra.get("followers"), Some(&json!(20)));
}

#[tokio::test]
async fn user_events_defaults_page_size_and_classifies() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/users/octocat/events").query_param("per_page", "100");
			then.status(200).header("content-type", "application/json").json_body(json!([
				{
					"id": "1",
					"type": "PushEvent",
					"actor": { "id": 1, "login": "octocat" },
					"repo": { "id": 10, "name": "octocat/hello" },
					"payload": {},
					"public": true,
					"created_at": "2024-03-01T10:00:00Z"
				},
				{
					"id": "2",
					"type": "WatchEvent",
					"actor": { "id": 1, "login": "octocat" },
					"repo": { "id": 11, "name": "octocat/world" },
					"payload": {},
					"public": true,
					"created_at": "2024-03-01T09:00:00Z"
				}
			]));
		})
		.await;
	let (client, _cache) = build_client(&server.base_url());
	let events = client.user_events("octocat", None).await.expect("Events should decode.");

	mock.assert_async().await;

	assert_eq!(events.len(), 2);
	assert_eq!(events[0].kind(), Some(EventKind::Commit));
	assert_eq!(events[1].kind(), None);
}

#[tokio::test]
async fn user_events_honors_explicit_page_size() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/users/octocat/events").query_param("per_page", "30");
			then.status(200).header("content-type", "application/json").json_body(json!([]));
		})
		.await;
	let (client, _cache) = build_client(&server.base_url());
	let events = client
		.user_events_raw("octocat", Some(30))
		.await
		.expect("Empty event list should succeed.");

	mock.assert_async().await;

	assert!(events.is_empty());
}

#[tokio::test]
async fn close_is_idempotent_and_client_reopens() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/user");
			then.status(200).header("content-type", "application/json").json_body(json!({}));
		})
		.await;
	let (client, _cache) = build_client(&server.base_url());

	client.close().await.expect("Close before use should succeed.");
	client.get("user", &[]).await.expect("First fetch should succeed.");
	client.close().await.expect("First close should succeed.");
	client.close().await.expect("Second close should succeed.");
	client.get("user", &[]).await.expect("Fetch after close should reopen the connection.");

	mock.assert_calls_async(2).await;
}
