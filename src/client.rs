//! Rate-limited, paginating client for the GitHub REST API.
//!
//! Every request runs the same pipeline: a pre-flight check against the shared rate-limit
//! record (suspending the task when the budget is nearly spent), the GET itself, a status
//! check, and a timestamp-fenced write of the quota the response reported. Paginated
//! fetches repeat the pipeline for each `rel="next"` link, strictly one page at a time.

// std
use std::time::Duration as StdDuration;
// crates.io
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
// self
use crate::{
	_prelude::*,
	cache::SharedCache,
	config::ClientConfig,
	error::{ConfigError, DecodeError, TransportError},
	http::{ResponseMetadata, SharedHttpClient},
	models::{Event, UserInfo},
	obs::{self, FetchKind, FetchOutcome, FetchSpan},
	rate_limit::{RateLimitDecision, RateLimitPolicy, RateLimitSnapshot},
};

/// Media type requested from the API.
pub const ACCEPT_MEDIA_TYPE: &str = "application/vnd.github.v3+json";

/// Redacted bearer token wrapper keeping the secret out of logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);
impl AccessToken {
	/// Wraps a new token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl From<String> for AccessToken {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl From<&str> for AccessToken {
	fn from(value: &str) -> Self {
		Self(value.to_owned())
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AccessToken").field(&"<redacted>").finish()
	}
}
impl Display for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Authenticated API client sharing its quota with every other client on the same cache.
///
/// Cloning is cheap; clones share the HTTP connection and the coordinator.
#[derive(Clone)]
pub struct ApiClient {
	token: AccessToken,
	config: ClientConfig,
	policy: RateLimitPolicy,
	http: SharedHttpClient,
	cache: Arc<dyn SharedCache>,
}
impl ApiClient {
	/// Creates a client with the default configuration and a private HTTP connection.
	pub fn new(token: impl Into<AccessToken>, cache: Arc<dyn SharedCache>) -> Self {
		Self::with_parts(token, ClientConfig::default(), SharedHttpClient::default(), cache)
	}

	/// Creates a client from explicitly constructed collaborators.
	pub fn with_parts(
		token: impl Into<AccessToken>,
		config: ClientConfig,
		http: SharedHttpClient,
		cache: Arc<dyn SharedCache>,
	) -> Self {
		let policy = RateLimitPolicy::from_config(&config);

		Self { token: token.into(), config, policy, http, cache }
	}

	/// Active configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Fetches one page of `endpoint` and returns the JSON body as-is.
	pub async fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Value> {
		const KIND: FetchKind = FetchKind::Single;

		let span = FetchSpan::new(KIND, endpoint);

		obs::record_fetch_outcome(KIND, FetchOutcome::Attempt);

		let result = span
			.instrument(async move {
				let url = self.endpoint_url(endpoint)?;
				let (body, _) = self.fetch_page(&url, query).await?;

				Ok::<_, Error>(body)
			})
			.await;

		record_result(KIND, &result);

		result
	}

	/// Fetches every page of a list endpoint and concatenates the items in arrival order.
	///
	/// `query` is sent with the first request only; later pages use the server's `next`
	/// link verbatim. Any failure discards the pages gathered so far.
	pub async fn get_paginated(
		&self,
		endpoint: &str,
		query: &[(&str, &str)],
	) -> Result<Vec<Value>> {
		const KIND: FetchKind = FetchKind::Paginated;

		let span = FetchSpan::new(KIND, endpoint);

		obs::record_fetch_outcome(KIND, FetchOutcome::Attempt);

		let result = span
			.instrument(async move {
				let mut items = Vec::new();
				let mut query = query;
				let mut cursor = Some(self.endpoint_url(endpoint)?);

				while let Some(url) = cursor.take() {
					let (body, meta) = self.fetch_page(&url, query).await?;

					query = &[];

					match body {
						Value::Array(page) => items.extend(page),
						_ =>
							return Err(Error::from(DecodeError::UnexpectedShape {
								endpoint: url.to_string(),
							})),
					}

					cursor = meta.next_page.as_deref().and_then(|raw| next_cursor(&url, raw));
				}

				Ok::<_, Error>(items)
			})
			.await;

		record_result(KIND, &result);

		result
	}

	/// Fetches the authenticated user.
	pub async fn user_info(&self) -> Result<UserInfo> {
		let body = self.get("user", &[]).await?;

		decode("user", body)
	}

	/// Fetches every public event of `username`, `per_page` items per request (defaults to
	/// the configured page size).
	pub async fn user_events(
		&self,
		username: &str,
		per_page: Option<u32>,
	) -> Result<Vec<Event>> {
		let endpoint = events_endpoint(username);

		self.user_events_raw(username, per_page)
			.await?
			.into_iter()
			.map(|item| decode(&endpoint, item))
			.collect()
	}

	/// Same as [`ApiClient::user_events`] but keeps each event as raw JSON.
	pub async fn user_events_raw(
		&self,
		username: &str,
		per_page: Option<u32>,
	) -> Result<Vec<Value>> {
		let endpoint = events_endpoint(username);
		let per_page = per_page.unwrap_or(self.config.page_size).to_string();

		self.get_paginated(&endpoint, &[("per_page", per_page.as_str())]).await
	}

	/// Releases the HTTP connection and the coordinator connection. Idempotent.
	pub async fn close(&self) -> Result<()> {
		self.http.close().await;
		self.cache.close().await?;

		Ok(())
	}

	/// Consults the shared record and sleeps when the budget is nearly spent.
	///
	/// Returns the suspension applied, if any.
	pub(crate) async fn preflight(&self) -> Result<Option<Duration>> {
		let keys = &self.config.record_keys;
		let remaining = self.cache.get(&keys.remaining).await?;
		let reset = self.cache.get(&keys.reset).await?;
		let snapshot = RateLimitSnapshot::from_raw(remaining.as_deref(), reset.as_deref());

		match self.policy.evaluate(&snapshot, OffsetDateTime::now_utc()) {
			RateLimitDecision::Allow => Ok(None),
			RateLimitDecision::Delay(directive) => {
				let backoff = directive.recommended_backoff;

				obs::throttled(backoff, snapshot.remaining);
				obs::record_throttle();

				tokio::time::sleep(StdDuration::try_from(backoff).unwrap_or_default()).await;

				Ok(Some(backoff))
			},
		}
	}

	async fn fetch_page(
		&self,
		url: &Url,
		query: &[(&str, &str)],
	) -> Result<(Value, ResponseMetadata)> {
		self.preflight().await?;

		let client = self.http.client().await?;
		let mut request = client.get(url.clone()).headers(self.request_headers()?);

		if !query.is_empty() {
			request = request.query(query);
		}

		let response = request.send().await.map_err(TransportError::from)?;
		let status = response.status();
		let meta = ResponseMetadata::from_parts(status.as_u16(), response.headers());

		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();

			return Err(Error::HttpStatus {
				status: meta.status,
				body,
				retry_after: meta.retry_after,
			});
		}

		self.sync_rate_limit(&meta).await?;

		let bytes = response.bytes().await.map_err(TransportError::body)?;

		Ok((parse_body(url.as_str(), &bytes)?, meta))
	}

	async fn sync_rate_limit(&self, meta: &ResponseMetadata) -> Result<()> {
		let Some(headers) = meta.rate_limit.as_ref() else {
			return Ok(());
		};
		let write =
			headers.to_write(&self.config.record_keys, &self.policy, OffsetDateTime::now_utc());
		let applied = self.cache.run_conditional_multi_set(&write).await?;

		obs::rate_limit_synced(applied, headers.remaining.as_deref());

		Ok(())
	}

	fn request_headers(&self) -> Result<HeaderMap, ConfigError> {
		let mut headers = HeaderMap::new();
		let bearer = HeaderValue::from_str(&format!("Bearer {}", self.token.expose()))
			.map_err(|_| ConfigError::InvalidHeader { name: "authorization" })?;
		let user_agent = HeaderValue::from_str(&self.config.user_agent)
			.map_err(|_| ConfigError::InvalidHeader { name: "user-agent" })?;

		headers.insert(AUTHORIZATION, bearer);
		headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_MEDIA_TYPE));
		headers.insert(USER_AGENT, user_agent);

		Ok(headers)
	}

	fn endpoint_url(&self, endpoint: &str) -> Result<Url, ConfigError> {
		self.config.base_url.join(endpoint.trim_start_matches('/')).map_err(|source| {
			ConfigError::InvalidEndpoint { endpoint: endpoint.to_owned(), source }
		})
	}
}
impl Debug for ApiClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("token", &self.token)
			.field("config", &self.config)
			.field("http", &self.http)
			.finish()
	}
}

fn record_result<T>(kind: FetchKind, result: &Result<T>) {
	match result {
		Ok(_) => obs::record_fetch_outcome(kind, FetchOutcome::Success),
		Err(_) => obs::record_fetch_outcome(kind, FetchOutcome::Failure),
	}
}

fn events_endpoint(username: &str) -> String {
	format!("users/{username}/events")
}

// Relative links resolve against the page they came from; a link back to the same page
// would never terminate.
fn next_cursor(current: &Url, raw: &str) -> Option<Url> {
	match current.join(raw) {
		Ok(next) if next != *current => Some(next),
		_ => {
			obs::pagination_stopped(raw);

			None
		},
	}
}

fn parse_body(endpoint: &str, bytes: &[u8]) -> Result<Value> {
	if bytes.iter().all(u8::is_ascii_whitespace) {
		return Ok(Value::Null);
	}

	let mut deserializer = serde_json::Deserializer::from_slice(bytes);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| DecodeError::Json { endpoint: endpoint.to_owned(), source }.into())
}

fn decode<T>(endpoint: &str, value: Value) -> Result<T>
where
	T: serde::de::DeserializeOwned,
{
	serde_path_to_error::deserialize(value)
		.map_err(|source| DecodeError::Json { endpoint: endpoint.to_owned(), source }.into())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	fn unreachable_client() -> (ApiClient, Arc<crate::cache::MemoryCache>) {
		build_test_client("http://127.0.0.1:9/")
	}

	async fn seed(client: &ApiClient, remaining: &str, reset: i64) {
		let keys = &client.config().record_keys;

		client
			.cache
			.set(&keys.remaining, remaining, None)
			.await
			.expect("Seeding remaining should succeed.");
		client
			.cache
			.set(&keys.reset, &reset.to_string(), None)
			.await
			.expect("Seeding reset should succeed.");
	}

	#[tokio::test(start_paused = true)]
	async fn preflight_sleeps_until_reset_when_budget_is_low() {
		let (client, _cache) = unreachable_client();

		seed(&client, "5", OffsetDateTime::now_utc().unix_timestamp() + 30).await;

		let started = tokio::time::Instant::now();
		let backoff = client.preflight().await.expect("Pre-flight should succeed.");
		let elapsed = started.elapsed();

		assert!(backoff.is_some());
		assert!(elapsed >= StdDuration::from_secs(30), "Slept only {elapsed:?}.");
		assert!(elapsed <= StdDuration::from_secs(32), "Slept too long: {elapsed:?}.");
	}

	#[tokio::test(start_paused = true)]
	async fn preflight_does_not_sleep_with_healthy_budget() {
		let (client, _cache) = unreachable_client();

		seed(&client, "100", OffsetDateTime::now_utc().unix_timestamp() + 30).await;

		let started = tokio::time::Instant::now();

		assert_eq!(client.preflight().await.expect("Pre-flight should succeed."), None);
		assert_eq!(started.elapsed(), StdDuration::ZERO);
	}

	#[tokio::test(start_paused = true)]
	async fn preflight_does_not_sleep_after_reset() {
		let (client, _cache) = unreachable_client();

		seed(&client, "0", OffsetDateTime::now_utc().unix_timestamp() - 5).await;

		assert_eq!(client.preflight().await.expect("Pre-flight should succeed."), None);
	}

	#[tokio::test]
	async fn preflight_without_record_proceeds() {
		let (client, _cache) = unreachable_client();

		assert_eq!(client.preflight().await.expect("Pre-flight should succeed."), None);
	}

	#[test]
	fn endpoint_urls_nest_under_base() {
		let (client, _cache) = build_test_client("http://127.0.0.1:9/api/v3");

		assert_eq!(
			client.endpoint_url("/users/octo/events").expect("Endpoint should join.").as_str(),
			"http://127.0.0.1:9/api/v3/users/octo/events"
		);
	}

	#[test]
	fn next_cursor_resolves_relative_links_and_refuses_loops() {
		let current = Url::parse("https://api.github.com/user/1/events?page=2")
			.expect("Fixture URL should parse.");

		assert_eq!(
			next_cursor(&current, "/user/1/events?page=3").map(String::from),
			Some("https://api.github.com/user/1/events?page=3".into())
		);
		assert_eq!(next_cursor(&current, current.as_str()), None);
	}

	#[test]
	fn empty_body_decodes_as_null() {
		assert_eq!(parse_body("user", b"").expect("Empty body should decode."), Value::Null);
		assert!(matches!(parse_body("user", b"{"), Err(Error::Decode(DecodeError::Json { .. }))));
	}

	#[test]
	fn token_is_redacted() {
		let token = AccessToken::new("super-secret");

		assert_eq!(format!("{token:?}"), "AccessToken(\"<redacted>\")");
		assert_eq!(format!("{token}"), "<redacted>");
	}
}
