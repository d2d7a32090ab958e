//! Shared HTTP connection and response metadata capture.
//!
//! [`SharedHttpClient`] owns the process's single [`ReqwestClient`] (and therefore its
//! connection pool). The client is built on first use, memoized, and dropped by
//! [`SharedHttpClient::close`]. Clones share the same slot, so the composition root can
//! hand one instance to every [`ApiClient`](crate::client::ApiClient) it creates.

// crates.io
use reqwest::header::{HeaderMap, LINK, RETRY_AFTER};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::ConfigError, link, obs, rate_limit::RateLimitHeaders};

type ClientFactory = Arc<dyn Fn() -> Result<ReqwestClient, ConfigError> + Send + Sync>;

/// Lazily created, explicitly released HTTP client handle.
#[derive(Clone)]
pub struct SharedHttpClient {
	factory: ClientFactory,
	slot: Arc<AsyncMutex<Option<ReqwestClient>>>,
}
impl SharedHttpClient {
	/// Uses `factory` to build the client the first time one is needed.
	///
	/// The factory runs at most once per open/close cycle, even when many tasks race for the
	/// first connection.
	pub fn with_factory(
		factory: impl 'static + Fn() -> Result<ReqwestClient, ConfigError> + Send + Sync,
	) -> Self {
		Self { factory: Arc::new(factory), slot: Default::default() }
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self::with_factory(move || Ok(client.clone()))
	}

	/// Returns the memoized client, building it on first use.
	pub async fn client(&self) -> Result<ReqwestClient, ConfigError> {
		let mut slot = self.slot.lock().await;

		if let Some(client) = slot.as_ref() {
			return Ok(client.clone());
		}

		let client = (self.factory)()?;

		obs::connection_opened("http");

		*slot = Some(client.clone());

		Ok(client)
	}

	/// Returns `true` while a memoized client exists.
	pub async fn is_open(&self) -> bool {
		self.slot.lock().await.is_some()
	}

	/// Drops the memoized client. Safe to call repeatedly or before first use.
	pub async fn close(&self) {
		if self.slot.lock().await.take().is_some() {
			obs::connection_closed("http");
		}
	}
}
impl Default for SharedHttpClient {
	fn default() -> Self {
		Self::with_factory(|| {
			ReqwestClient::builder().build().map_err(ConfigError::http_client_build)
		})
	}
}
impl Debug for SharedHttpClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("SharedHttpClient(..)")
	}
}

/// Metadata captured from an upstream response before its body is consumed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status code.
	pub status: u16,
	/// Quota information, when the response carried a usable reset header.
	pub rate_limit: Option<RateLimitHeaders>,
	/// Next-page URL from the `Link` header.
	pub next_page: Option<String>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}
impl ResponseMetadata {
	/// Extracts metadata from a status code and header map.
	pub fn from_parts(status: u16, headers: &HeaderMap) -> Self {
		let link_header = headers.get(LINK).and_then(|value| value.to_str().ok());

		Self {
			status,
			rate_limit: RateLimitHeaders::from_headers(headers),
			next_page: link::next_link(link_header).map(ToOwned::to_owned),
			retry_after: parse_retry_after(headers),
		}
	}
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
