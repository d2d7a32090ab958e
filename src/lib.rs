//! Rate-limit-aware, paginating GitHub REST client whose request budget is shared across
//! processes through a Redis-backed coordinator.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod link;
pub mod models;
pub mod obs;
pub mod rate_limit;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and client builders for tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		cache::{MemoryCache, SharedCache},
		client::ApiClient,
		config::ClientConfig,
		http::SharedHttpClient,
	};

	/// Token used by every test client.
	pub const TEST_TOKEN: &str = "test-token";

	/// Builds a client pointed at `base_url` and backed by a fresh in-memory coordinator.
	///
	/// The returned [`MemoryCache`] handle shares state with the client so tests can seed
	/// or inspect the rate-limit record.
	pub fn build_test_client(base_url: &str) -> (ApiClient, Arc<MemoryCache>) {
		let config = ClientConfig::default()
			.with_base_url(
				Url::parse(base_url).expect("Mock server base URL should parse successfully."),
			)
			.with_user_agent("github-pacer-tests");
		let cache_backend = Arc::new(MemoryCache::default());
		let cache: Arc<dyn SharedCache> = cache_backend.clone();
		let client = ApiClient::with_parts(TEST_TOKEN, config, SharedHttpClient::default(), cache);

		(client, cache_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::RwLock;
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
