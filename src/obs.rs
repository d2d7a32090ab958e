//! Optional observability helpers for API fetches.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to run every fetch inside a `github_pacer.fetch` span carrying the `kind`
//!   and `endpoint` fields, and to emit events for throttling, rate-limit sync, and connection
//!   lifecycle.
//! - Enable `metrics` to increment the `github_pacer_fetch_total` counter for every
//!   attempt/success/failure (labeled by `kind` + `outcome`) and the
//!   `github_pacer_throttle_total` counter for every pre-flight suspension.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Fetch shapes issued by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchKind {
	/// One request, body returned as-is.
	Single,
	/// Link-following aggregation across pages.
	Paginated,
}
impl FetchKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FetchKind::Single => "single",
			FetchKind::Paginated => "paginated",
		}
	}
}
impl Display for FetchKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchOutcome {
	/// Entry to a client operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FetchOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FetchOutcome::Attempt => "attempt",
			FetchOutcome::Success => "success",
			FetchOutcome::Failure => "failure",
		}
	}
}
impl Display for FetchOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
