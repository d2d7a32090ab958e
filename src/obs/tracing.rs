// self
use crate::{_prelude::*, obs::FetchKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFetch<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFetch<F> = F;

/// A span builder used by client fetches.
#[derive(Clone, Debug)]
pub struct FetchSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FetchSpan {
	/// Creates a new span tagged with the fetch kind and endpoint.
	pub fn new(kind: FetchKind, endpoint: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("github_pacer.fetch", kind = kind.as_str(), endpoint);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, endpoint);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFetch<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits an event when the pre-flight check suspends a request.
pub fn throttled(backoff: Duration, remaining: Option<i64>) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(
			backoff_ms = backoff.whole_milliseconds() as u64,
			remaining,
			"Shared rate-limit budget is low; waiting for reset."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (backoff, remaining);
	}
}

/// Emits an event after a rate-limit sync; `applied = false` means a fresher record won.
pub fn rate_limit_synced(applied: bool, remaining: Option<&str>) {
	#[cfg(feature = "tracing")]
	{
		if applied {
			tracing::trace!(remaining, "Shared rate-limit record updated.");
		} else {
			tracing::debug!(remaining, "Shared rate-limit record is newer; update skipped.");
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (applied, remaining);
	}
}

/// Emits an event when a `Link` header points at something that is not a URL.
pub fn pagination_stopped(raw: &str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(next = raw, "Ignoring unparseable next-page link.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = raw;
	}
}

/// Emits an event when a lazily created connection is opened.
pub fn connection_opened(target: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(target_kind = target, "Opened shared connection.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = target;
	}
}

/// Emits an event when a shared connection is released.
pub fn connection_closed(target: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(target_kind = target, "Closed shared connection.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = target;
	}
}
