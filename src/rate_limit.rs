//! Rate-limit record model, response header parsing, and the pre-flight throttle policy.

// crates.io
use reqwest::header::HeaderMap;
// self
use crate::{
	_prelude::*,
	cache::{ConditionalWrite, RecordKeys},
	config::ClientConfig,
};

/// Header carrying the unix timestamp at which the quota refills.
pub const RESET_HEADER: &str = "x-ratelimit-reset";
/// Header carrying the requests left in the current window.
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
/// Header carrying the window's request ceiling.
pub const LIMIT_HEADER: &str = "x-ratelimit-limit";

/// Last known shared quota, as read from the coordinator before a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RateLimitSnapshot {
	/// Requests left, when recorded and numeric.
	pub remaining: Option<i64>,
	/// Reset instant as a unix timestamp, when recorded and numeric.
	pub reset: Option<i64>,
}
impl RateLimitSnapshot {
	/// Parses raw cache values; anything non-numeric counts as absent.
	pub fn from_raw(remaining: Option<&str>, reset: Option<&str>) -> Self {
		Self { remaining: remaining.and_then(parse_integer), reset: reset.and_then(parse_integer) }
	}
}

/// Result emitted by [`RateLimitPolicy::evaluate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The request may proceed immediately.
	Allow,
	/// The request should be delayed.
	Delay(RetryDirective),
}

/// Advises callers when to proceed after a [`RateLimitDecision::Delay`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Instant when it is safe to proceed.
	pub earliest_retry_at: OffsetDateTime,
	/// Suggested suspension.
	pub recommended_backoff: Duration,
}
impl RetryDirective {
	/// Creates a new directive with the provided timing metadata.
	pub fn new(earliest_retry_at: OffsetDateTime, recommended_backoff: Duration) -> Self {
		Self { earliest_retry_at, recommended_backoff }
	}
}

/// Advisory self-throttle applied before each request, plus the record TTL rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitPolicy {
	/// Throttle once `remaining` drops below this.
	pub threshold: u64,
	/// Minimum lifetime of the shared record.
	pub ttl_floor: Duration,
}
impl RateLimitPolicy {
	/// Slack added after the reset instant so the upstream window has really rolled over.
	pub const RESET_GRACE: Duration = Duration::seconds(1);
	/// Upper bound for the shared record's time-to-live.
	pub const MAX_RECORD_TTL: Duration = Duration::days(365);

	/// Extracts the policy knobs from a client configuration.
	pub fn from_config(config: &ClientConfig) -> Self {
		Self { threshold: config.throttle_threshold, ttl_floor: config.ttl_floor }
	}

	/// Decides whether the next request should wait for the quota to refill.
	pub fn evaluate(&self, snapshot: &RateLimitSnapshot, now: OffsetDateTime) -> RateLimitDecision {
		let threshold = i64::try_from(self.threshold).unwrap_or(i64::MAX);
		let (Some(remaining), Some(reset)) = (snapshot.remaining, snapshot.reset) else {
			return RateLimitDecision::Allow;
		};

		if remaining >= threshold {
			return RateLimitDecision::Allow;
		}

		let Ok(reset_at) = OffsetDateTime::from_unix_timestamp(reset) else {
			return RateLimitDecision::Allow;
		};
		let wait = reset_at - now;

		if !wait.is_positive() {
			return RateLimitDecision::Allow;
		}

		let backoff = wait + Self::RESET_GRACE;
		// A reset at the edge of the date range cannot be waited for.
		let Some(earliest_retry_at) = now.checked_add(backoff) else {
			return RateLimitDecision::Allow;
		};

		RateLimitDecision::Delay(RetryDirective::new(earliest_retry_at, backoff))
	}

	/// TTL for a record whose quota resets at `reset`: time until reset, floored, and capped
	/// at [`RateLimitPolicy::MAX_RECORD_TTL`].
	pub fn record_ttl(&self, reset: i64, now: OffsetDateTime) -> Duration {
		let until_reset = Duration::seconds(reset.saturating_sub(now.unix_timestamp()));

		until_reset.max(self.ttl_floor).min(Self::MAX_RECORD_TTL)
	}
}
impl Default for RateLimitPolicy {
	fn default() -> Self {
		Self {
			threshold: ClientConfig::DEFAULT_THROTTLE_THRESHOLD,
			ttl_floor: ClientConfig::DEFAULT_TTL_FLOOR,
		}
	}
}

/// Quota information reported by one upstream response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitHeaders {
	/// Reset instant as a unix timestamp.
	pub reset: i64,
	/// Raw `remaining` value, if reported.
	pub remaining: Option<String>,
	/// Raw `limit` value, if reported.
	pub limit: Option<String>,
}
impl RateLimitHeaders {
	/// Reads the rate-limit headers; `None` unless a numeric reset header is present.
	pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
		let reset = header_str(headers, RESET_HEADER).and_then(parse_integer)?;

		Some(Self {
			reset,
			remaining: header_str(headers, REMAINING_HEADER).map(ToOwned::to_owned),
			limit: header_str(headers, LIMIT_HEADER).map(ToOwned::to_owned),
		})
	}

	/// Builds the timestamp-fenced record write for these headers as observed at `now`.
	pub fn to_write(
		&self,
		keys: &RecordKeys,
		policy: &RateLimitPolicy,
		now: OffsetDateTime,
	) -> ConditionalWrite {
		let ttl = policy.record_ttl(self.reset, now);

		ConditionalWrite {
			keys: keys.clone(),
			timestamp_ms: unix_millis(now),
			ttl_secs: u64::try_from(ttl.whole_seconds()).unwrap_or_default(),
			reset: self.reset.to_string(),
			remaining: self.remaining.clone().unwrap_or_default(),
			limit: self.limit.clone().unwrap_or_default(),
		}
	}
}

/// Milliseconds since the unix epoch, saturating at the `i64` range.
pub fn unix_millis(instant: OffsetDateTime) -> i64 {
	i64::try_from(instant.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers.get(name)?.to_str().ok().map(str::trim).filter(|value| !value.is_empty())
}

fn parse_integer(raw: &str) -> Option<i64> {
	let raw = raw.trim();

	raw.parse::<i64>().ok().or_else(|| {
		raw.parse::<f64>().ok().filter(|value| value.is_finite()).map(|value| value.floor() as i64)
	})
}

#[cfg(test)]
mod tests {
	// crates.io
	use reqwest::header::HeaderValue;
	// self
	use super::*;

	fn now() -> OffsetDateTime {
		OffsetDateTime::from_unix_timestamp(1_700_000_000)
			.expect("Fixture timestamp should be valid.")
	}

	fn snapshot(remaining: i64, reset: i64) -> RateLimitSnapshot {
		RateLimitSnapshot { remaining: Some(remaining), reset: Some(reset) }
	}

	#[test]
	fn low_remaining_waits_until_reset_plus_grace() {
		let policy = RateLimitPolicy::default();
		let now = now();
		let decision = policy.evaluate(&snapshot(5, now.unix_timestamp() + 30), now);

		assert_eq!(
			decision,
			RateLimitDecision::Delay(RetryDirective::new(
				now + Duration::seconds(31),
				Duration::seconds(31)
			))
		);
	}

	#[test]
	fn healthy_remaining_never_waits() {
		let now = now();

		assert_eq!(
			RateLimitPolicy::default().evaluate(&snapshot(100, now.unix_timestamp() + 30), now),
			RateLimitDecision::Allow
		);
		assert_eq!(
			RateLimitPolicy::default().evaluate(&snapshot(10, now.unix_timestamp() + 30), now),
			RateLimitDecision::Allow
		);
	}

	#[test]
	fn past_reset_never_waits() {
		let now = now();

		assert_eq!(
			RateLimitPolicy::default().evaluate(&snapshot(0, now.unix_timestamp() - 5), now),
			RateLimitDecision::Allow
		);
		assert_eq!(
			RateLimitPolicy::default().evaluate(&snapshot(0, now.unix_timestamp()), now),
			RateLimitDecision::Allow
		);
	}

	#[test]
	fn missing_values_never_wait() {
		let now = now();
		let policy = RateLimitPolicy::default();

		assert_eq!(
			policy.evaluate(&RateLimitSnapshot::from_raw(None, Some("1700000030")), now),
			RateLimitDecision::Allow
		);
		assert_eq!(
			policy.evaluate(&RateLimitSnapshot::from_raw(Some("3"), None), now),
			RateLimitDecision::Allow
		);
		assert_eq!(
			policy.evaluate(&RateLimitSnapshot::from_raw(Some("few"), Some("1700000030")), now),
			RateLimitDecision::Allow
		);
	}

	#[test]
	fn custom_threshold_is_respected() {
		let now = now();
		let policy = RateLimitPolicy { threshold: 500, ..Default::default() };

		assert!(matches!(
			policy.evaluate(&snapshot(100, now.unix_timestamp() + 30), now),
			RateLimitDecision::Delay(_)
		));
	}

	#[test]
	fn record_ttl_is_floored() {
		let now = now();
		let policy = RateLimitPolicy::default();

		assert_eq!(policy.record_ttl(now.unix_timestamp() + 10, now), Duration::seconds(60));
		assert_eq!(policy.record_ttl(now.unix_timestamp() - 10, now), Duration::seconds(60));
		assert_eq!(policy.record_ttl(now.unix_timestamp() + 3600, now), Duration::seconds(3600));
	}

	#[test]
	fn record_ttl_is_capped() {
		let now = now();
		let policy = RateLimitPolicy::default();

		assert_eq!(policy.record_ttl(999_999_999_999, now), RateLimitPolicy::MAX_RECORD_TTL);
		assert_eq!(policy.record_ttl(i64::MAX, now), RateLimitPolicy::MAX_RECORD_TTL);

		let headers = RateLimitHeaders { reset: 999_999_999_999, remaining: None, limit: None };
		let write = headers.to_write(&RecordKeys::new("rl"), &policy, now);

		assert_eq!(write.ttl_secs, 365 * 24 * 60 * 60);
	}

	#[test]
	fn reset_at_end_of_date_range_never_waits() {
		let now = now();
		let max_reset = 253_402_300_799;

		assert_eq!(
			RateLimitPolicy::default().evaluate(&snapshot(0, max_reset), now),
			RateLimitDecision::Allow
		);
		assert_eq!(
			RateLimitPolicy::default().evaluate(&snapshot(0, max_reset + 1), now),
			RateLimitDecision::Allow
		);
	}

	#[test]
	fn headers_require_reset() {
		let mut headers = HeaderMap::new();

		headers.insert(REMAINING_HEADER, HeaderValue::from_static("4999"));

		assert_eq!(RateLimitHeaders::from_headers(&headers), None);

		headers.insert(RESET_HEADER, HeaderValue::from_static("1700003600"));
		headers.insert(LIMIT_HEADER, HeaderValue::from_static(""));

		assert_eq!(
			RateLimitHeaders::from_headers(&headers),
			Some(RateLimitHeaders {
				reset: 1_700_003_600,
				remaining: Some("4999".into()),
				limit: None,
			})
		);
	}

	#[test]
	fn write_carries_ttl_and_timestamp() {
		let now = now();
		let headers = RateLimitHeaders {
			reset: now.unix_timestamp() + 10,
			remaining: Some("9".into()),
			limit: None,
		};
		let write = headers.to_write(&RecordKeys::new("rl"), &RateLimitPolicy::default(), now);

		assert_eq!(write.ttl_secs, 60);
		assert_eq!(write.timestamp_ms, 1_700_000_000_000);
		assert_eq!(write.remaining, "9");
		assert!(write.limit.is_empty());
	}
}
