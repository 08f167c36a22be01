//! Remote quota tracking and the bounded-wait policy.
//!
//! Trackers advertise their quota through response headers. The backend
//! records a [`RateLimitInfo`] snapshot after every response and consults it
//! before the next request: when remaining quota falls below a safety
//! threshold the backend suspends until the advertised reset time, bounded
//! by a ceiling so a remote that never recovers fails the run instead of
//! hanging it.

use std::time::{SystemTime, UNIX_EPOCH};

use http::HeaderMap;

/// Requests kept in reserve before the backend waits for a quota reset.
pub const REMAINING_SAFETY_THRESHOLD: u32 = 2;

/// Longest quota wait honoured before a run fails, in seconds.
///
/// Remote reset windows are at most an hour; anything longer signals a
/// misreported header or a permanently exhausted quota.
pub const MAX_QUOTA_WAIT_SECONDS: u64 = 3_600;

/// Quota snapshot extracted from tracker response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Maximum requests allowed in the current window.
    limit: u32,
    /// Remaining requests in the current window.
    remaining: u32,
    /// Unix timestamp when the quota resets.
    reset_at: u64,
}

impl RateLimitInfo {
    /// Creates a new quota snapshot.
    #[must_use]
    pub const fn new(limit: u32, remaining: u32, reset_at: u64) -> Self {
        Self {
            limit,
            remaining,
            reset_at,
        }
    }

    /// Parses the `X-RateLimit-*` headers from a tracker response.
    ///
    /// Returns `None` when any of the three headers is absent or malformed;
    /// the backend then proceeds without quota gating until the next
    /// well-formed snapshot.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let limit = parse_header(headers, "x-ratelimit-limit")?;
        let remaining = parse_header(headers, "x-ratelimit-remaining")?;
        let reset_at = parse_header(headers, "x-ratelimit-reset")?;
        Some(Self {
            limit,
            remaining,
            reset_at,
        })
    }

    /// Returns the maximum requests allowed in the current window.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Returns the remaining requests in the current window.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Returns the Unix timestamp when the quota resets.
    #[must_use]
    pub const fn reset_at(&self) -> u64 {
        self.reset_at
    }

    /// Returns true when remaining quota is at or below the safety
    /// threshold.
    #[must_use]
    pub const fn is_depleted(&self) -> bool {
        self.remaining <= REMAINING_SAFETY_THRESHOLD
    }

    /// Calculates seconds until the quota resets.
    ///
    /// Returns 0 if the reset time has already passed or if the system time
    /// cannot be determined.
    #[must_use]
    pub fn seconds_until_reset(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_secs())
            .unwrap_or(0);

        self.reset_at.saturating_sub(now)
    }

    /// Seconds the backend should suspend before its next request, or
    /// `None` when the wait would exceed the bounded ceiling.
    ///
    /// A one second skew is added on top of the advertised reset so the
    /// first request after resumption lands inside the fresh window.
    #[must_use]
    pub fn bounded_wait(&self) -> Option<u64> {
        let wait = self.seconds_until_reset().saturating_add(1);
        (wait <= MAX_QUOTA_WAIT_SECONDS).then_some(wait)
    }
}

fn parse_header<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}
