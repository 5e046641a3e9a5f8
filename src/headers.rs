//! Decoding of rate-limit metadata from response headers.
//!
//! Recognized conventions, in priority order per field: `X-RateLimit-*`
//! (GitHub, Twitter/X, generic), `RateLimit-*` (IETF draft), `Stripe-RateLimit-*`.
//! The wait hint comes from `Retry-After` in delay-seconds, RFC 7231 HTTP-date,
//! or RFC 3339 form. Every parser degrades to `None` on malformed input; none
//! of them ever fails or blocks.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use http::HeaderMap;
use http::header::RETRY_AFTER;

const LIMIT_HEADERS: [&str; 3] = ["x-ratelimit-limit", "ratelimit-limit", "stripe-ratelimit-limit"];
const REMAINING_HEADERS: [&str; 3] = [
    "x-ratelimit-remaining",
    "ratelimit-remaining",
    "stripe-ratelimit-remaining",
];
const RESET_HEADERS: [&str; 3] = ["x-ratelimit-reset", "ratelimit-reset", "stripe-ratelimit-reset"];
const RESOURCE_HEADER: &str = "x-ratelimit-resource";
const USED_HEADER: &str = "x-ratelimit-used";

/// Reset values above this epoch-second bound (~year 2286) are treated as
/// corrupted and rejected; the bound itself is accepted.
const MAX_RESET_EPOCH_SECONDS: u64 = 9_999_999_999;

/// Every field the parser can extract from one response, each independently
/// optional.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedRateLimitHeaders {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    pub reset: Option<SystemTime>,
    pub retry_after: Option<Duration>,
    pub resource: Option<String>,
    pub used: Option<u64>,
}

impl ParsedRateLimitHeaders {
    /// True when the response carried at least one quota field. Provider
    /// extras alone do not count; a response without quota fields must not
    /// overwrite previously learned state.
    pub const fn is_informative(&self) -> bool {
        self.limit.is_some()
            || self.remaining.is_some()
            || self.reset.is_some()
            || self.retry_after.is_some()
    }
}

/// Decodes every recognized field at once. `now` anchors relative forms of
/// `Retry-After`.
pub fn parse_all(headers: &HeaderMap, now: SystemTime) -> ParsedRateLimitHeaders {
    ParsedRateLimitHeaders {
        limit: parse_limit(headers),
        remaining: parse_remaining(headers),
        reset: parse_reset(headers),
        retry_after: parse_retry_after(headers, now),
        resource: parse_resource(headers),
        used: parse_used(headers),
    }
}

/// Maximum requests per window, from the highest-priority header that holds a
/// non-negative integer.
pub fn parse_limit(headers: &HeaderMap) -> Option<u64> {
    first_non_negative(headers, &LIMIT_HEADERS)
}

/// Requests left in the current window, same priority rules as [`parse_limit`].
pub fn parse_remaining(headers: &HeaderMap) -> Option<u64> {
    first_non_negative(headers, &REMAINING_HEADERS)
}

/// Window reset time as Unix epoch seconds, bounded to a sane range.
pub fn parse_reset(headers: &HeaderMap) -> Option<SystemTime> {
    RESET_HEADERS
        .iter()
        .find_map(|name| epoch_seconds_value(headers, name))
}

/// Explicit server wait hint from `Retry-After`, normalized to a delay from
/// `now`. Integer delay-seconds is tried first, then HTTP-date, then RFC 3339;
/// a date already in the past yields a zero delay.
pub fn parse_retry_after(headers: &HeaderMap, now: SystemTime) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = parse_retry_after_date(raw)?;
    Some(date.duration_since(now).unwrap_or(Duration::ZERO))
}

/// Provider-specific resource bucket name (`X-RateLimit-Resource`), trimmed.
pub fn parse_resource(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(RESOURCE_HEADER)?.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }
    Some(raw.to_owned())
}

/// Provider-specific used-count (`X-RateLimit-Used`).
pub fn parse_used(headers: &HeaderMap) -> Option<u64> {
    non_negative_value(headers, USED_HEADER)
}

fn first_non_negative(headers: &HeaderMap, names: &[&str]) -> Option<u64> {
    names.iter().find_map(|name| non_negative_value(headers, name))
}

fn non_negative_value(headers: &HeaderMap, name: &str) -> Option<u64> {
    let raw = headers.get(name)?.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<u64>().ok()
}

fn epoch_seconds_value(headers: &HeaderMap, name: &str) -> Option<SystemTime> {
    let seconds = non_negative_value(headers, name)?;
    if seconds > MAX_RESET_EPOCH_SECONDS {
        return None;
    }
    Some(UNIX_EPOCH + Duration::from_secs(seconds))
}

fn parse_retry_after_date(raw: &str) -> Option<SystemTime> {
    if let Ok(date) = httpdate::parse_http_date(raw) {
        return Some(date);
    }

    let parsed = chrono::DateTime::parse_from_rfc3339(raw).ok()?;
    let seconds = parsed.timestamp();
    if seconds < 0 {
        return None;
    }
    Some(UNIX_EPOCH + Duration::from_secs(seconds as u64))
}
