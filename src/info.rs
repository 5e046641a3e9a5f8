use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Immutable snapshot of the quota fields learned from one response.
///
/// A `limit` of 0 means no rate-limit information is available; `UNIX_EPOCH`
/// is the sentinel for an unknown reset time and a zero `retry_after` means
/// the server gave no explicit wait hint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitInfo {
    limit: u64,
    remaining: u64,
    reset_time: SystemTime,
    retry_after: Duration,
}

impl RateLimitInfo {
    /// Builds a snapshot. When the limit is known, `remaining` is clamped to
    /// it; with an unknown limit both may legitimately be zero.
    pub fn new(limit: u64, remaining: u64, reset_time: SystemTime, retry_after: Duration) -> Self {
        let remaining = if limit > 0 { remaining.min(limit) } else { remaining };
        Self {
            limit,
            remaining,
            reset_time,
            retry_after,
        }
    }

    /// Snapshot carrying no information at all.
    pub const fn empty() -> Self {
        Self {
            limit: 0,
            remaining: 0,
            reset_time: UNIX_EPOCH,
            retry_after: Duration::ZERO,
        }
    }

    pub const fn limit(&self) -> u64 {
        self.limit
    }

    pub const fn remaining(&self) -> u64 {
        self.remaining
    }

    pub const fn reset_time(&self) -> SystemTime {
        self.reset_time
    }

    pub const fn retry_after(&self) -> Duration {
        self.retry_after
    }

    pub const fn has_valid_data(&self) -> bool {
        self.limit > 0
    }

    pub const fn is_limit_exceeded(&self) -> bool {
        self.limit > 0 && self.remaining == 0
    }

    /// Whole seconds until the window resets; 0 once the reset time has passed.
    pub fn seconds_until_reset(&self, now: SystemTime) -> u64 {
        self.time_until_reset(now).as_secs()
    }

    pub fn time_until_reset(&self, now: SystemTime) -> Duration {
        self.reset_time.duration_since(now).unwrap_or(Duration::ZERO)
    }

    /// Optimistic local bookkeeping between server updates: one request slot
    /// consumed. Decrementing from 0 is an identity-preserving no-op, never an
    /// underflow.
    #[must_use]
    pub fn decrement_remaining(self) -> Self {
        if self.remaining == 0 {
            return self;
        }
        Self {
            remaining: self.remaining - 1,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use super::RateLimitInfo;

    #[test]
    fn empty_has_no_valid_data_and_is_not_exceeded() {
        let info = RateLimitInfo::empty();
        assert!(!info.has_valid_data());
        assert!(!info.is_limit_exceeded());
        assert_eq!(info.limit(), 0);
        assert_eq!(info.remaining(), 0);
        assert_eq!(info.reset_time(), UNIX_EPOCH);
        assert_eq!(info.retry_after(), Duration::ZERO);
    }

    #[test]
    fn exceeded_requires_a_known_limit() {
        let now = SystemTime::now();
        let exhausted = RateLimitInfo::new(100, 0, now, Duration::ZERO);
        assert!(exhausted.is_limit_exceeded());

        let unknown = RateLimitInfo::new(0, 0, now, Duration::ZERO);
        assert!(!unknown.is_limit_exceeded());

        let healthy = RateLimitInfo::new(100, 1, now, Duration::ZERO);
        assert!(!healthy.is_limit_exceeded());
    }

    #[test]
    fn remaining_is_clamped_to_a_known_limit() {
        let info = RateLimitInfo::new(10, 25, SystemTime::now(), Duration::ZERO);
        assert_eq!(info.remaining(), 10);
    }

    #[test]
    fn decrement_produces_a_new_snapshot() {
        let now = SystemTime::now();
        let info = RateLimitInfo::new(100, 5, now, Duration::ZERO);
        let decremented = info.decrement_remaining();
        assert_eq!(decremented.remaining(), 4);
        assert_eq!(decremented.limit(), 100);
        assert_eq!(info.remaining(), 5);
    }

    #[test]
    fn decrement_at_zero_is_an_idempotent_no_op() {
        let now = SystemTime::now();
        let info = RateLimitInfo::new(100, 0, now, Duration::ZERO);
        let once = info.decrement_remaining();
        assert_eq!(once, info);
        let twice = once.decrement_remaining();
        assert_eq!(twice, info);
    }

    #[test]
    fn seconds_until_reset_saturates_at_zero() {
        let now = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let info = RateLimitInfo::new(10, 1, now + Duration::from_secs(60), Duration::ZERO);
        assert_eq!(info.seconds_until_reset(now), 60);

        let past = RateLimitInfo::new(10, 1, now - Duration::from_secs(60), Duration::ZERO);
        assert_eq!(past.seconds_until_reset(now), 0);
    }
}
