use std::hash::{Hash, Hasher};
use std::sync::RwLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::info::RateLimitInfo;
use crate::util::{read_unpoisoned, write_unpoisoned};

/// One consistent view of a key's quota state: the latest snapshot plus when
/// it was recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateSnapshot {
    pub info: RateLimitInfo,
    pub last_updated: SystemTime,
}

impl StateSnapshot {
    pub(crate) const fn empty() -> Self {
        Self {
            info: RateLimitInfo::empty(),
            last_updated: UNIX_EPOCH,
        }
    }

    /// Stale when the window has elapsed or no real data was ever recorded.
    pub fn is_stale(&self, now: SystemTime) -> bool {
        !self.info.has_valid_data() || now >= self.info.reset_time()
    }

    /// A request may go out whenever the data is stale or quota remains.
    pub fn can_make_request(&self, now: SystemTime) -> bool {
        self.is_stale(now) || self.info.remaining() > 0
    }

    /// Required delay before the next request: zero when one may go out now,
    /// else the server's explicit hint when positive, else time-until-reset.
    pub fn wait_time(&self, now: SystemTime) -> Duration {
        if self.can_make_request(now) {
            return Duration::ZERO;
        }
        let hint = self.info.retry_after();
        if hint > Duration::ZERO {
            return hint;
        }
        self.info.time_until_reset(now)
    }
}

/// Mutable per-key holder of the latest [`RateLimitInfo`].
///
/// Readers take a read lock and copy the whole snapshot out, so a concurrent
/// update can never be observed half-applied. Equality and hashing go by key
/// alone, independent of the current quota values.
#[derive(Debug)]
pub struct RateLimitState {
    key: String,
    inner: RwLock<StateSnapshot>,
}

impl RateLimitState {
    pub(crate) fn empty(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            inner: RwLock::new(StateSnapshot::empty()),
        }
    }

    pub(crate) fn with_info(key: impl Into<String>, info: RateLimitInfo, now: SystemTime) -> Self {
        Self {
            key: key.into(),
            inner: RwLock::new(StateSnapshot {
                info,
                last_updated: now,
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn snapshot(&self) -> StateSnapshot {
        *read_unpoisoned(&self.inner)
    }

    pub fn last_updated(&self) -> SystemTime {
        read_unpoisoned(&self.inner).last_updated
    }

    pub fn is_stale(&self, now: SystemTime) -> bool {
        self.snapshot().is_stale(now)
    }

    pub fn can_make_request(&self, now: SystemTime) -> bool {
        self.snapshot().can_make_request(now)
    }

    pub fn wait_time(&self, now: SystemTime) -> Duration {
        self.snapshot().wait_time(now)
    }

    /// Replaces the whole snapshot atomically and stamps `last_updated`. No
    /// partial-field mutation is ever exposed.
    pub(crate) fn set(&self, info: RateLimitInfo, now: SystemTime) {
        let mut guard = write_unpoisoned(&self.inner);
        *guard = StateSnapshot {
            info,
            last_updated: now,
        };
    }

    /// Optimistically consumes one request slot when real data is tracked.
    pub(crate) fn consume_slot(&self) {
        let mut guard = write_unpoisoned(&self.inner);
        if guard.info.has_valid_data() {
            guard.info = guard.info.decrement_remaining();
        }
    }
}

impl PartialEq for RateLimitState {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for RateLimitState {}

impl Hash for RateLimitState {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        self.key.hash(hasher);
    }
}
