use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use tracing::trace;

use crate::info::RateLimitInfo;
use crate::state::RateLimitState;
use crate::util::lock_unpoisoned;

const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Thread-safe home for all per-key rate-limit state.
///
/// Entries are created lazily on first update; absent keys read as "no
/// information, request allowed". Updates are atomic replace-or-insert with
/// last-write-wins semantics. Stale entries are removed opportunistically on
/// the update path (at most once per sweep interval, gated by a CAS so
/// concurrent updaters do not stampede) and on explicit [`evict_expired`]
/// calls from the host application.
///
/// [`evict_expired`]: RateLimitStore::evict_expired
#[derive(Debug)]
pub struct RateLimitStore {
    entries: Mutex<BTreeMap<String, Arc<RateLimitState>>>,
    max_entries: usize,
    sweep_origin: Instant,
    last_sweep_ms: AtomicU64,
}

impl RateLimitStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            max_entries: max_entries.max(1),
            sweep_origin: Instant::now(),
            last_sweep_ms: AtomicU64::new(0),
        }
    }

    /// Current state for `key`, or a fresh detached empty state when the key
    /// is untracked. Never absent, never an error; reads do not insert.
    pub fn get(&self, key: &str) -> Arc<RateLimitState> {
        let entries = lock_unpoisoned(&self.entries);
        match entries.get(key) {
            Some(state) => Arc::clone(state),
            None => Arc::new(RateLimitState::empty(key)),
        }
    }

    /// Atomic replace-or-insert. Concurrent updates to the same key are
    /// last-write-wins; the most recent server response is authoritative.
    pub fn update(&self, key: &str, info: RateLimitInfo, now: SystemTime) {
        let mut entries = lock_unpoisoned(&self.entries);
        match entries.get(key) {
            Some(state) => state.set(info, now),
            None => {
                entries.insert(
                    key.to_owned(),
                    Arc::new(RateLimitState::with_info(key, info, now)),
                );
            }
        }
        self.maybe_sweep(&mut entries, now);
    }

    /// Optimistically consumes one request slot for a tracked key; a no-op
    /// for untracked keys.
    pub fn consume_slot(&self, key: &str) {
        let entries = lock_unpoisoned(&self.entries);
        if let Some(state) = entries.get(key) {
            state.consume_slot();
        }
    }

    /// Removes every entry whose window has fully elapsed at `now`. Safe to
    /// invoke concurrently from any number of callers; removal is idempotent.
    /// Returns how many entries were removed by this call.
    pub fn evict_expired(&self, now: SystemTime) -> usize {
        let mut entries = lock_unpoisoned(&self.entries);
        let before = entries.len();
        entries.retain(|_, state| !state.is_stale(now));
        let removed = before - entries.len();
        if removed > 0 {
            trace!(removed, remaining = entries.len(), "evicted expired rate limit entries");
        }
        removed
    }

    pub fn clear(&self, key: &str) {
        let mut entries = lock_unpoisoned(&self.entries);
        entries.remove(key);
    }

    pub fn clear_all(&self) {
        let mut entries = lock_unpoisoned(&self.entries);
        entries.clear();
    }

    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock_unpoisoned(&self.entries).is_empty()
    }

    fn maybe_sweep(&self, entries: &mut BTreeMap<String, Arc<RateLimitState>>, now: SystemTime) {
        let now_ms = self.sweep_origin.elapsed().as_millis().min(u64::MAX as u128) as u64;

        if entries.len() > self.max_entries {
            sweep_entries(entries, self.max_entries, now);
            self.last_sweep_ms.store(now_ms, Ordering::Relaxed);
            return;
        }

        let interval_ms = SWEEP_INTERVAL.as_millis() as u64;
        loop {
            let last_ms = self.last_sweep_ms.load(Ordering::Relaxed);
            if now_ms.saturating_sub(last_ms) < interval_ms {
                return;
            }
            if self
                .last_sweep_ms
                .compare_exchange(last_ms, now_ms, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }

        sweep_entries(entries, self.max_entries, now);
    }
}

fn sweep_entries(
    entries: &mut BTreeMap<String, Arc<RateLimitState>>,
    max_entries: usize,
    now: SystemTime,
) {
    entries.retain(|_, state| !state.is_stale(now));

    while entries.len() > max_entries {
        let oldest_key = entries
            .iter()
            .min_by_key(|(_, state)| state.last_updated())
            .map(|(key, _)| key.clone());
        let Some(oldest_key) = oldest_key else {
            break;
        };
        entries.remove(&oldest_key);
    }
}
