use std::sync::{Arc, Condvar, Mutex};
use std::thread::sleep;
use std::time::{Duration, Instant, SystemTime};

use http::{HeaderMap, Request, Response, Uri};
use tracing::debug;

use crate::error::{GateError, RateLimitError};
use crate::gate::{Admission, AdmissionGate, GateCore};
use crate::metrics::GateMetricsSnapshot;
use crate::policy::GatePolicy;
use crate::store::RateLimitStore;
use crate::util::{lock_unpoisoned, millis_u64};

/// Cooperative cancellation handle for blocking waits.
///
/// Cloning shares the underlying flag; `cancel()` from any thread wakes every
/// wait parked on this token immediately. Once cancelled, a token stays
/// cancelled.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let mut cancelled = lock_unpoisoned(&self.inner.cancelled);
        *cancelled = true;
        self.inner.condvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *lock_unpoisoned(&self.inner.cancelled)
    }

    /// Parks the calling thread for up to `timeout`. Returns true when the
    /// token was cancelled before the timeout elapsed.
    fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut cancelled = lock_unpoisoned(&self.inner.cancelled);
        while !*cancelled {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = match self.inner.condvar.wait_timeout(cancelled, deadline - now) {
                Ok(woken) => woken,
                Err(poisoned) => poisoned.into_inner(),
            };
            cancelled = guard;
        }
        true
    }
}

/// Thread-blocking admission gate.
///
/// Behaviorally equivalent to [`AdmissionGate`], with the bounded wait
/// expressed as a real thread sleep. A [`CancelToken`] passed to
/// [`admit_with_cancel`] wakes the sleeping thread and surfaces
/// [`RateLimitError::WaitCancelled`] instead of silently proceeding.
///
/// [`admit_with_cancel`]: BlockingAdmissionGate::admit_with_cancel
#[derive(Clone, Debug)]
pub struct BlockingAdmissionGate {
    core: GateCore,
}

impl BlockingAdmissionGate {
    pub fn new(policy: GatePolicy) -> Self {
        Self {
            core: GateCore::new(policy),
        }
    }

    /// Builds a blocking gate over the same store, policy, and metrics as an
    /// existing async gate, so both execution models share one view of every
    /// host's quota.
    pub fn sharing(gate: &AdmissionGate) -> Self {
        Self {
            core: gate.core().clone(),
        }
    }

    /// The pure admission decision for `uri` at `now`; never blocks.
    pub fn check(&self, uri: &Uri, now: SystemTime) -> Admission {
        match self.core.target(uri) {
            Some(target) => self.core.decide(&target, now),
            None => Admission::Proceed,
        }
    }

    /// Admits one request, sleeping the calling thread for a bounded delay
    /// when the tracked quota requires it.
    pub fn admit(&self, uri: &Uri) -> Result<(), RateLimitError> {
        self.admit_inner(uri, None)
    }

    /// Like [`admit`], but an external `token.cancel()` during the wait wakes
    /// the thread and aborts the call with [`RateLimitError::WaitCancelled`].
    ///
    /// [`admit`]: BlockingAdmissionGate::admit
    pub fn admit_with_cancel(
        &self,
        uri: &Uri,
        token: &CancelToken,
    ) -> Result<(), RateLimitError> {
        self.admit_inner(uri, Some(token))
    }

    fn admit_inner(&self, uri: &Uri, token: Option<&CancelToken>) -> Result<(), RateLimitError> {
        let Some(target) = self.core.target(uri) else {
            self.core.metrics().record_admitted();
            return Ok(());
        };

        match self.core.decide(&target, SystemTime::now()) {
            Admission::Proceed => {
                self.core.note_proceed(&target);
                Ok(())
            }
            Admission::Wait(wait) => {
                debug!(
                    key = target.key(),
                    wait_ms = millis_u64(wait),
                    "blocking request until rate limit window allows it"
                );
                let started = Instant::now();
                let cancelled = match token {
                    Some(token) => token.wait_timeout(wait),
                    None => {
                        sleep(wait);
                        false
                    }
                };

                if cancelled {
                    self.core.metrics().record_cancelled();
                    return Err(RateLimitError::WaitCancelled {
                        host: target.host().to_owned(),
                        waited_millis: millis_u64(started.elapsed()),
                    });
                }

                self.core.metrics().record_delayed(wait);
                self.core.note_proceed(&target);
                Ok(())
            }
            Admission::Reject(error) => {
                self.core.note_rejected(&target, &error);
                Err(error)
            }
        }
    }

    /// Records rate-limit headers from a successful response.
    pub fn record_response(&self, uri: &Uri, headers: &HeaderMap) {
        if let Some(target) = self.core.target(uri) {
            self.core.record_response(&target, headers, SystemTime::now());
        }
    }

    /// Full middleware path, blocking flavor: admit, delegate to `send`
    /// unchanged, record headers on success. Transport failures propagate
    /// untouched and update no state.
    pub fn execute<B, R, E, F>(
        &self,
        request: Request<B>,
        send: F,
    ) -> Result<Response<R>, GateError<E>>
    where
        F: FnOnce(Request<B>) -> Result<Response<R>, E>,
    {
        let uri = request.uri().clone();
        self.admit(&uri)?;

        match send(request) {
            Ok(response) => {
                self.record_response(&uri, response.headers());
                Ok(response)
            }
            Err(error) => Err(GateError::Transport(error)),
        }
    }

    /// Removes entries whose window has fully elapsed.
    pub fn evict_expired(&self) -> usize {
        self.core.evict_expired(SystemTime::now())
    }

    pub fn store(&self) -> &RateLimitStore {
        self.core.store()
    }

    pub fn policy(&self) -> &GatePolicy {
        self.core.policy()
    }

    pub fn metrics_snapshot(&self) -> GateMetricsSnapshot {
        self.core.metrics().snapshot()
    }
}
