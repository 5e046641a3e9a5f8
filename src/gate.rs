use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use http::{HeaderMap, Request, Response, Uri};
use tracing::{debug, warn};

use crate::error::{GateError, RateLimitError};
use crate::headers;
use crate::info::RateLimitInfo;
use crate::metrics::{GateMetrics, GateMetricsSnapshot};
use crate::policy::GatePolicy;
use crate::store::RateLimitStore;
use crate::util::{RequestTarget, millis_u64};

/// Outcome of the pre-request check for one attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Proceed immediately with zero delay.
    Proceed,
    /// Proceed after the bounded delay.
    Wait(Duration),
    /// Terminal for this attempt: the required wait exceeds the threshold.
    Reject(RateLimitError),
}

/// State and logic shared by both gate variants; the variants differ only in
/// how the wait is expressed.
#[derive(Clone, Debug)]
pub(crate) struct GateCore {
    store: Arc<RateLimitStore>,
    policy: GatePolicy,
    metrics: GateMetrics,
}

impl GateCore {
    pub(crate) fn new(policy: GatePolicy) -> Self {
        let policy = policy.normalize();
        Self {
            store: Arc::new(RateLimitStore::new(policy.configured_max_tracked_keys())),
            policy,
            metrics: GateMetrics::default(),
        }
    }

    pub(crate) fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    pub(crate) fn store(&self) -> &RateLimitStore {
        &self.store
    }

    pub(crate) fn metrics(&self) -> &GateMetrics {
        &self.metrics
    }

    pub(crate) fn target(&self, uri: &Uri) -> Option<RequestTarget> {
        RequestTarget::from_uri(uri, self.policy.configured_granularity())
    }

    pub(crate) fn decide(&self, target: &RequestTarget, now: SystemTime) -> Admission {
        if !self.policy.is_enabled() {
            return Admission::Proceed;
        }

        let state = self.store.get(target.key());
        if state.can_make_request(now) {
            return Admission::Proceed;
        }

        let wait = state.wait_time(now);
        let threshold = self.policy.configured_max_wait();
        if wait > threshold {
            return Admission::Reject(RateLimitError::Exceeded {
                host: target.host().to_owned(),
                endpoint: target.endpoint_owned(),
                wait_millis: millis_u64(wait),
                threshold_millis: millis_u64(threshold),
                retry_at_epoch_seconds: retry_at_epoch_seconds(now, wait),
            });
        }

        Admission::Wait(wait)
    }

    pub(crate) fn note_proceed(&self, target: &RequestTarget) {
        if self.policy.is_enabled() {
            self.store.consume_slot(target.key());
        }
        self.metrics.record_admitted();
    }

    pub(crate) fn note_rejected(&self, target: &RequestTarget, error: &RateLimitError) {
        self.metrics.record_rejected();
        warn!(
            key = target.key(),
            error = %error,
            "rejecting request: required wait exceeds threshold"
        );
    }

    /// Success-path update from response headers. A response without any
    /// recognizable quota field leaves existing state untouched.
    pub(crate) fn record_response(&self, target: &RequestTarget, headers: &HeaderMap, now: SystemTime) {
        if !self.policy.is_enabled() {
            return;
        }

        let parsed = headers::parse_all(headers, now);
        if !parsed.is_informative() {
            return;
        }

        let limit = parsed
            .limit
            .unwrap_or_else(|| self.policy.configured_fallback_limit());
        let remaining = parsed.remaining.unwrap_or(limit);
        let reset_time = parsed
            .reset
            .unwrap_or_else(|| now + self.policy.configured_fallback_window());
        let retry_after = match parsed.retry_after {
            Some(hint) => hint,
            None if remaining == 0 => reset_time.duration_since(now).unwrap_or(Duration::ZERO),
            None => Duration::ZERO,
        };

        let info = RateLimitInfo::new(limit, remaining, reset_time, retry_after);
        self.store.update(target.key(), info, now);
        self.metrics.record_state_update();
        debug!(
            key = target.key(),
            limit = info.limit(),
            remaining = info.remaining(),
            "stored rate limit state from response headers"
        );
    }

    pub(crate) fn evict_expired(&self, now: SystemTime) -> usize {
        let removed = self.store.evict_expired(now);
        self.metrics.record_evictions(removed);
        removed
    }
}

fn retry_at_epoch_seconds(now: SystemTime, wait: Duration) -> u64 {
    (now + wait)
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Suspension-based admission gate for async callers.
///
/// A bounded wait is expressed as a `tokio` timer, so no worker thread is
/// occupied while the request is pending; dropping the returned future cancels
/// the pending timer. No lock is held across the suspension point.
#[derive(Clone, Debug)]
pub struct AdmissionGate {
    core: GateCore,
}

impl AdmissionGate {
    pub fn new(policy: GatePolicy) -> Self {
        Self {
            core: GateCore::new(policy),
        }
    }

    pub(crate) fn core(&self) -> &GateCore {
        &self.core
    }

    /// The pure admission decision for `uri` at `now`; never suspends.
    /// Requests without a resolvable host are not tracked and always proceed.
    pub fn check(&self, uri: &Uri, now: SystemTime) -> Admission {
        match self.core.target(uri) {
            Some(target) => self.core.decide(&target, now),
            None => Admission::Proceed,
        }
    }

    /// Admits one request, suspending for a bounded delay when the tracked
    /// quota requires it. Returns the typed rejection when the required wait
    /// exceeds the configured threshold.
    pub async fn admit(&self, uri: &Uri) -> Result<(), RateLimitError> {
        self.admit_with_cancel(uri, std::future::pending()).await
    }

    /// Like [`admit`], but aborts a pending wait with
    /// [`RateLimitError::WaitCancelled`] as soon as `cancel` completes. The
    /// pending timer is dropped on cancellation.
    ///
    /// [`admit`]: AdmissionGate::admit
    pub async fn admit_with_cancel<C>(&self, uri: &Uri, cancel: C) -> Result<(), RateLimitError>
    where
        C: Future<Output = ()>,
    {
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
                    "delaying request until rate limit window allows it"
                );
                let started = tokio::time::Instant::now();
                tokio::pin!(cancel);
                tokio::select! {
                    () = tokio::time::sleep(wait) => {
                        self.core.metrics().record_delayed(wait);
                        self.core.note_proceed(&target);
                        Ok(())
                    }
                    () = &mut cancel => {
                        self.core.metrics().record_cancelled();
                        Err(RateLimitError::WaitCancelled {
                            host: target.host().to_owned(),
                            waited_millis: millis_u64(started.elapsed()),
                        })
                    }
                }
            }
            Admission::Reject(error) => {
                self.core.note_rejected(&target, &error);
                Err(error)
            }
        }
    }

    /// Records rate-limit headers from a successful response. Transport
    /// failures must not be fed through here; state only reflects responses
    /// the server actually produced.
    pub fn record_response(&self, uri: &Uri, headers: &HeaderMap) {
        if let Some(target) = self.core.target(uri) {
            self.core.record_response(&target, headers, SystemTime::now());
        }
    }

    /// Full middleware path: admit, delegate to `send` unchanged, record the
    /// response headers on success. A transport failure propagates untouched
    /// inside [`GateError::Transport`] and updates no state; any partially
    /// acquired response is released by drop before the error propagates.
    pub async fn execute<B, R, E, F, Fut>(
        &self,
        request: Request<B>,
        send: F,
    ) -> Result<Response<R>, GateError<E>>
    where
        F: FnOnce(Request<B>) -> Fut,
        Fut: Future<Output = Result<Response<R>, E>>,
    {
        let uri = request.uri().clone();
        self.admit(&uri).await?;

        match send(request).await {
            Ok(response) => {
                self.record_response(&uri, response.headers());
                Ok(response)
            }
            Err(error) => Err(GateError::Transport(error)),
        }
    }

    /// Removes entries whose window has fully elapsed. The host application
    /// decides the cadence: call on demand or from its own periodic task.
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
