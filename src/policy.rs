use std::time::Duration;

/// How state keys distinguish rate-limit domains.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyGranularity {
    /// One bucket per host (`hostname`, or `hostname:port` for non-default
    /// ports).
    #[default]
    Host,
    /// One bucket per host and endpoint path.
    HostAndEndpoint,
}

/// Construction-time configuration of an admission gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GatePolicy {
    max_wait: Duration,
    granularity: KeyGranularity,
    fallback_limit: u64,
    fallback_window: Duration,
    enabled: bool,
    max_tracked_keys: usize,
}

impl GatePolicy {
    pub const fn standard() -> Self {
        Self {
            max_wait: Duration::from_secs(30),
            granularity: KeyGranularity::Host,
            fallback_limit: 100,
            fallback_window: Duration::from_secs(60),
            enabled: true,
            max_tracked_keys: 1024,
        }
    }

    /// Wait threshold: required waits beyond this are rejected instead of
    /// slept through.
    pub const fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub const fn granularity(mut self, granularity: KeyGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Assumed limit when a response carries rate-limit headers but no limit
    /// field. Generously permissive so transient gaps do not re-trigger
    /// throttling.
    pub const fn fallback_limit(mut self, fallback_limit: u64) -> Self {
        self.fallback_limit = fallback_limit;
        self
    }

    /// Assumed window length when a response carries no reset time.
    pub const fn fallback_window(mut self, fallback_window: Duration) -> Self {
        self.fallback_window = fallback_window;
        self
    }

    /// A disabled gate admits every request and records nothing.
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Cap on distinct keys kept in the store; oldest entries are trimmed
    /// beyond it.
    pub const fn max_tracked_keys(mut self, max_tracked_keys: usize) -> Self {
        self.max_tracked_keys = max_tracked_keys;
        self
    }

    pub(crate) fn normalize(self) -> Self {
        Self {
            fallback_limit: self.fallback_limit.max(1),
            max_tracked_keys: self.max_tracked_keys.max(1),
            ..self
        }
    }

    pub const fn configured_max_wait(&self) -> Duration {
        self.max_wait
    }

    pub const fn configured_granularity(&self) -> KeyGranularity {
        self.granularity
    }

    pub const fn configured_fallback_limit(&self) -> u64 {
        self.fallback_limit
    }

    pub const fn configured_fallback_window(&self) -> Duration {
        self.fallback_window
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub const fn configured_max_tracked_keys(&self) -> usize {
        self.max_tracked_keys
    }
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self::standard()
    }
}
