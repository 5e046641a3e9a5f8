use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RateLimitErrorCode {
    Exceeded,
    WaitCancelled,
}

impl RateLimitErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exceeded => "rate_limit_exceeded",
            Self::WaitCancelled => "rate_limit_wait_cancelled",
        }
    }
}

/// Admission failure raised by the gate before the request is sent.
///
/// Both variants are plain data so they survive serialization boundaries with
/// every field intact; durations and timestamps are carried as integer
/// milliseconds / epoch seconds.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[non_exhaustive]
pub enum RateLimitError {
    /// The required wait exceeds the configured threshold. Terminal for this
    /// attempt; retrying is the caller's decision.
    #[error(
        "rate limit exceeded for host {host}: required wait {wait_millis}ms exceeds threshold {threshold_millis}ms"
    )]
    Exceeded {
        host: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
        wait_millis: u64,
        threshold_millis: u64,
        retry_at_epoch_seconds: u64,
    },
    /// The in-progress wait was cancelled externally before it elapsed.
    #[error("rate limit wait for host {host} cancelled after {waited_millis}ms")]
    WaitCancelled { host: String, waited_millis: u64 },
}

impl RateLimitError {
    pub const fn code(&self) -> RateLimitErrorCode {
        match self {
            Self::Exceeded { .. } => RateLimitErrorCode::Exceeded,
            Self::WaitCancelled { .. } => RateLimitErrorCode::WaitCancelled,
        }
    }

    pub fn host(&self) -> &str {
        match self {
            Self::Exceeded { host, .. } | Self::WaitCancelled { host, .. } => host,
        }
    }
}

/// Failure surface of a gated request execution.
///
/// Transport failures from the wrapped executor pass through unchanged; the
/// gate neither wraps their message nor updates rate-limit state on that path.
#[derive(Debug, Error)]
pub enum GateError<E> {
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
    #[error(transparent)]
    Transport(E),
}

impl<E> GateError<E> {
    pub const fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimit(_))
    }

    pub fn into_transport(self) -> Option<E> {
        match self {
            Self::Transport(error) => Some(error),
            Self::RateLimit(_) => None,
        }
    }
}
