//! `rategate` is a client-side admission-control layer for outbound HTTP
//! requests, driven by the rate-limit metadata servers report in their
//! responses (`X-RateLimit-*`, `RateLimit-*`, `Stripe-RateLimit-*`,
//! `Retry-After`).
//!
//! The gate sits between a caller and whatever executes the request. Before a
//! request goes out it consults per-host quota state learned from earlier
//! responses and either proceeds, waits out a bounded delay, or rejects with a
//! typed error. After a successful response it stores the fresh quota
//! snapshot. The transport itself stays external: the gate wraps any
//! `(request) -> response` executor.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use http::{Request, Response};
//! use rategate::prelude::{AdmissionGate, GatePolicy};
//!
//! # async fn send_over_transport(_request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, std::io::Error> { unimplemented!() }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gate = AdmissionGate::new(
//!         GatePolicy::standard().max_wait(Duration::from_secs(5)),
//!     );
//!
//!     let request = Request::builder()
//!         .uri("https://api.example.com/v1/items")
//!         .body(Vec::new())?;
//!
//!     let response = gate
//!         .execute(request, |request| send_over_transport(request))
//!         .await?;
//!
//!     println!("status={}", response.status());
//!     Ok(())
//! }
//! ```
//!
//! # Recommended Defaults
//!
//! - Use `GatePolicy::standard()` and tune `max_wait` to what your callers can
//!   tolerate per attempt.
//! - Keep per-host granularity unless the provider documents per-endpoint
//!   buckets.
//! - Call `evict_expired` from a periodic task if you track many hosts.

mod blocking;
mod error;
mod gate;
pub mod headers;
mod info;
mod metrics;
mod policy;
mod state;
mod store;
mod util;

pub use crate::blocking::{BlockingAdmissionGate, CancelToken};
pub use crate::error::{GateError, RateLimitError, RateLimitErrorCode};
pub use crate::gate::{Admission, AdmissionGate};
pub use crate::headers::ParsedRateLimitHeaders;
pub use crate::info::RateLimitInfo;
pub use crate::metrics::GateMetricsSnapshot;
pub use crate::policy::{GatePolicy, KeyGranularity};
pub use crate::state::{RateLimitState, StateSnapshot};
pub use crate::store::RateLimitStore;

pub type RategateResult<T> = std::result::Result<T, RateLimitError>;

pub mod prelude {
    pub use crate::{
        Admission, AdmissionGate, BlockingAdmissionGate, CancelToken, GateError,
        GateMetricsSnapshot, GatePolicy, KeyGranularity, ParsedRateLimitHeaders, RateLimitError,
        RateLimitErrorCode, RateLimitInfo, RateLimitStore, RategateResult, StateSnapshot,
    };
}
