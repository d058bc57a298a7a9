//! Retry, backoff and pacing for every external call.
//!
//! [`RetryExecutor`] is the single wrapper applied to model, research,
//! retrieval and LMS calls:
//!
//! - transient failures back off exponentially, doubling from the base delay
//!   up to a cap, for at most `max_retries` retries;
//! - HTTP 429 waits for the provider's `retry-after` hint, or a fixed longer
//!   backoff when there is none;
//! - 401/403 and other permanent failures return immediately;
//! - cancellation drops the in-flight attempt and returns
//!   [`CallError::Aborted`].
//!
//! Every attempt is reported to a [`coursewright_interface::TelemetrySink`].
//! [`RequestLimiter`] optionally caps requests per minute and
//! [`CallThrottle`] spaces out successive calls by a fixed interval.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod executor;
mod limiter;
mod policy;
mod throttle;

pub use executor::{CallContext, CallError, RetryExecutor, UsageReport};
pub use limiter::RequestLimiter;
pub use policy::RetryPolicy;
pub use throttle::CallThrottle;
