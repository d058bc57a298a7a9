//! Requests-per-minute limiter backed by governor.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

type DirectRateLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Caps how many attempts start per minute.
///
/// Uses the GCRA algorithm, so requests are spread evenly over the minute
/// rather than bursting at its start.
#[derive(Clone)]
pub struct RequestLimiter {
    rpm: u32,
    limiter: Arc<DirectRateLimiter>,
}

impl std::fmt::Debug for RequestLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLimiter").field("rpm", &self.rpm).finish()
    }
}

impl RequestLimiter {
    /// Limiter allowing `rpm` requests per minute. `None` for zero.
    pub fn per_minute(rpm: u32) -> Option<Self> {
        NonZeroU32::new(rpm).map(|n| Self {
            rpm,
            limiter: Arc::new(GovernorRateLimiter::direct(Quota::per_minute(n))),
        })
    }

    /// Configured requests per minute.
    pub fn rpm(&self) -> u32 {
        self.rpm
    }

    /// Wait until another request may start.
    pub async fn ready(&self) {
        self.limiter.until_ready().await;
    }

    /// Take a slot without waiting. Returns false when limited.
    pub fn try_ready(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rpm_disables_limiter() {
        assert!(RequestLimiter::per_minute(0).is_none());
    }

    #[test]
    fn one_rpm_blocks_second_request() {
        let limiter = RequestLimiter::per_minute(1).unwrap();
        assert!(limiter.try_ready());
        assert!(!limiter.try_ready());
    }
}
