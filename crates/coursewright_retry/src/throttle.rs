//! Fixed-interval spacing between successive calls.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Ensures at least `interval` passes between the starts of successive calls.
///
/// The first call never waits.
#[derive(Debug)]
pub struct CallThrottle {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl CallThrottle {
    /// Throttle with the given spacing. A zero interval never waits.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// Configured spacing.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next slot and claim it.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            tokio::time::sleep_until(previous + self.interval).await;
        }
        *last = Some(Instant::now());
    }
}
