//! Retry policy configuration.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often and how patiently to retry.
///
/// Loaded from the `[retry]` section of the configuration file.
///
/// ```toml
/// [retry]
/// max_retries = 3
/// base_delay_ms = 1000
/// max_delay_ms = 60000
/// rate_limit_backoff_ms = 30000
/// jitter = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct RetryPolicy {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    max_retries: u32,
    /// Delay before the first retry
    #[serde(default = "default_base_delay_ms")]
    base_delay_ms: u64,
    /// Upper bound for any backoff delay
    #[serde(default = "default_max_delay_ms")]
    max_delay_ms: u64,
    /// Delay after a 429 that carried no `retry-after` hint
    #[serde(default = "default_rate_limit_backoff_ms")]
    rate_limit_backoff_ms: u64,
    /// Randomize delays. Delays are then no longer strictly increasing.
    #[serde(default)]
    jitter: bool,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_rate_limit_backoff_ms() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            rate_limit_backoff_ms: default_rate_limit_backoff_ms(),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay used after a 429 without a hint.
    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_millis(self.rate_limit_backoff_ms)
    }

    /// Delays before each retry, without jitter.
    ///
    /// # Examples
    ///
    /// ```
    /// use coursewright_retry::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::default().with_base_delay_ms(500).with_max_delay_ms(1_500);
    /// assert_eq!(
    ///     policy.backoff_schedule(),
    ///     vec![Duration::from_millis(500), Duration::from_millis(1_000), Duration::from_millis(1_500)],
    /// );
    /// ```
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        (0..self.max_retries)
            .map(|retry| {
                let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
                let delay = self.base_delay_ms.saturating_mul(factor);
                Duration::from_millis(delay.min(self.max_delay_ms))
            })
            .collect()
    }
}
