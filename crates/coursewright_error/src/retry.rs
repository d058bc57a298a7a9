//! Retry classification shared by every remote-call error.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// How the retry executor should treat a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryDisposition {
    /// Timeout, 5xx, 408 or a dropped connection. Back off and retry.
    Transient,
    /// HTTP 429. Wait for the provider hint when present, otherwise the
    /// configured rate-limit backoff.
    RateLimited {
        /// Delay requested by the provider's `retry-after` header
        retry_after: Option<Duration>,
    },
    /// HTTP 401 or 403. Never retried.
    Unauthorized,
    /// Any other failure that a retry cannot fix.
    Permanent,
}

impl RetryDisposition {
    /// Classify an HTTP status code.
    ///
    /// # Examples
    ///
    /// ```
    /// use coursewright_error::RetryDisposition;
    ///
    /// assert_eq!(RetryDisposition::from_status(503, None), RetryDisposition::Transient);
    /// assert_eq!(RetryDisposition::from_status(403, None), RetryDisposition::Unauthorized);
    /// assert_eq!(RetryDisposition::from_status(400, None), RetryDisposition::Permanent);
    /// ```
    pub fn from_status(status: u16, retry_after: Option<Duration>) -> Self {
        match status {
            401 | 403 => Self::Unauthorized,
            429 => Self::RateLimited { retry_after },
            408 | 500..=599 => Self::Transient,
            _ => Self::Permanent,
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient | Self::RateLimited { .. })
    }
}

/// Trait for errors that support retry logic.
///
/// # Examples
///
/// ```
/// use coursewright_error::{ModelError, ModelErrorKind, RetryableError};
///
/// let err = ModelError::new(ModelErrorKind::Http {
///     status: 503,
///     message: "Service unavailable".to_string(),
///     retry_after: None,
/// });
/// assert!(err.is_retryable());
/// ```
pub trait RetryableError {
    /// Classify this error for the retry executor.
    fn disposition(&self) -> RetryDisposition;

    /// Returns true if this error should trigger a retry.
    fn is_retryable(&self) -> bool {
        self.disposition().is_retryable()
    }

    /// Returns true for 401/403 style rejections.
    fn is_unauthorized(&self) -> bool {
        self.disposition() == RetryDisposition::Unauthorized
    }
}

/// Parse a `retry-after` header value: delta-seconds or an HTTP date.
///
/// A date in the past yields a zero delay.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use coursewright_error::parse_retry_after;
/// use std::time::Duration;
///
/// let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
/// assert_eq!(parse_retry_after("12", now), Some(Duration::from_secs(12)));
/// assert_eq!(
///     parse_retry_after("Wed, 01 May 2024 12:00:30 GMT", now),
///     Some(Duration::from_secs(30))
/// );
/// ```
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    if let Ok(secs) = value.parse::<f64>() {
        if secs.is_finite() && secs >= 0.0 {
            return Some(Duration::from_secs_f64(secs));
        }
    }
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|at| (at.with_timezone(&Utc) - now).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn retry_after_seconds() {
        assert_eq!(parse_retry_after(" 12 ", Utc::now()), Some(Duration::from_secs(12)));
        assert_eq!(
            parse_retry_after("1.5", Utc::now()),
            Some(Duration::from_millis(1_500))
        );
    }

    #[test]
    fn retry_after_in_the_past_is_zero() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let parsed = parse_retry_after("Wed, 01 May 2024 11:00:00 GMT", now);
        assert_eq!(parsed, Some(Duration::ZERO));
    }

    #[test]
    fn retry_after_garbage_is_none() {
        assert_eq!(parse_retry_after("soon", Utc::now()), None);
        assert_eq!(parse_retry_after("-3", Utc::now()), None);
    }

    #[test]
    fn status_codes_map_to_dispositions() {
        let hint = Some(Duration::from_secs(2));
        assert_eq!(
            RetryDisposition::from_status(429, hint),
            RetryDisposition::RateLimited { retry_after: hint }
        );
        assert_eq!(RetryDisposition::from_status(408, None), RetryDisposition::Transient);
        assert_eq!(RetryDisposition::from_status(401, None), RetryDisposition::Unauthorized);
        assert!(!RetryDisposition::from_status(404, None).is_retryable());
    }
}
