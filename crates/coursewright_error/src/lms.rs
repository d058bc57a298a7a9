//! Errors raised by LMS adapters.

use crate::{RetryDisposition, RetryableError};
use std::time::Duration;

/// LMS adapter error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum LmsErrorKind {
    /// `lms_type` did not name a known adapter variant
    #[display("Unknown LMS type '{}' (expected 'topic_based' or 'section_based')", _0)]
    UnknownVariant(String),
    /// Base URL missing, malformed or not http(s)
    #[display("Invalid LMS base URL '{}': {}", url, reason)]
    InvalidBaseUrl {
        /// Offending URL
        url: String,
        /// Why it was rejected
        reason: String,
    },
    /// LMS answered with a non-success status
    #[display("HTTP {} error: {}", status, message)]
    Http {
        /// HTTP status code
        status: u16,
        /// Error body or reason phrase
        message: String,
        /// Parsed `retry-after` header, if any
        retry_after: Option<Duration>,
    },
    /// Connection could not be established or was dropped
    #[display("Network error: {}", _0)]
    Network(String),
    /// Request exceeded its deadline
    #[display("Request timed out: {}", _0)]
    Timeout(String),
    /// Response did not carry the created entity's id
    #[display("Invalid response: {}", _0)]
    InvalidResponse(String),
}

impl LmsErrorKind {
    /// Retry classification for this condition.
    pub fn disposition(&self) -> RetryDisposition {
        match self {
            LmsErrorKind::Http {
                status,
                retry_after,
                ..
            } => RetryDisposition::from_status(*status, *retry_after),
            LmsErrorKind::Network(_) | LmsErrorKind::Timeout(_) => RetryDisposition::Transient,
            _ => RetryDisposition::Permanent,
        }
    }
}

/// LMS error with source location tracking.
///
/// # Examples
///
/// ```
/// use coursewright_error::{LmsError, LmsErrorKind, RetryableError};
///
/// let err = LmsError::new(LmsErrorKind::UnknownVariant("moodle".into()));
/// assert!(format!("{}", err).contains("moodle"));
/// assert!(!err.is_retryable());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("LMS Error: {} at line {} in {}", kind, line, file)]
pub struct LmsError {
    /// The kind of error that occurred
    pub kind: LmsErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl LmsError {
    /// Create a new LmsError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: LmsErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl RetryableError for LmsError {
    fn disposition(&self) -> RetryDisposition {
        self.kind.disposition()
    }
}
