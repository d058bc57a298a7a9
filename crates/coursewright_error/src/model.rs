//! Errors raised by completion, research and retrieval providers.

use crate::{RetryDisposition, RetryableError};
use std::time::Duration;

/// Model provider error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ModelErrorKind {
    /// No API key was supplied for a provider that needs one
    #[display("Missing API key for {}", _0)]
    MissingApiKey(String),
    /// Provider answered with a non-success status
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
    /// Response body did not have the expected shape
    #[display("Invalid response: {}", _0)]
    InvalidResponse(String),
    /// Provider returned no text
    #[display("Provider returned an empty completion")]
    EmptyCompletion,
    /// The request could not be built
    #[display("Invalid request: {}", _0)]
    InvalidRequest(String),
}

impl ModelErrorKind {
    /// Retry classification for this condition.
    pub fn disposition(&self) -> RetryDisposition {
        match self {
            ModelErrorKind::Http {
                status,
                retry_after,
                ..
            } => RetryDisposition::from_status(*status, *retry_after),
            ModelErrorKind::Network(_) | ModelErrorKind::Timeout(_) => RetryDisposition::Transient,
            ModelErrorKind::MissingApiKey(_) => RetryDisposition::Unauthorized,
            _ => RetryDisposition::Permanent,
        }
    }
}

/// Model error with source location tracking.
///
/// # Examples
///
/// ```
/// use coursewright_error::{ModelError, ModelErrorKind};
///
/// let err = ModelError::new(ModelErrorKind::MissingApiKey("research".into()));
/// assert!(format!("{}", err).contains("Missing API key"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Model Error: {} at line {} in {}", kind, line, file)]
pub struct ModelError {
    /// The kind of error that occurred
    pub kind: ModelErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ModelError {
    /// Create a new ModelError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ModelErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl RetryableError for ModelError {
    fn disposition(&self) -> RetryDisposition {
        self.kind.disposition()
    }
}
