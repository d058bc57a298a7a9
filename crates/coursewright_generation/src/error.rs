//! Errors surfaced by a generation run.

use coursewright_core::GenerationCheckpoint;
use coursewright_error::{LmsError, LmsErrorKind, ModelError, RetryDisposition, RetryableError, StorageError};
use coursewright_retry::CallError;

/// What went wrong in a generation run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum GenerationErrorKind {
    /// Malformed input; no remote call was made
    #[display("Invalid course input: {}", _0)]
    Validation(String),
    /// A provider or the LMS rejected the credentials
    #[display("Authentication failed: {}", _0)]
    Authentication(String),
    /// Still rate limited after every retry
    #[display("Rate limit exhausted: {}", _0)]
    RateLimit(String),
    /// Timeouts, 5xx or connection failures outlasted the retries
    #[display("Network failure: {}", _0)]
    TransientNetwork(String),
    /// The caller aborted the run
    #[display("Generation aborted")]
    Aborted,
    /// Model output could not be parsed into the expected shape
    #[display("Malformed model output: {}", _0)]
    PartialContent(String),
    /// The LMS refused a create call
    #[display("LMS rejected request: {}", _0)]
    RemoteAdapter(String),
    /// A provider refused the request for a reason a retry cannot fix
    #[display("Provider rejected request: {}", _0)]
    Provider(String),
    /// Adapter selection or provider setup failed
    #[display("Configuration error: {}", _0)]
    Configuration(String),
    /// The checkpoint store failed
    #[display("Checkpoint storage failed: {}", _0)]
    Storage(String),
    /// Another run holds the lease for this checkpoint key
    #[display("A generation is already running for '{}'", _0)]
    RunInProgress(String),
    /// A stored checkpoint was written for a different course structure
    #[display("Checkpoint '{}' does not match this course: {}", key, reason)]
    CheckpointMismatch {
        /// Checkpoint key
        key: String,
        /// What differs
        reason: String,
    },
}

/// Generation error with source location and the last checkpoint.
///
/// # Examples
///
/// ```
/// use coursewright_generation::{GenerationError, GenerationErrorKind};
///
/// let err = GenerationError::new(GenerationErrorKind::Aborted);
/// assert!(err.is_aborted());
/// assert_eq!(err.user_message(), "Generation cancelled.");
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Generation Error: {} at line {} in {}", kind, line, file)]
pub struct GenerationError {
    /// The kind of error that occurred
    pub kind: GenerationErrorKind,
    /// Checkpoint state when the run stopped, for resuming
    pub checkpoint: Option<Box<GenerationCheckpoint>>,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl GenerationError {
    /// Create a new GenerationError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: GenerationErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            checkpoint: None,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Attach the checkpoint the caller can resume from.
    pub fn with_checkpoint(mut self, checkpoint: GenerationCheckpoint) -> Self {
        self.checkpoint = Some(Box::new(checkpoint));
        self
    }

    /// True when the run stopped because the caller aborted it.
    pub fn is_aborted(&self) -> bool {
        self.kind == GenerationErrorKind::Aborted
    }

    /// True when the error ends the run wherever it occurs.
    ///
    /// Exhausted rate limits and network failures are fatal so the step is
    /// redone by the next run instead of being skipped for good. Malformed
    /// output and outright rejections are recovered at the narrowest scope
    /// unless they hit a step the run cannot continue without.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self.kind,
            GenerationErrorKind::PartialContent(_)
                | GenerationErrorKind::RemoteAdapter(_)
                | GenerationErrorKind::Provider(_)
        )
    }

    /// One line suitable for a status bar.
    pub fn user_message(&self) -> String {
        match &self.kind {
            GenerationErrorKind::Aborted => "Generation cancelled.".to_string(),
            GenerationErrorKind::Authentication(_) => {
                "Authentication failed. Check your API key and LMS credentials.".to_string()
            }
            GenerationErrorKind::RunInProgress(_) => {
                "This course is already being generated.".to_string()
            }
            GenerationErrorKind::RateLimit(_) | GenerationErrorKind::TransientNetwork(_) => {
                format!("{}. Progress was saved; run again to resume.", self.kind)
            }
            kind => kind.to_string(),
        }
    }

    /// Map a failed model call.
    #[track_caller]
    pub fn from_model_call(error: CallError<ModelError>) -> Self {
        match error {
            CallError::Aborted => Self::new(GenerationErrorKind::Aborted),
            CallError::Failed { error, attempts } => {
                let message = format!("{} (after {} attempt(s))", error.kind, attempts);
                Self::new(match error.disposition() {
                    RetryDisposition::Unauthorized => GenerationErrorKind::Authentication(message),
                    RetryDisposition::RateLimited { .. } => GenerationErrorKind::RateLimit(message),
                    RetryDisposition::Transient => GenerationErrorKind::TransientNetwork(message),
                    RetryDisposition::Permanent => GenerationErrorKind::Provider(message),
                })
            }
        }
    }

    /// Map a failed LMS call.
    #[track_caller]
    pub fn from_lms_call(error: CallError<LmsError>) -> Self {
        match error {
            CallError::Aborted => Self::new(GenerationErrorKind::Aborted),
            CallError::Failed { error, attempts } => {
                let message = format!("{} (after {} attempt(s))", error.kind, attempts);
                Self::new(match error.disposition() {
                    RetryDisposition::Unauthorized => GenerationErrorKind::Authentication(message),
                    RetryDisposition::RateLimited { .. } => GenerationErrorKind::RateLimit(message),
                    RetryDisposition::Transient => GenerationErrorKind::TransientNetwork(message),
                    RetryDisposition::Permanent => GenerationErrorKind::RemoteAdapter(message),
                })
            }
        }
    }
}

impl From<StorageError> for GenerationError {
    #[track_caller]
    fn from(error: StorageError) -> Self {
        Self::new(GenerationErrorKind::Storage(error.kind.to_string()))
    }
}

impl From<LmsError> for GenerationError {
    #[track_caller]
    fn from(error: LmsError) -> Self {
        match error.kind {
            LmsErrorKind::UnknownVariant(_) | LmsErrorKind::InvalidBaseUrl { .. } => {
                Self::new(GenerationErrorKind::Configuration(error.kind.to_string()))
            }
            _ => Self::from_lms_call(CallError::Failed { error, attempts: 1 }),
        }
    }
}

impl From<ModelError> for GenerationError {
    #[track_caller]
    fn from(error: ModelError) -> Self {
        if error.is_unauthorized() {
            Self::new(GenerationErrorKind::Authentication(error.kind.to_string()))
        } else {
            Self::new(GenerationErrorKind::Configuration(error.kind.to_string()))
        }
    }
}
