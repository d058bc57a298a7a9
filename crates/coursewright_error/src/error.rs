//! Top-level error wrapper types.

use crate::{BuilderError, ConfigError, JsonError, LmsError, ModelError, StorageError};

/// Every failure the command-line host can surface.
///
/// # Examples
///
/// ```
/// use coursewright_error::{CoursewrightError, CoursewrightErrorKind, JsonError};
///
/// let err: CoursewrightError = JsonError::new("course.json", "EOF while parsing").into();
/// assert!(matches!(err.kind(), CoursewrightErrorKind::Json(_)));
/// assert!(format!("{}", err).contains("course.json"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum CoursewrightErrorKind {
    /// JSON input or output error
    #[from(JsonError)]
    Json(JsonError),
    /// Configuration or logging setup error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Builder error
    #[from(BuilderError)]
    Builder(BuilderError),
    /// Storage error
    #[from(StorageError)]
    Storage(StorageError),
    /// Model provider error
    #[from(ModelError)]
    Model(ModelError),
    /// LMS adapter error
    #[from(LmsError)]
    Lms(LmsError),
}

/// Coursewright error with kind discrimination.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Coursewright Error: {}", _0)]
pub struct CoursewrightError(Box<CoursewrightErrorKind>);

impl CoursewrightError {
    /// Create a new error from a kind.
    pub fn new(kind: CoursewrightErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &CoursewrightErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to CoursewrightErrorKind
impl<T> From<T> for CoursewrightError
where
    T: Into<CoursewrightErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Coursewright operations.
pub type CoursewrightResult<T> = std::result::Result<T, CoursewrightError>;
