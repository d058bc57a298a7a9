//! Configuration error types.

/// Kinds of configuration failures.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum ConfigErrorKind {
    /// A source file or variable could not be read or merged
    #[display("Failed to build configuration: {}", _0)]
    Load(String),
    /// The merged sources do not fit the settings structure
    #[display("Failed to parse configuration: {}", _0)]
    Deserialize(String),
    /// Log filter directives did not parse
    #[display("Invalid log filter: {}", _0)]
    LogFilter(String),
    /// A global logger was already installed
    #[display("Logging already initialized: {}", _0)]
    Logging(String),
}

/// Configuration error with source location.
///
/// # Examples
///
/// ```
/// use coursewright_error::{ConfigError, ConfigErrorKind};
///
/// let err = ConfigError::new(ConfigErrorKind::LogFilter("debug,=x".to_string()));
/// assert!(err.to_string().contains("Invalid log filter"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Configuration Error: {} at line {} in {}", kind, line, file)]
pub struct ConfigError {
    /// The kind of error that occurred
    pub kind: ConfigErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ConfigError {
    /// Create a new ConfigError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ConfigErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
