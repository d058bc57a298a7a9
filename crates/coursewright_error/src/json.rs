//! JSON error types.

/// A JSON document that could not be read or written.
///
/// `context` names the document, such as the input file or the value being
/// printed, so the message stands on its own.
///
/// # Examples
///
/// ```
/// use coursewright_error::JsonError;
///
/// let err = JsonError::new("course.json", "expected `,` at line 3 column 9");
/// assert_eq!(err.context, "course.json");
/// assert!(err.to_string().starts_with("JSON Error: course.json: expected"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("JSON Error: {}: {} at line {} in {}", context, message, line, file)]
pub struct JsonError {
    /// Document the failure belongs to
    pub context: String,
    /// Decoder or encoder message
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl JsonError {
    /// Create a new JsonError at the current location.
    #[track_caller]
    pub fn new(context: impl Into<String>, message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            context: context.into(),
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}
