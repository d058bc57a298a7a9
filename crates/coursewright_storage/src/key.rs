//! Key validation shared by the stores.

use coursewright_error::{StorageError, StorageErrorKind};

/// Reject keys that could escape the store's directory or collide with its
/// own bookkeeping files.
///
/// Keys are limited to ASCII letters, digits, `-` and `_`, which is what
/// [`coursewright_core::CheckpointKey::for_course`] produces.
///
/// # Examples
///
/// ```
/// use coursewright_storage::validate_key;
///
/// assert!(validate_key("course-rust_101").is_ok());
/// assert!(validate_key("../secrets").is_err());
/// assert!(validate_key("").is_err());
/// ```
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.len() > 200 {
        return Err(StorageError::new(StorageErrorKind::InvalidKey(
            key.to_string(),
        )));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(StorageError::new(StorageErrorKind::InvalidKey(
            key.to_string(),
        )));
    }
    Ok(())
}

/// File stem for a course record.
pub(crate) fn record_stem(course_id: &str) -> String {
    let safe: String = course_id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("record-{}", safe)
}
