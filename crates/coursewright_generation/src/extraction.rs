//! Structured-output parsing for model responses.
//!
//! Models asked for JSON often wrap it in a markdown fence or surround it
//! with prose. [`parse_structured`] tries, in order:
//!
//! 1. the whole response, trimmed, as strict JSON;
//! 2. the first fenced block (```` ```json ```` or a bare fence);
//! 3. the first balanced `{…}` or `[…]` span, whichever opens first.
//!
//! The first candidate that deserializes into `T` wins. If none does the
//! result is [`GenerationErrorKind::PartialContent`].

use crate::{GenerationError, GenerationErrorKind};
use serde::de::DeserializeOwned;

/// Parse a model response into `T`.
///
/// # Errors
///
/// Returns [`GenerationErrorKind::PartialContent`] if no candidate span
/// deserializes into `T`.
///
/// # Examples
///
/// ```
/// use coursewright_generation::parse_structured;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Draft {
///     title: String,
/// }
///
/// let response = "Sure! Here it is:\n```json\n{\"title\": \"Borrowing\"}\n```";
/// let draft: Draft = parse_structured(response).unwrap();
/// assert_eq!(draft.title, "Borrowing");
/// ```
pub fn parse_structured<T>(raw: &str) -> Result<T, GenerationError>
where
    T: DeserializeOwned,
{
    let trimmed = raw.trim();
    let mut last_error = None;

    let candidates = std::iter::once(Some(trimmed.to_string()))
        .chain(std::iter::once(extract_fenced(trimmed)))
        .chain(balanced_candidates(trimmed));

    for candidate in candidates.flatten() {
        match serde_json::from_str::<T>(&candidate) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = Some(e.to_string()),
        }
    }

    let preview: String = trimmed.chars().take(100).collect();
    tracing::warn!(
        response_length = raw.len(),
        preview = %preview,
        "No structured content found in model response"
    );
    Err(GenerationError::new(GenerationErrorKind::PartialContent(
        match last_error {
            Some(e) => format!("{} (response began: {:?})", e, preview),
            None => format!("empty response (length {})", raw.len()),
        },
    )))
}

/// Content of the first fenced code block.
///
/// A fence without a closing marker (a truncated response) yields the rest
/// of the text.
fn extract_fenced(response: &str) -> Option<String> {
    let start = response.find("```")?;
    let after = &response[start + 3..];
    // Skip the info string, e.g. `json`.
    let body_start = after.find('\n').map(|n| n + 1).unwrap_or(after.len());
    let body = &after[body_start..];
    let content = match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    };
    let content = content.trim();
    (!content.is_empty()).then(|| content.to_string())
}

/// Balanced spans for both delimiter kinds, earliest opener first.
fn balanced_candidates(response: &str) -> [Option<String>; 2] {
    let object = || extract_balanced(response, '{', '}');
    let array = || extract_balanced(response, '[', ']');
    match (response.find('{'), response.find('[')) {
        (Some(brace), Some(bracket)) if bracket < brace => [array(), object()],
        _ => [object(), array()],
    }
}

/// The span from the first `open` to its matching `close`.
///
/// Delimiters inside JSON strings are ignored.
fn extract_balanced(response: &str, open: char, close: char) -> Option<String> {
    let start = response.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in response[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(response[start..start + i + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}
