//! Shared request plumbing: status mapping and transport errors.

use chrono::Utc;
use coursewright_error::{ModelError, ModelErrorKind, parse_retry_after};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::error;

/// Build a client with the configured timeout.
pub(crate) fn build_client(timeout_secs: u64) -> Result<Client, ModelError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ModelError::new(ModelErrorKind::InvalidRequest(e.to_string())))
}

/// Map a transport failure to a model error.
#[track_caller]
pub(crate) fn transport_error(e: reqwest::Error) -> ModelError {
    error!(error = ?e, "HTTP request failed");
    if e.is_timeout() {
        ModelError::new(ModelErrorKind::Timeout(e.to_string()))
    } else {
        ModelError::new(ModelErrorKind::Network(e.to_string()))
    }
}

/// Return the response unchanged on success, or its status as a model error.
pub(crate) async fn check_status(response: Response) -> Result<Response, ModelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_retry_after(v, Utc::now()));
    let body = response.text().await.unwrap_or_default();
    error!(status = %status, body = %body, "Provider returned error");
    Err(ModelError::new(ModelErrorKind::Http {
        status: status.as_u16(),
        message: if body.is_empty() {
            status.canonical_reason().unwrap_or("unknown").to_string()
        } else {
            body
        },
        retry_after,
    }))
}

/// Join a base URL and a path without doubling slashes.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_cleanly() {
        assert_eq!(
            endpoint("https://api.example.com/v1/", "/chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
    }
}
