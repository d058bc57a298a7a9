//! Authenticated JSON poster shared by both dialects.

use coursewright_core::{LmsCredentials, RemoteId};
use chrono::{DateTime, Utc};
use coursewright_error::{LmsError, LmsErrorKind, parse_retry_after};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, instrument};

/// HTTP client bound to one LMS instance.
#[derive(Debug, Clone)]
pub(crate) struct LmsClient {
    client: Client,
    base_url: Url,
    username: String,
    password: String,
}

impl LmsClient {
    /// Validate the base URL and build a client.
    pub fn new(credentials: &LmsCredentials, timeout: Duration) -> Result<Self, LmsError> {
        let base_url = parse_base_url(&credentials.base_url)?;
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            LmsError::new(LmsErrorKind::InvalidBaseUrl {
                url: credentials.base_url.clone(),
                reason: e.to_string(),
            })
        })?;
        Ok(Self {
            client,
            base_url,
            username: credentials.username.clone(),
            password: credentials.password.clone(),
        })
    }

    /// POST `body` to `path` and return the created entity's id.
    #[instrument(skip(self, body), fields(base = %self.base_url))]
    pub async fn create(&self, path: &str, body: &Value) -> Result<RemoteId, LmsError> {
        let url = self.base_url.join(path).map_err(|e| {
            LmsError::new(LmsErrorKind::InvalidBaseUrl {
                url: format!("{}{}", self.base_url, path),
                reason: e.to_string(),
            })
        })?;

        let response = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "LMS request failed");
                if e.is_timeout() {
                    LmsError::new(LmsErrorKind::Timeout(e.to_string()))
                } else {
                    LmsError::new(LmsErrorKind::Network(e.to_string()))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after(response.headers(), Utc::now());
            let message = response.text().await.unwrap_or_default();
            error!(status = %status, body = %message, "LMS rejected request");
            return Err(LmsError::new(LmsErrorKind::Http {
                status: status.as_u16(),
                message,
                retry_after,
            }));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| LmsError::new(LmsErrorKind::InvalidResponse(e.to_string())))?;
        let id = extract_id(&json).ok_or_else(|| {
            LmsError::new(LmsErrorKind::InvalidResponse(format!(
                "no id in response to {}",
                path
            )))
        })?;
        debug!(path, id = %id, "Created LMS entity");
        Ok(id)
    }
}

/// Parse and normalize an LMS base URL. Only http(s) is accepted, and the
/// path always ends with `/` so relative joins append rather than replace.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, LmsError> {
    let invalid = |reason: &str| {
        LmsError::new(LmsErrorKind::InvalidBaseUrl {
            url: raw.to_string(),
            reason: reason.to_string(),
        })
    };
    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Find the created entity's id in a response body.
///
/// Accepts `{"id": 12}`, `{"id": "12"}` and the same nested under `data`.
pub(crate) fn extract_id(json: &Value) -> Option<RemoteId> {
    let id = json
        .get("id")
        .or_else(|| json.get("data").and_then(|d| d.get("id")))?;
    match id {
        Value::Number(n) => Some(RemoteId::new(n.to_string())),
        Value::String(s) if !s.is_empty() => Some(RemoteId::new(s.clone())),
        _ => None,
    }
}

/// Delay requested by a rejection's `retry-after` header, if any.
fn retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_retry_after(v, now))
}
