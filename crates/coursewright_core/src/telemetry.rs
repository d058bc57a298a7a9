//! Telemetry events describing external calls.

use crate::TokenUsage;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// What a telemetry event describes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TelemetryEventKind {
    /// An attempt that succeeded
    Success,
    /// An attempt that failed
    Failure,
    /// A token usage summary
    TokenUsage,
}

/// One entry in the append-only telemetry log.
///
/// # Examples
///
/// ```
/// use coursewright_core::{TelemetryEvent, TelemetryEventKind, TokenUsage};
///
/// let event = TelemetryEvent::new("lesson.reading_content", TelemetryEventKind::Success)
///     .with_attempt(2u32)
///     .with_model("gpt-4o-mini".to_string())
///     .with_token_usage(TokenUsage::new(100, 50));
/// assert_eq!(*event.attempt(), Some(2));
/// ```
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize, derive_setters::Setters)]
#[setters(prefix = "with_", strip_option)]
pub struct TelemetryEvent {
    /// Operation name, e.g. `lms.create_lesson`
    #[setters(skip)]
    operation: String,
    /// Correlates every attempt of one logical call
    request_id: String,
    /// Event type
    #[setters(skip)]
    kind: TelemetryEventKind,
    /// Model or endpoint
    model: Option<String>,
    /// 1-based attempt number
    attempt: Option<u32>,
    /// Wall time of the attempt
    duration_ms: Option<u64>,
    /// Request summary
    request_data: serde_json::Value,
    /// Response summary
    response_data: Option<serde_json::Value>,
    /// Error message for failures
    error: Option<String>,
    /// Token counts for successful model calls
    token_usage: Option<TokenUsage>,
    /// Event time
    timestamp: DateTime<Utc>,
}

impl TelemetryEvent {
    /// Create an event with a fresh request id.
    pub fn new(operation: impl Into<String>, kind: TelemetryEventKind) -> Self {
        Self {
            operation: operation.into(),
            request_id: uuid::Uuid::new_v4().to_string(),
            kind,
            model: None,
            attempt: None,
            duration_ms: None,
            request_data: serde_json::Value::Null,
            response_data: None,
            error: None,
            token_usage: None,
            timestamp: Utc::now(),
        }
    }
}
