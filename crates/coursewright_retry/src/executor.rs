//! The retry wrapper applied to every external call.

use crate::{RequestLimiter, RetryPolicy};
use coursewright_core::{
    Completion, RemoteId, ResearchResult, TelemetryEvent, TelemetryEventKind, TokenUsage,
};
use coursewright_error::{RetryDisposition, RetryableError};
use coursewright_interface::TelemetrySink;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_retry2::strategy::jitter;
use tokio_retry2::{Retry, RetryError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Values that may carry token usage worth reporting to telemetry.
pub trait UsageReport {
    /// Usage reported by the provider for this call.
    fn reported_usage(&self) -> Option<TokenUsage> {
        None
    }
}

impl UsageReport for Completion {
    fn reported_usage(&self) -> Option<TokenUsage> {
        Some(*self.usage())
    }
}

impl UsageReport for ResearchResult {
    fn reported_usage(&self) -> Option<TokenUsage> {
        Some(*self.usage())
    }
}

impl UsageReport for RemoteId {}

impl UsageReport for () {}

/// Describes a call for logs and telemetry.
#[derive(Debug, Clone)]
pub struct CallContext {
    operation: String,
    model: Option<String>,
    request_data: serde_json::Value,
}

impl CallContext {
    /// Context for `operation`, e.g. `lesson.faq`.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            model: None,
            request_data: serde_json::Value::Null,
        }
    }

    /// Attach the model or endpoint name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Attach a request summary.
    pub fn with_request_data(mut self, data: serde_json::Value) -> Self {
        self.request_data = data;
        self
    }

    /// Operation name.
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

/// Why a wrapped call did not produce a value.
#[derive(Debug)]
pub enum CallError<E> {
    /// Cancellation was requested before or during the call.
    Aborted,
    /// The call failed; `error` is the last error seen.
    Failed {
        /// Last error
        error: E,
        /// Attempts made, including the first
        attempts: u32,
    },
}

impl<E> CallError<E> {
    /// True for [`CallError::Aborted`].
    pub fn is_aborted(&self) -> bool {
        matches!(self, CallError::Aborted)
    }
}

impl<E: fmt::Display> fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Aborted => write!(f, "Call aborted"),
            CallError::Failed { error, attempts } => {
                write!(f, "{} (after {} attempt(s))", error, attempts)
            }
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for CallError<E> {}

/// Runs external calls with backoff, pacing, cancellation and telemetry.
///
/// Cloning is cheap; clones share the limiter and the telemetry sink.
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    limiter: Option<RequestLimiter>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl RetryExecutor {
    /// Executor without a request limiter.
    pub fn new(policy: RetryPolicy, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            policy,
            limiter: None,
            telemetry,
        }
    }

    /// Gate every attempt on `limiter`.
    pub fn with_limiter(mut self, limiter: Option<RequestLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Active policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sink receiving per-attempt events.
    pub fn telemetry(&self) -> &Arc<dyn TelemetrySink> {
        &self.telemetry
    }

    fn strategy(&self) -> Vec<Duration> {
        let schedule = self.policy.backoff_schedule();
        if *self.policy.jitter() {
            schedule.into_iter().map(jitter).collect()
        } else {
            schedule
        }
    }

    /// Run `operation` until it succeeds, fails permanently, runs out of
    /// retries, or `cancel` fires.
    ///
    /// The whole retry loop, backoff sleeps included, is raced against
    /// `cancel`; on cancellation the in-flight attempt's future is dropped,
    /// which cancels the underlying request.
    ///
    /// # Examples
    ///
    /// ```
    /// use coursewright_error::ModelError;
    /// use coursewright_interface::NoopTelemetry;
    /// use coursewright_retry::{CallContext, RetryExecutor, RetryPolicy};
    /// use std::sync::Arc;
    /// use tokio_util::sync::CancellationToken;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let executor = RetryExecutor::new(RetryPolicy::default(), Arc::new(NoopTelemetry));
    /// let value = executor
    ///     .execute(&CallContext::new("demo"), &CancellationToken::new(), || async {
    ///         Ok::<_, ModelError>(())
    ///     })
    ///     .await;
    /// assert!(value.is_ok());
    /// # }
    /// ```
    pub async fn execute<F, Fut, T, E>(
        &self,
        context: &CallContext,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T, CallError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: UsageReport,
        E: RetryableError + fmt::Display,
    {
        if cancel.is_cancelled() {
            return Err(CallError::Aborted);
        }

        let request_id = uuid::Uuid::new_v4().to_string();
        let attempts = AtomicU32::new(0);

        let retry = Retry::spawn(self.strategy(), || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let request_id = request_id.as_str();
            let call = operation();
            async move {
                if let Some(limiter) = &self.limiter {
                    limiter.ready().await;
                }
                let started = Instant::now();
                let result = call.await;
                let elapsed = started.elapsed();
                match result {
                    Ok(value) => {
                        debug!(
                            operation = context.operation(),
                            attempt,
                            duration_ms = elapsed.as_millis() as u64,
                            "Call succeeded"
                        );
                        self.report(
                            context,
                            request_id,
                            attempt,
                            elapsed,
                            TelemetryEventKind::Success,
                            None,
                            value.reported_usage(),
                        );
                        Ok(value)
                    }
                    Err(e) => {
                        self.report(
                            context,
                            request_id,
                            attempt,
                            elapsed,
                            TelemetryEventKind::Failure,
                            Some(e.to_string()),
                            None,
                        );
                        Err(self.classify(context, attempt, e))
                    }
                }
            }
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(operation = context.operation(), "Call aborted");
                Err(CallError::Aborted)
            }
            result = retry => result.map_err(|error| CallError::Failed {
                error,
                attempts: attempts.load(Ordering::SeqCst),
            }),
        }
    }

    fn classify<E>(&self, context: &CallContext, attempt: u32, error: E) -> RetryError<E>
    where
        E: RetryableError + fmt::Display,
    {
        match error.disposition() {
            RetryDisposition::Transient => {
                warn!(
                    operation = context.operation(),
                    attempt,
                    error = %error,
                    "Transient error, will retry"
                );
                RetryError::Transient {
                    err: error,
                    retry_after: None,
                }
            }
            RetryDisposition::RateLimited { retry_after } => {
                let wait = retry_after.unwrap_or_else(|| self.policy.rate_limit_backoff());
                warn!(
                    operation = context.operation(),
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    "Rate limited, backing off"
                );
                RetryError::Transient {
                    err: error,
                    retry_after: Some(wait),
                }
            }
            RetryDisposition::Unauthorized | RetryDisposition::Permanent => {
                warn!(
                    operation = context.operation(),
                    attempt,
                    error = %error,
                    "Permanent error, failing immediately"
                );
                RetryError::Permanent(error)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &self,
        context: &CallContext,
        request_id: &str,
        attempt: u32,
        elapsed: Duration,
        kind: TelemetryEventKind,
        error: Option<String>,
        usage: Option<TokenUsage>,
    ) {
        let mut event = TelemetryEvent::new(context.operation.clone(), kind)
            .with_request_id(request_id.to_string())
            .with_attempt(attempt)
            .with_duration_ms(elapsed.as_millis() as u64)
            .with_request_data(context.request_data.clone());
        if let Some(model) = &context.model {
            event = event.with_model(model.clone());
        }
        if let Some(error) = error {
            event = event.with_error(error);
        }
        if let Some(usage) = usage {
            event = event.with_token_usage(usage);
        }
        self.telemetry.record(event);
    }
}
