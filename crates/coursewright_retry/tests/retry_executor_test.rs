//! Tests for the retry executor: attempt bounds, backoff shape, rate-limit
//! hints, permanent failures, cancellation and telemetry.

use coursewright_core::{Completion, TelemetryEvent, TelemetryEventKind, TokenUsage};
use coursewright_error::{ModelError, ModelErrorKind};
use coursewright_interface::TelemetrySink;
use coursewright_retry::{CallContext, CallError, RetryExecutor, RetryPolicy};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl TelemetrySink for RecordingSink {
    fn record(&self, event: TelemetryEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn http_error(status: u16, retry_after: Option<Duration>) -> ModelError {
    ModelError::new(ModelErrorKind::Http {
        status,
        message: format!("status {}", status),
        retry_after,
    })
}

fn executor(sink: Arc<RecordingSink>) -> RetryExecutor {
    RetryExecutor::new(RetryPolicy::default(), sink)
}

/// Records when each attempt started, relative to `origin`.
struct AttemptLog {
    origin: Instant,
    starts: Mutex<Vec<Duration>>,
}

impl AttemptLog {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            starts: Mutex::new(Vec::new()),
        }
    }

    fn mark(&self) -> usize {
        let mut starts = self.starts.lock().unwrap();
        starts.push(self.origin.elapsed());
        starts.len()
    }

    fn gaps(&self) -> Vec<Duration> {
        let starts = self.starts.lock().unwrap();
        starts.windows(2).map(|w| w[1] - w[0]).collect()
    }

    fn count(&self) -> usize {
        self.starts.lock().unwrap().len()
    }
}

#[tokio::test(start_paused = true)]
async fn transient_failures_exhaust_after_ceiling_plus_one_attempts() {
    let sink = Arc::new(RecordingSink::default());
    let log = AttemptLog::new();

    let result: Result<Completion, _> = executor(sink.clone())
        .execute(&CallContext::new("test.transient"), &CancellationToken::new(), || {
            let n = log.mark();
            async move { Err(http_error(500 + n as u16, None)) }
        })
        .await;

    assert_eq!(log.count(), 4);
    match result {
        Err(CallError::Failed { error, attempts }) => {
            assert_eq!(attempts, 4);
            // The last error is surfaced, not the first.
            assert!(matches!(error.kind, ModelErrorKind::Http { status: 504, .. }));
        }
        other => panic!("expected exhausted retries, got {:?}", other.map(|_| ())),
    }

    let gaps = log.gaps();
    assert_eq!(gaps.len(), 3);
    assert!(gaps.windows(2).all(|w| w[1] > w[0]), "gaps not increasing: {:?}", gaps);
    assert!(gaps[0] >= Duration::from_secs(1));

    let failures = sink
        .events()
        .iter()
        .filter(|e| *e.kind() == TelemetryEventKind::Failure)
        .count();
    assert_eq!(failures, 4);
}

#[tokio::test(start_paused = true)]
async fn succeeds_on_fourth_attempt_with_three_failures_recorded() {
    let sink = Arc::new(RecordingSink::default());
    let log = AttemptLog::new();

    let result = executor(sink.clone())
        .execute(
            &CallContext::new("lesson.reading_content").with_model("gpt-test"),
            &CancellationToken::new(),
            || {
                let n = log.mark();
                async move {
                    if n < 4 {
                        Err(ModelError::new(ModelErrorKind::Timeout("slow".into())))
                    } else {
                        Ok(Completion::new("<p>content</p>", Some(TokenUsage::new(10, 20))))
                    }
                }
            },
        )
        .await
        .expect("fourth attempt succeeds");

    assert_eq!(result.text(), "<p>content</p>");

    let events = sink.events();
    let failures: Vec<_> = events
        .iter()
        .filter(|e| *e.kind() == TelemetryEventKind::Failure)
        .collect();
    let successes: Vec<_> = events
        .iter()
        .filter(|e| *e.kind() == TelemetryEventKind::Success)
        .collect();
    assert_eq!(failures.len(), 3);
    assert_eq!(successes.len(), 1);
    assert_eq!(*successes[0].attempt(), Some(4));
    assert_eq!(*successes[0].token_usage(), Some(TokenUsage::new(10, 20)));
    assert_eq!(successes[0].model().as_deref(), Some("gpt-test"));

    // Every attempt of one logical call shares a request id.
    let id = successes[0].request_id();
    assert!(events.iter().all(|e| e.request_id() == id));
}

#[tokio::test(start_paused = true)]
async fn unauthorized_is_not_retried() {
    let sink = Arc::new(RecordingSink::default());
    let log = AttemptLog::new();

    let result: Result<Completion, _> = executor(sink)
        .execute(&CallContext::new("test.auth"), &CancellationToken::new(), || {
            log.mark();
            async { Err(http_error(401, None)) }
        })
        .await;

    assert_eq!(log.count(), 1);
    assert!(matches!(result, Err(CallError::Failed { attempts: 1, .. })));
}

#[tokio::test(start_paused = true)]
async fn bad_request_is_not_retried() {
    let sink = Arc::new(RecordingSink::default());
    let log = AttemptLog::new();

    let result: Result<Completion, _> = executor(sink)
        .execute(&CallContext::new("test.bad_request"), &CancellationToken::new(), || {
            log.mark();
            async { Err(http_error(422, None)) }
        })
        .await;

    assert_eq!(log.count(), 1);
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn rate_limit_honors_retry_after_hint() {
    let sink = Arc::new(RecordingSink::default());
    let log = AttemptLog::new();

    let result = executor(sink)
        .execute(&CallContext::new("test.rate_limit"), &CancellationToken::new(), || {
            let n = log.mark();
            async move {
                if n == 1 {
                    Err(http_error(429, Some(Duration::from_secs(7))))
                } else {
                    Ok(Completion::new("ok", None))
                }
            }
        })
        .await;

    assert!(result.is_ok());
    let gaps = log.gaps();
    assert_eq!(gaps.len(), 1);
    assert!(gaps[0] >= Duration::from_secs(7), "gap was {:?}", gaps[0]);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_without_hint_uses_long_backoff() {
    let sink = Arc::new(RecordingSink::default());
    let log = AttemptLog::new();
    let policy = RetryPolicy::default().with_rate_limit_backoff_ms(30_000);

    let result = RetryExecutor::new(policy, sink)
        .execute(&CallContext::new("test.rate_limit"), &CancellationToken::new(), || {
            let n = log.mark();
            async move {
                if n == 1 {
                    Err(http_error(429, None))
                } else {
                    Ok(Completion::new("ok", None))
                }
            }
        })
        .await;

    assert!(result.is_ok());
    assert!(log.gaps()[0] >= Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_backoff_returns_aborted() {
    let sink = Arc::new(RecordingSink::default());
    let log = AttemptLog::new();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result: Result<Completion, _> = executor(sink)
        .execute(&CallContext::new("test.abort"), &cancel, || {
            log.mark();
            async { Err(http_error(503, None)) }
        })
        .await;

    assert!(matches!(result, Err(CallError::Aborted)));
    assert_eq!(log.count(), 1);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn cancellation_drops_in_flight_call() {
    let sink = Arc::new(RecordingSink::default());
    let cancel = CancellationToken::new();
    let finished = Arc::new(Mutex::new(false));

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result: Result<Completion, _> = executor(sink)
        .execute(&CallContext::new("test.in_flight"), &cancel, || {
            let finished = finished.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                *finished.lock().unwrap() = true;
                Ok::<_, ModelError>(Completion::new("late", None))
            }
        })
        .await;

    assert!(result.unwrap_err().is_aborted());
    assert!(!*finished.lock().unwrap());
}

#[tokio::test]
async fn already_cancelled_makes_no_attempt() {
    let sink = Arc::new(RecordingSink::default());
    let log = AttemptLog::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result: Result<Completion, _> = executor(sink.clone())
        .execute(&CallContext::new("test.cancelled"), &cancel, || {
            log.mark();
            async { Ok::<_, ModelError>(Completion::new("never", None)) }
        })
        .await;

    assert!(matches!(result, Err(CallError::Aborted)));
    assert_eq!(log.count(), 0);
    assert!(sink.events().is_empty());
}
