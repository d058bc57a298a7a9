//! Telemetry sinks.

use coursewright_core::{TelemetryEvent, TelemetryEventKind};
use coursewright_error::{StorageError, StorageErrorKind};
use coursewright_interface::TelemetrySink;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Emits every event as a `tracing` record on the `coursewright::telemetry`
/// target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn record(&self, event: TelemetryEvent) {
        let tokens = event.token_usage().map(|u| *u.total_tokens()).unwrap_or(0);
        match event.kind() {
            TelemetryEventKind::Failure => warn!(
                target: "coursewright::telemetry",
                operation = %event.operation(),
                request_id = %event.request_id(),
                attempt = event.attempt().unwrap_or(0),
                duration_ms = event.duration_ms().unwrap_or(0),
                error = event.error().as_deref().unwrap_or(""),
                "Attempt failed"
            ),
            kind => info!(
                target: "coursewright::telemetry",
                operation = %event.operation(),
                request_id = %event.request_id(),
                kind = %kind,
                model = event.model().as_deref().unwrap_or(""),
                attempt = event.attempt().unwrap_or(0),
                duration_ms = event.duration_ms().unwrap_or(0),
                total_tokens = tokens,
                "Telemetry"
            ),
        }
    }
}

/// Appends events as JSON lines to a file.
///
/// `record` hands the event to a background writer through a bounded
/// channel and returns immediately. When the channel is full the event is
/// dropped with a warning.
#[derive(Debug)]
pub struct JsonLinesTelemetrySink {
    sender: mpsc::Sender<TelemetryEvent>,
    writer: JoinHandle<()>,
    path: PathBuf,
}

impl JsonLinesTelemetrySink {
    /// Open (or create) `path` for appending and start the writer task.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn open(path: impl Into<PathBuf>, capacity: usize) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                StorageError::new(StorageErrorKind::FileWrite(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            })?;

        let (sender, mut receiver) = mpsc::channel::<TelemetryEvent>(capacity.max(1));
        let log_path = path.clone();
        let writer = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                let mut line = match serde_json::to_string(&event) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(error = %e, "Unserializable telemetry event");
                        continue;
                    }
                };
                line.push('\n');
                if let Err(e) = file.write_all(line.as_bytes()).await {
                    warn!(path = %log_path.display(), error = %e, "Telemetry write failed");
                }
            }
            if let Err(e) = file.flush().await {
                warn!(path = %log_path.display(), error = %e, "Telemetry flush failed");
            }
            debug!(path = %log_path.display(), "Telemetry writer stopped");
        });

        info!(path = %path.display(), "Telemetry log opened");
        Ok(Self {
            sender,
            writer,
            path,
        })
    }

    /// Log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop accepting events and wait until every queued event is written.
    pub async fn close(self) {
        drop(self.sender);
        if let Err(e) = self.writer.await {
            warn!(error = %e, "Telemetry writer task failed");
        }
    }
}

impl TelemetrySink for JsonLinesTelemetrySink {
    fn record(&self, event: TelemetryEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => warn!(
                operation = %event.operation(),
                "Telemetry queue full, dropping event"
            ),
            Err(TrySendError::Closed(_)) => debug!("Telemetry writer closed"),
        }
    }
}

/// Keeps events in memory. Intended for tests.
#[derive(Debug, Default)]
pub struct InMemoryTelemetrySink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl InMemoryTelemetrySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event recorded so far.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events of one kind.
    pub fn events_of(&self, kind: TelemetryEventKind) -> Vec<TelemetryEvent> {
        self.events()
            .into_iter()
            .filter(|e| *e.kind() == kind)
            .collect()
    }
}

impl TelemetrySink for InMemoryTelemetrySink {
    fn record(&self, event: TelemetryEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
