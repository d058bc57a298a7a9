//! Telemetry sink capability.

use coursewright_core::TelemetryEvent;

/// Append-only log of external calls.
///
/// `record` is synchronous and infallible: a sink must never block or fail
/// the call it describes. Sinks that do I/O hand events to a background task.
pub trait TelemetrySink: Send + Sync {
    /// Record one event.
    fn record(&self, event: TelemetryEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn record(&self, _event: TelemetryEvent) {}
}
