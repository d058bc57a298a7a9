//! Capability traits for Coursewright.
//!
//! The orchestrator only ever talks to these traits. Concrete HTTP adapters
//! live in `coursewright_models` and `coursewright_lms`; stores and
//! telemetry sinks live in `coursewright_storage`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod lms;
mod providers;
mod storage;
mod telemetry;

pub use lms::{LmsAdapter, LmsConnector};
pub use providers::{CompletionDriver, ProviderFactory, RagDriver, WebResearch};
pub use storage::{CheckpointLease, CourseRecordStore, RecoveryStore};
pub use telemetry::{NoopTelemetry, TelemetrySink};
