//! Durable state for Coursewright.
//!
//! - [`FileSystemRecoveryStore`] keeps checkpoints and course records
//!   as JSON files under one directory, and leases as OS file locks.
//! - [`InMemoryRecoveryStore`] does the same in process memory, for tests and
//!   for hosts that do not need crash recovery.
//! - [`TracingTelemetrySink`], [`JsonLinesTelemetrySink`] and
//!   [`InMemoryTelemetrySink`] receive per-attempt telemetry.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod filesystem;
mod key;
mod memory;
mod telemetry;

pub use filesystem::{ClearOutcome, FileSystemRecoveryStore, LeaseHolder, LeaseState};
pub use key::validate_key;
pub use memory::InMemoryRecoveryStore;
pub use telemetry::{InMemoryTelemetrySink, JsonLinesTelemetrySink, TracingTelemetrySink};
