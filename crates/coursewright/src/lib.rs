//! Coursewright - LLM-driven course generation for learning management systems
//!
//! Coursewright turns a course outline (topics and lessons) into a published
//! LMS course: readings, key takeaways, activities, examples, a quiz and an
//! assignment per topic. Runs checkpoint after every durable step, so a run
//! stopped by an abort, a crash or an exhausted retry budget resumes without
//! creating any remote entity twice.
//!
//! # Features
//!
//! - **Pause, resume and abort** between any two external calls
//! - **Retry with backoff**, rate-limit hints and a global request cap
//! - **Knowledge libraries**: retrieval-scoped readings with plain fallback
//! - **Web research**: optional search-augmented context per topic and lesson
//! - **Two LMS dialects**: topic-based and section-based course structures
//! - **Status with ETA** that excludes paused time
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use coursewright::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CoursewrightConfig::load()?;
//!     let store = Arc::new(FileSystemRecoveryStore::new(config.storage().resolved_path()));
//!     store.initialize().await?;
//!
//!     let orchestrator = GenerationOrchestrator::new(
//!         Arc::new(HttpProviderFactory::new(config.models().clone())?),
//!         Arc::new(HttpLmsConnector::default()),
//!         store.clone(),
//!         store,
//!         RetryExecutor::new(config.retry().clone(), Arc::new(TracingTelemetrySink)),
//!         config.generation().clone(),
//!     );
//!
//!     let status = GenerationStatusController::new(config.status().hide_after());
//!     let control = status.begin_run(&course.title);
//!     let request = GenerationRequest::new(course, credentials, api_key);
//!     let outcome = orchestrator.start(request, &control, &status).await?;
//!     println!("Created course {}", outcome.remote_course_id);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `coursewright_error` - Error types
//! - `coursewright_core` - Course tree, checkpoints, usage, LMS payloads
//! - `coursewright_interface` - Provider, LMS and storage traits
//! - `coursewright_retry` - Retry executor, request limiter, call throttle
//! - `coursewright_models` - HTTP completion, retrieval and research clients
//! - `coursewright_lms` - HTTP LMS adapters
//! - `coursewright_storage` - Checkpoint stores and telemetry sinks
//! - `coursewright_generation` - The orchestrator and status controller
//!
//! This crate (`coursewright`) re-exports everything for convenience and
//! adds configuration loading and logging setup for the binary.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod observability;

pub use config::{
    CoursewrightConfig, LmsConfig, RateLimitConfig, StatusConfig, StorageConfig,
};
pub use observability::{ObservabilityConfig, init_observability};

pub use coursewright_core::*;
pub use coursewright_error::*;
pub use coursewright_generation::*;
pub use coursewright_interface::*;
pub use coursewright_lms::*;
pub use coursewright_models::*;
pub use coursewright_retry::*;
pub use coursewright_storage::*;
