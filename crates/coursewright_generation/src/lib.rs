//! Course generation orchestrator for Coursewright.
//!
//! Turns a course tree into LMS content: a course shell, one container per
//! topic, seven generated pieces per lesson, and a quiz and assignment per
//! topic. Every external call is retried and paced by a
//! [`coursewright_retry::RetryExecutor`], and every durable step is
//! checkpointed so an interrupted run resumes without duplicating remote
//! entities.
//!
//! # Features
//!
//! - **Pause, resume and abort** through [`GenerationControl`]
//! - **Progress callbacks** through [`ProgressObserver`]
//! - **User-facing status** with ETA from [`GenerationStatusController`]
//! - **Knowledge library fallback**: retrieval failures fall back to plain completion
//! - **Optional web research** per topic and lesson
//!
//! # Example
//!
//! ```rust,ignore
//! use coursewright_generation::{GenerationOrchestrator, GenerationRequest, GenerationStatusController};
//! use std::time::Duration;
//!
//! # async fn example(orchestrator: GenerationOrchestrator, request: GenerationRequest) -> Result<(), Box<dyn std::error::Error>> {
//! let status = GenerationStatusController::new(Duration::from_secs(5));
//! let control = status.begin_run(&request.course.title);
//! let outcome = orchestrator.start(request, &control, &status).await?;
//! println!("Created course {}", outcome.remote_course_id);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod control;
mod error;
mod extraction;
mod html;
mod options;
mod orchestrator;
mod pipeline;
mod plan;
pub mod prompts;
mod progress;
mod quiz;
mod status;

pub use control::GenerationControl;
pub use error::{GenerationError, GenerationErrorKind};
pub use extraction::parse_structured;
pub use html::strip_tags;
pub use options::{GenerationOptions, GenerationSettings};
pub use orchestrator::{GenerationOrchestrator, GenerationOutcome, GenerationRequest};
pub use plan::{
    RESEARCH_TASKS_PER_TOPIC, TASKS_PER_LESSON, TASKS_PER_TOPIC, TaskCounter, TaskPlan,
    progress_percent,
};
pub use progress::{
    DetailPatch, NoopObserver, ProgressObserver, ProgressUpdate, StatusPhase, TaskUpdate,
};
pub use quiz::{MAX_QUIZ_QUESTIONS, parse_assignment, parse_questions};
pub use status::{GenerationStatus, GenerationStatusController, StatusDetail};
