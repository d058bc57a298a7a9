//! Core data types for Coursewright.
//!
//! This crate provides the data model shared by the adapters and the
//! generation orchestrator: the course tree that is consumed, the content
//! shapes that are produced, token accounting, checkpoints and telemetry
//! events.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod checkpoint;
mod completion;
mod content;
mod course;
mod credentials;
mod library;
mod record;
mod remote;
mod telemetry;
mod usage;

pub use checkpoint::{
    CheckpointKey, GenerationCheckpoint, LessonCheckpoint, TopicCheckpoint, course_fingerprint,
};
pub use completion::{Citation, Completion, CompletionRequest, CompletionRequestBuilder, ResearchResult};
pub use content::{
    AssignmentDraft, ContainerShell, CourseShell, LessonContent, LessonPayload, QuizQuestion,
    QuizShell,
};
pub use course::{Course, Lesson, Topic};
pub use credentials::{LmsCredentials, LmsType};
pub use library::LibraryAssignments;
pub use record::{CourseGenerationRecord, SkippedStep};
pub use remote::RemoteId;
pub use telemetry::{TelemetryEvent, TelemetryEventKind};
pub use usage::TokenUsage;
