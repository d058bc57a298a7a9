//! The course record written when a generation finishes.

use crate::{CheckpointKey, RemoteId, TokenUsage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A step that was skipped after a recoverable failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedStep {
    /// Topic the step belonged to
    pub topic_id: String,
    /// Lesson the step belonged to, for lesson-level steps
    pub lesson_id: Option<String>,
    /// Step name, e.g. `quiz_questions`
    pub step: String,
    /// Human-readable reason
    pub reason: String,
}

/// Final record of a completed generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseGenerationRecord {
    /// Course id from the input
    pub course_id: String,
    /// Checkpoint key the run used
    pub checkpoint_key: CheckpointKey,
    /// Course id in the LMS
    pub remote_course_id: RemoteId,
    /// LMS dialect used
    pub lms_type: String,
    /// Total usage over the whole run, including resumed portions
    pub token_usage: TokenUsage,
    /// Finished tasks
    pub completed_tasks: u32,
    /// Steps skipped along the way
    pub skipped_steps: Vec<SkippedStep>,
    /// Completion time
    pub completed_at: DateTime<Utc>,
}
