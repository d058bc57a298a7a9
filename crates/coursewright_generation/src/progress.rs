//! The progress contract between the orchestrator and whoever displays it.
//!
//! The orchestrator only ever calls [`ProgressObserver`]; it never sees how
//! progress is shown.

use serde::{Deserialize, Serialize};

/// Status tone of a progress message.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusPhase {
    /// Neutral information
    #[default]
    Info,
    /// The run finished
    Success,
    /// The run failed or was aborted
    Error,
    /// Work in progress
    Loading,
}

/// Partial update of the status detail panel. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, derive_setters::Setters)]
#[setters(prefix = "with_", strip_option)]
pub struct DetailPatch {
    /// Course title
    #[setters(into)]
    pub course_title: Option<String>,
    /// Topic being worked on
    #[setters(into)]
    pub current_topic: Option<String>,
    /// Lesson being worked on
    #[setters(into)]
    pub current_lesson: Option<String>,
    /// Finished topics
    pub topics_completed: Option<u32>,
    /// Topics in the course
    pub total_topics: Option<u32>,
    /// Finished lessons
    pub lessons_completed: Option<u32>,
    /// Lessons in the course
    pub total_lessons: Option<u32>,
}

impl DetailPatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Headline progress change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Progress in `[0, 100]`
    pub percent: f64,
    /// Human-readable message
    pub message: String,
    /// Tone
    pub phase: StatusPhase,
    /// Label of the task being worked on
    pub current_task_label: Option<String>,
    /// Detail changes
    pub detail: DetailPatch,
    /// Set on the final update of a run
    pub terminal: bool,
}

impl ProgressUpdate {
    /// Non-terminal update.
    pub fn new(percent: f64, message: impl Into<String>, phase: StatusPhase) -> Self {
        Self {
            percent,
            message: message.into(),
            phase,
            current_task_label: None,
            detail: DetailPatch::default(),
            terminal: false,
        }
    }

    /// Set the task label.
    pub fn with_task_label(mut self, label: impl Into<String>) -> Self {
        self.current_task_label = Some(label.into());
        self
    }

    /// Set the detail patch.
    pub fn with_detail(mut self, detail: DetailPatch) -> Self {
        self.detail = detail;
        self
    }

    /// Mark as the final update of the run.
    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }
}

/// Task counter change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    /// Finished tasks
    pub completed_tasks: u32,
    /// Planned tasks
    pub total_tasks: u32,
    /// Label of the task that just finished or is starting
    pub current_task_label: String,
    /// Detail changes
    pub detail: DetailPatch,
}

/// Receiver of progress callbacks. Calls are fire-and-forget.
pub trait ProgressObserver: Send + Sync {
    /// Headline change.
    fn on_progress(&self, update: ProgressUpdate);

    /// Task counter change.
    fn on_task_update(&self, update: TaskUpdate);
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _update: ProgressUpdate) {}

    fn on_task_update(&self, _update: TaskUpdate) {}
}

impl<T: ProgressObserver + ?Sized> ProgressObserver for std::sync::Arc<T> {
    fn on_progress(&self, update: ProgressUpdate) {
        (**self).on_progress(update)
    }

    fn on_task_update(&self, update: TaskUpdate) {
        (**self).on_task_update(update)
    }
}
