//! User-facing status derived from progress callbacks.

use crate::{
    DetailPatch, GenerationControl, ProgressObserver, ProgressUpdate, StatusPhase, TaskUpdate,
    progress_percent,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Detail panel of [`GenerationStatus`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDetail {
    /// Course title
    pub course_title: String,
    /// Topic being worked on
    pub current_topic: String,
    /// Lesson being worked on
    pub current_lesson: String,
    /// Finished topics
    pub topics_completed: u32,
    /// Topics in the course
    pub total_topics: u32,
    /// Finished lessons
    pub lessons_completed: u32,
    /// Lessons in the course
    pub total_lessons: u32,
}

impl StatusDetail {
    fn apply(&mut self, patch: &DetailPatch) {
        if let Some(v) = &patch.course_title {
            self.course_title.clone_from(v);
        }
        if let Some(v) = &patch.current_topic {
            self.current_topic.clone_from(v);
        }
        if let Some(v) = &patch.current_lesson {
            self.current_lesson.clone_from(v);
        }
        if let Some(v) = patch.topics_completed {
            self.topics_completed = v;
        }
        if let Some(v) = patch.total_topics {
            self.total_topics = v;
        }
        if let Some(v) = patch.lessons_completed {
            self.lessons_completed = v;
        }
        if let Some(v) = patch.total_lessons {
            self.total_lessons = v;
        }
    }
}

/// What a status bar shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStatus {
    /// Whether the status is shown at all
    pub visible: bool,
    /// Tone
    pub phase: StatusPhase,
    /// Current message
    pub message: String,
    /// Progress in `[0, 100]`, never decreasing within a run
    pub progress_percent: f64,
    /// Collapsed to a small indicator
    pub is_minimized: bool,
    /// A pause is in effect
    pub is_paused: bool,
    /// Pause control enabled
    pub can_pause: bool,
    /// Abort control enabled
    pub can_abort: bool,
    /// Task being worked on
    pub current_task_label: String,
    /// Planned tasks
    pub total_tasks: u32,
    /// Finished tasks
    pub completed_tasks: u32,
    /// Remaining time estimate; `None` until a task finishes in this run
    pub estimated_millis_remaining: Option<u64>,
    /// When the run started
    pub start_timestamp: Option<DateTime<Utc>>,
    /// Detail panel
    pub detail: StatusDetail,
}

#[derive(Debug)]
struct Timing {
    started: Instant,
    paused_since: Option<Instant>,
    paused_total: Duration,
    baseline: Option<u32>,
}

impl Timing {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            paused_since: None,
            paused_total: Duration::ZERO,
            baseline: None,
        }
    }

    /// Wall time since start minus time spent paused.
    fn active(&self, now: Instant) -> Duration {
        let paused = self.paused_total
            + self
                .paused_since
                .map(|since| now.saturating_duration_since(since))
                .unwrap_or_default();
        now.saturating_duration_since(self.started)
            .saturating_sub(paused)
    }
}

/// Estimated remaining time from the average active time per task finished
/// in this run.
fn estimate_remaining(active: Duration, done_this_run: u32, remaining: u32) -> Option<u64> {
    if done_this_run == 0 {
        return None;
    }
    let per_task = active.as_millis() as f64 / f64::from(done_this_run);
    Some((per_task * f64::from(remaining)).round() as u64)
}

struct Shared {
    state: watch::Sender<GenerationStatus>,
    epoch: AtomicU64,
}

/// Owns the [`GenerationStatus`] of the current run.
///
/// Implements [`ProgressObserver`], so it can be handed to the orchestrator
/// directly. Observers of the status subscribe to a `watch` channel.
///
/// # Examples
///
/// ```
/// use coursewright_generation::GenerationStatusController;
/// use std::time::Duration;
///
/// let status = GenerationStatusController::new(Duration::from_secs(5));
/// let control = status.begin_run("Rust Ownership");
/// status.pause();
/// assert!(control.is_paused());
/// assert!(status.snapshot().is_paused);
/// ```
pub struct GenerationStatusController {
    shared: Arc<Shared>,
    control: Mutex<GenerationControl>,
    timing: Mutex<Timing>,
    hide_after: Duration,
}

impl std::fmt::Debug for GenerationStatusController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationStatusController")
            .field("status", &*self.shared.state.borrow())
            .field("hide_after", &self.hide_after)
            .finish()
    }
}

impl GenerationStatusController {
    /// Controller that hides a finished run's status after `hide_after`.
    pub fn new(hide_after: Duration) -> Self {
        let (state, _) = watch::channel(GenerationStatus::default());
        Self {
            shared: Arc::new(Shared {
                state,
                epoch: AtomicU64::new(0),
            }),
            control: Mutex::new(GenerationControl::new()),
            timing: Mutex::new(Timing::new()),
            hide_after,
        }
    }

    fn timing(&self) -> MutexGuard<'_, Timing> {
        self.timing.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reset for a new run and return its control handle.
    ///
    /// A hide timer left over from an earlier run will not hide this one.
    pub fn begin_run(&self, course_title: &str) -> GenerationControl {
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        let control = GenerationControl::new();
        *self
            .control
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = control.clone();
        *self.timing() = Timing::new();

        self.shared.state.send_replace(GenerationStatus {
            visible: true,
            phase: StatusPhase::Loading,
            message: format!("Preparing \"{}\"", course_title),
            can_pause: true,
            can_abort: true,
            start_timestamp: Some(Utc::now()),
            detail: StatusDetail {
                course_title: course_title.to_string(),
                ..Default::default()
            },
            ..Default::default()
        });
        debug!(course = course_title, "Status run started");
        control
    }

    /// Control handle of the current run.
    pub fn control(&self) -> GenerationControl {
        self.control
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Watch status changes.
    pub fn subscribe(&self) -> watch::Receiver<GenerationStatus> {
        self.shared.state.subscribe()
    }

    /// Current status.
    pub fn snapshot(&self) -> GenerationStatus {
        self.shared.state.borrow().clone()
    }

    /// Pause the run and stop the ETA clock.
    pub fn pause(&self) {
        if !self.snapshot().can_pause {
            return;
        }
        self.control().pause();
        {
            let mut timing = self.timing();
            if timing.paused_since.is_none() {
                timing.paused_since = Some(Instant::now());
            }
        }
        self.shared.state.send_modify(|s| {
            s.is_paused = true;
            s.phase = StatusPhase::Info;
            s.message = "Paused".to_string();
        });
    }

    /// Resume the run and restart the ETA clock.
    pub fn resume(&self) {
        {
            let mut timing = self.timing();
            if let Some(since) = timing.paused_since.take() {
                timing.paused_total += since.elapsed();
            }
        }
        self.control().resume();
        self.shared.state.send_modify(|s| {
            if s.is_paused {
                s.is_paused = false;
                s.phase = StatusPhase::Loading;
                s.message = "Resuming".to_string();
            }
        });
    }

    /// Abort the run.
    pub fn abort(&self) {
        if !self.snapshot().can_abort {
            return;
        }
        self.control().abort();
        self.shared.state.send_modify(|s| {
            s.can_pause = false;
            s.can_abort = false;
            s.message = "Aborting".to_string();
        });
    }

    /// Collapse or expand the status.
    pub fn set_minimized(&self, minimized: bool) {
        self.shared.state.send_modify(|s| s.is_minimized = minimized);
    }

    /// Hide immediately.
    pub fn hide(&self) {
        self.shared.state.send_modify(|s| s.visible = false);
    }

    fn schedule_hide(&self) {
        let epoch = self.shared.epoch.load(Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        let delay = self.hide_after;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if shared.epoch.load(Ordering::SeqCst) == epoch {
                        shared.state.send_modify(|s| s.visible = false);
                    }
                });
            }
            Err(_) => warn!("No async runtime, status will not auto-hide"),
        }
    }
}

impl ProgressObserver for GenerationStatusController {
    fn on_progress(&self, update: ProgressUpdate) {
        self.shared.state.send_modify(|s| {
            s.visible = true;
            s.progress_percent = s.progress_percent.max(update.percent.clamp(0.0, 100.0));
            // A paused run keeps its "Paused" banner until it resumes or ends.
            if !s.is_paused || update.terminal {
                s.message = update.message.clone();
                s.phase = update.phase;
            }
            if let Some(label) = &update.current_task_label {
                s.current_task_label.clone_from(label);
            }
            s.detail.apply(&update.detail);
            if update.terminal {
                s.is_paused = false;
                s.can_pause = false;
                s.can_abort = false;
                s.estimated_millis_remaining = None;
            }
        });
        if update.terminal {
            self.schedule_hide();
        }
    }

    fn on_task_update(&self, update: TaskUpdate) {
        let estimate = {
            let mut timing = self.timing();
            let baseline = *timing.baseline.get_or_insert(update.completed_tasks);
            let done_this_run = update.completed_tasks.saturating_sub(baseline);
            let remaining = update.total_tasks.saturating_sub(update.completed_tasks);
            estimate_remaining(timing.active(Instant::now()), done_this_run, remaining)
        };
        self.shared.state.send_modify(|s| {
            s.completed_tasks = s.completed_tasks.max(update.completed_tasks);
            s.total_tasks = update.total_tasks;
            s.progress_percent = s
                .progress_percent
                .max(progress_percent(update.completed_tasks, update.total_tasks));
            s.current_task_label.clone_from(&update.current_task_label);
            s.detail.apply(&update.detail);
            if estimate.is_some() {
                s.estimated_millis_remaining = estimate;
            }
        });
    }
}
