//! Task accounting.
//!
//! The total is fixed before the run starts so progress is a plain ratio.
//! Every unit reaches exactly one terminal outcome per run, success or a
//! recovered skip, and each outcome advances the counter by one.

use coursewright_core::{Course, Topic};
use derive_getters::Getters;

/// Reading content, five sections, LMS lesson creation.
pub const TASKS_PER_LESSON: u32 = 7;
/// Quiz shell, quiz questions, assignment.
pub const TASKS_PER_TOPIC: u32 = 3;
/// Topic-level web research, when enabled.
pub const RESEARCH_TASKS_PER_TOPIC: u32 = 1;

/// Precomputed task totals for a course.
///
/// # Examples
///
/// ```
/// use coursewright_core::{Course, Lesson, Topic};
/// use coursewright_generation::TaskPlan;
///
/// let lesson = |id: &str| Lesson {
///     id: id.into(), title: id.into(), description: String::new(),
///     additional_context: None, knowledge_library_id: None,
/// };
/// let course = Course {
///     id: "c".into(), title: "C".into(), description: String::new(),
///     topics: vec![Topic {
///         id: "t".into(), title: "T".into(), learning_objective: String::new(),
///         additional_context: None, knowledge_library_id: None,
///         lessons: vec![lesson("a"), lesson("b")],
///     }],
/// };
/// assert_eq!(*TaskPlan::for_course(&course, false).total_tasks(), 17);
/// assert_eq!(*TaskPlan::for_course(&course, true).total_tasks(), 18);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters)]
pub struct TaskPlan {
    total_tasks: u32,
    research_enabled: bool,
}

impl TaskPlan {
    /// Plan for `course`.
    pub fn for_course(course: &Course, research_enabled: bool) -> Self {
        let plan = Self {
            total_tasks: 0,
            research_enabled,
        };
        let total_tasks = course.topics.iter().map(|t| plan.topic_tasks(t)).sum();
        Self {
            total_tasks,
            research_enabled,
        }
    }

    /// Tasks one topic contributes, its lessons included.
    pub fn topic_tasks(&self, topic: &Topic) -> u32 {
        self.topic_overhead() + topic.lessons.len() as u32 * TASKS_PER_LESSON
    }

    /// Topic-level tasks, lessons excluded.
    pub fn topic_overhead(&self) -> u32 {
        TASKS_PER_TOPIC
            + if self.research_enabled {
                RESEARCH_TASKS_PER_TOPIC
            } else {
                0
            }
    }
}

/// Progress percentage, clamped to `[0, 100]`. An empty plan counts as done.
pub fn progress_percent(completed: u32, total: u32) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (f64::from(completed) / f64::from(total) * 100.0).clamp(0.0, 100.0)
}

/// Running count of finished tasks.
///
/// The count never exceeds the total and never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskCounter {
    completed: u32,
    total: u32,
}

impl TaskCounter {
    /// Counter starting at `completed`, e.g. from a checkpoint.
    pub fn new(completed: u32, total: u32) -> Self {
        Self {
            completed: completed.min(total),
            total,
        }
    }

    /// Record one finished task.
    pub fn advance(&mut self) {
        self.completed = (self.completed + 1).min(self.total);
    }

    /// Finished tasks.
    pub fn completed(&self) -> u32 {
        self.completed
    }

    /// Planned tasks.
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Current percentage.
    pub fn percent(&self) -> f64 {
        progress_percent(self.completed, self.total)
    }
}
