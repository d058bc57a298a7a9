//! Recovery checkpoints.
//!
//! A checkpoint is written after every remote creation so that a crashed or
//! failed run can resume at `(current_topic_index, current_lesson_index)`
//! without creating any LMS entity twice.

use crate::{Course, RemoteId, TokenUsage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Key under which a run's checkpoint is stored.
///
/// The key doubles as the run's mutual-exclusion key: two runs with the same
/// key never execute at once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(transparent)]
pub struct CheckpointKey(String);

impl CheckpointKey {
    /// Derive the key for a course.
    ///
    /// Courses with an id get a stable key; courses without one get a fresh
    /// temporary key, which means they can only be resumed by passing the key
    /// back explicitly.
    ///
    /// # Examples
    ///
    /// ```
    /// use coursewright_core::{CheckpointKey, Course};
    ///
    /// let mut course = Course {
    ///     id: "abc/42".into(), title: "T".into(), description: String::new(), topics: vec![],
    /// };
    /// assert_eq!(CheckpointKey::for_course(&course).as_str(), "course-abc_42");
    /// course.id.clear();
    /// assert!(CheckpointKey::for_course(&course).is_temporary());
    /// ```
    pub fn for_course(course: &Course) -> Self {
        let id = course.id.trim();
        if id.is_empty() {
            Self(format!("temp-{}", uuid::Uuid::new_v4()))
        } else {
            let safe: String = id
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                        c
                    } else {
                        '_'
                    }
                })
                .collect();
            Self(format!("course-{}", safe))
        }
    }

    /// Wrap an existing key, e.g. one read back from the store.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this key was minted for a course without an id.
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with("temp-")
    }
}

/// SHA-256 over the course's topic and lesson ids, in order.
///
/// Used to refuse resuming a checkpoint against a course whose structure has
/// since changed.
pub fn course_fingerprint(course: &Course) -> String {
    let mut hasher = Sha256::new();
    hasher.update(course.id.as_bytes());
    for topic in &course.topics {
        hasher.update(b"\x1ft:");
        hasher.update(topic.id.as_bytes());
        for lesson in &topic.lessons {
            hasher.update(b"\x1fl:");
            hasher.update(lesson.id.as_bytes());
        }
    }
    format!("{:x}", hasher.finalize())
}

/// Lesson progress recorded once the lesson step has finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonCheckpoint {
    /// Lesson id from the course tree
    pub lesson_id: String,
    /// LMS id, absent when the LMS rejected the lesson
    pub lesson_lms_id: Option<RemoteId>,
    /// Plain-text reading content, input for the topic's quiz and assignment
    pub plain_text: String,
    /// True when the lesson was skipped after a recoverable failure
    #[serde(default)]
    pub skipped: bool,
}

/// Topic progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicCheckpoint {
    /// Topic id from the course tree
    pub topic_id: String,
    /// LMS id of the topic or section
    pub topic_lms_id: Option<RemoteId>,
    /// Cached introduction text
    pub topic_introduction_text: Option<String>,
    /// Cached topic-level web research; present once research has run
    #[serde(default)]
    pub research_context: Option<String>,
    /// Finished lessons, in course order
    #[serde(default)]
    pub lessons: Vec<LessonCheckpoint>,
    /// LMS id of the quiz shell
    #[serde(default)]
    pub quiz_id: Option<RemoteId>,
    /// Quiz question step finished
    #[serde(default)]
    pub quiz_questions_done: bool,
    /// Quiz shell step finished (created or skipped)
    #[serde(default)]
    pub quiz_done: bool,
    /// Assignment step finished (created or skipped)
    #[serde(default)]
    pub assignment_done: bool,
    /// True when the whole topic was skipped
    #[serde(default)]
    pub skipped: bool,
}

impl TopicCheckpoint {
    /// Empty progress for a topic.
    pub fn new(topic_id: impl Into<String>) -> Self {
        Self {
            topic_id: topic_id.into(),
            topic_lms_id: None,
            topic_introduction_text: None,
            research_context: None,
            lessons: Vec::new(),
            quiz_id: None,
            quiz_questions_done: false,
            quiz_done: false,
            assignment_done: false,
            skipped: false,
        }
    }

    /// LMS ids of the lessons created so far.
    pub fn lesson_lms_ids(&self) -> Vec<RemoteId> {
        self.lessons
            .iter()
            .filter_map(|l| l.lesson_lms_id.clone())
            .collect()
    }

    /// Plain text of every finished lesson, separated by blank lines.
    pub fn combined_plain_text(&self) -> String {
        self.lessons
            .iter()
            .map(|l| l.plain_text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// The recovery unit for one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationCheckpoint {
    /// Storage key
    pub key: CheckpointKey,
    /// Course the checkpoint belongs to
    pub course_id: String,
    /// Structure fingerprint, see [`course_fingerprint`]
    pub fingerprint: String,
    /// Task total the run was planned with
    pub total_tasks: u32,
    /// LMS id of the course shell
    pub lms_course_id: Option<RemoteId>,
    /// Generated course context, reused by every later prompt
    pub course_context_text: String,
    /// Per-topic progress, one entry per course topic
    pub topics: Vec<TopicCheckpoint>,
    /// Topic the run resumes at
    pub current_topic_index: usize,
    /// Lesson within the current topic the run resumes at
    pub current_lesson_index: usize,
    /// Tasks finished up to the last durable boundary
    pub completed_task_count: u32,
    /// Usage accumulated so far
    pub token_usage: TokenUsage,
    /// Progress at the time of writing
    pub progress_percent: f64,
    /// When the checkpoint was written
    pub timestamp: DateTime<Utc>,
    /// Last error that stopped the run, if any
    pub last_error: Option<String>,
}

impl GenerationCheckpoint {
    /// Fresh checkpoint for a course that has not started.
    pub fn new(key: CheckpointKey, course: &Course, total_tasks: u32) -> Self {
        Self {
            key,
            course_id: course.id.clone(),
            fingerprint: course_fingerprint(course),
            total_tasks,
            lms_course_id: None,
            course_context_text: String::new(),
            topics: course
                .topics
                .iter()
                .map(|t| TopicCheckpoint::new(t.id.clone()))
                .collect(),
            current_topic_index: 0,
            current_lesson_index: 0,
            completed_task_count: 0,
            token_usage: TokenUsage::default(),
            progress_percent: 0.0,
            timestamp: Utc::now(),
            last_error: None,
        }
    }

    /// Whether this checkpoint was written for `course` planned with `total_tasks`.
    pub fn matches(&self, course: &Course, total_tasks: u32) -> bool {
        self.fingerprint == course_fingerprint(course)
            && self.total_tasks == total_tasks
            && self.topics.len() == course.topics.len()
    }

    /// Refresh the timestamp before writing.
    pub fn touch(&mut self) {
        self.timestamp = Utc::now();
    }
}
