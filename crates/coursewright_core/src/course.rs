//! The course tree consumed by a generation run.

use serde::{Deserialize, Serialize};

/// Root unit of generation.
///
/// Serialized in the external input shape, so a course exported by the
/// design tool can be fed in directly.
///
/// # Examples
///
/// ```
/// use coursewright_core::Course;
///
/// let json = r#"{
///     "id": "c1",
///     "courseTitle": "Rust",
///     "courseDescription": "Systems programming",
///     "topics": [{
///         "id": "t1",
///         "topicTitle": "Ownership",
///         "topicLearningObjectiveDescription": "Understand moves",
///         "lessons": [{ "id": "l1", "lessonTitle": "Moves", "lessonDescription": "..." }]
///     }]
/// }"#;
/// let course: Course = serde_json::from_str(json).unwrap();
/// assert_eq!(course.lesson_count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Stable course id. May be empty for a course that was never saved.
    #[serde(default)]
    pub id: String,
    /// Course title
    #[serde(rename = "courseTitle")]
    pub title: String,
    /// Course description
    #[serde(rename = "courseDescription", default)]
    pub description: String,
    /// Ordered topics
    #[serde(default)]
    pub topics: Vec<Topic>,
}

impl Course {
    /// Total number of lessons across every topic.
    pub fn lesson_count(&self) -> usize {
        self.topics.iter().map(|t| t.lessons.len()).sum()
    }
}

/// A mid-level unit of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Topic id
    pub id: String,
    /// Topic title
    #[serde(rename = "topicTitle")]
    pub title: String,
    /// What a learner should be able to do after the topic
    #[serde(rename = "topicLearningObjectiveDescription", default)]
    pub learning_objective: String,
    /// Free text attached at runtime by the author
    #[serde(rename = "additionalContext", default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
    /// Ordered lessons
    #[serde(default)]
    pub lessons: Vec<Lesson>,
    /// Knowledge library assigned to the whole topic
    #[serde(rename = "knowledgeLibraryId", default, skip_serializing_if = "Option::is_none")]
    pub knowledge_library_id: Option<String>,
}

/// A single lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    /// Lesson id
    pub id: String,
    /// Lesson title
    #[serde(rename = "lessonTitle")]
    pub title: String,
    /// Lesson description
    #[serde(rename = "lessonDescription", default)]
    pub description: String,
    /// Free text attached at runtime by the author
    #[serde(rename = "additionalContext", default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
    /// Knowledge library assigned to this lesson, overriding the topic's
    #[serde(rename = "knowledgeLibraryId", default, skip_serializing_if = "Option::is_none")]
    pub knowledge_library_id: Option<String>,
}
