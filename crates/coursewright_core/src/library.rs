//! Assignment of knowledge libraries to topics and lessons.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Lesson, Topic};

/// Maps topic ids and lesson ids to knowledge library ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryAssignments {
    /// topic id -> library id
    #[serde(default)]
    pub topics: HashMap<String, String>,
    /// lesson id -> library id
    #[serde(default)]
    pub lessons: HashMap<String, String>,
}

impl LibraryAssignments {
    /// Assign a library to a topic.
    pub fn assign_topic(&mut self, topic_id: impl Into<String>, library_id: impl Into<String>) {
        self.topics.insert(topic_id.into(), library_id.into());
    }

    /// Assign a library to a lesson.
    pub fn assign_lesson(&mut self, lesson_id: impl Into<String>, library_id: impl Into<String>) {
        self.lessons.insert(lesson_id.into(), library_id.into());
    }

    /// The library that scopes retrieval for `lesson`.
    ///
    /// Lesson-level assignments always win over topic-level ones; an explicit
    /// map entry wins over the id carried on the course tree itself.
    ///
    /// # Examples
    ///
    /// ```
    /// use coursewright_core::{LibraryAssignments, Lesson, Topic};
    ///
    /// let lesson = Lesson {
    ///     id: "l1".into(), title: "Moves".into(), description: String::new(),
    ///     additional_context: None, knowledge_library_id: None,
    /// };
    /// let topic = Topic {
    ///     id: "t1".into(), title: "Ownership".into(), learning_objective: String::new(),
    ///     additional_context: None, lessons: vec![lesson.clone()], knowledge_library_id: None,
    /// };
    /// let mut map = LibraryAssignments::default();
    /// map.assign_topic("t1", "vs_topic");
    /// assert_eq!(map.effective_library(&topic, &lesson), Some("vs_topic"));
    /// map.assign_lesson("l1", "vs_lesson");
    /// assert_eq!(map.effective_library(&topic, &lesson), Some("vs_lesson"));
    /// ```
    pub fn effective_library<'a>(&'a self, topic: &'a Topic, lesson: &'a Lesson) -> Option<&'a str> {
        self.lessons
            .get(&lesson.id)
            .map(String::as_str)
            .or(lesson.knowledge_library_id.as_deref())
            .or_else(|| self.topics.get(&topic.id).map(String::as_str))
            .or(topic.knowledge_library_id.as_deref())
            .filter(|id| !id.trim().is_empty())
    }
}
