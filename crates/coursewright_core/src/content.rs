//! Shapes produced by generation and handed to the LMS adapter.

use crate::TokenUsage;
use serde::{Deserialize, Serialize};

/// Course shell created before any topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseShell {
    /// Course title
    pub title: String,
    /// Course description
    pub description: String,
}

/// A topic (topic-based LMS) or section (section-based LMS).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerShell {
    /// Container title
    pub title: String,
    /// Learning objective
    pub description: String,
    /// Position within the course, starting at 1
    pub order: u32,
}

/// Everything generated for one lesson. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonContent {
    /// Long-form reading material as HTML
    pub reading_html: String,
    /// Tag-stripped copy of the reading material
    pub reading_plain: String,
    /// Frequently asked questions
    pub faq: String,
    /// Recent developments in the field
    pub latest_developments: String,
    /// Further reading suggestions
    pub additional_reading: String,
    /// Slide outline
    pub slides: String,
    /// Narration script
    pub voice_over: String,
    /// Usage of every call that produced this lesson
    pub usage: TokenUsage,
}

/// Lesson as submitted to the LMS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonPayload {
    /// Lesson title
    pub title: String,
    /// Full lesson body as HTML
    pub body_html: String,
    /// Slide outline, stored separately by adapters that support it
    pub slides: String,
    /// Narration script
    pub voice_over: String,
    /// Position within the parent, starting at 1
    pub order: u32,
}

impl LessonPayload {
    /// Fold generated content into a single submission.
    ///
    /// Empty sections are left out of the body.
    pub fn from_content(title: impl Into<String>, order: u32, content: &LessonContent) -> Self {
        let mut body = content.reading_html.clone();
        for (heading, section) in [
            ("Frequently Asked Questions", &content.faq),
            ("Latest Developments", &content.latest_developments),
            ("Additional Reading", &content.additional_reading),
        ] {
            if section.trim().is_empty() {
                continue;
            }
            body.push_str(&format!("\n<h2>{}</h2>\n{}", heading, section));
        }
        Self {
            title: title.into(),
            body_html: body,
            slides: content.slides.clone(),
            voice_over: content.voice_over.clone(),
            order,
        }
    }
}

/// Quiz shell created before its questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizShell {
    /// Quiz title
    pub title: String,
    /// Short description
    pub description: String,
}

/// A quiz question in normalized form.
///
/// Adapters translate this into their own per-type payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuizQuestion {
    /// Several options may be correct
    MultipleChoice {
        /// Question text
        prompt: String,
        /// Answer options
        options: Vec<String>,
        /// Indexes of the correct options
        correct: Vec<usize>,
    },
    /// Exactly one option is correct
    SingleChoice {
        /// Question text
        prompt: String,
        /// Answer options
        options: Vec<String>,
        /// Index of the correct option
        correct: usize,
    },
    /// Learner types the missing word or phrase
    FillInBlank {
        /// Question text containing a blank
        prompt: String,
        /// Accepted answers
        answers: Vec<String>,
    },
}

impl QuizQuestion {
    /// Question text.
    pub fn prompt(&self) -> &str {
        match self {
            QuizQuestion::MultipleChoice { prompt, .. }
            | QuizQuestion::SingleChoice { prompt, .. }
            | QuizQuestion::FillInBlank { prompt, .. } => prompt,
        }
    }
}

/// Generated assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentDraft {
    /// Assignment title
    pub title: String,
    /// Instructions, HTML allowed
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_skips_empty_sections() {
        let content = LessonContent {
            reading_html: "<p>Body</p>".into(),
            faq: "<p>Q and A</p>".into(),
            latest_developments: "  ".into(),
            ..Default::default()
        };
        let payload = LessonPayload::from_content("Moves", 1, &content);
        assert!(payload.body_html.contains("Frequently Asked Questions"));
        assert!(!payload.body_html.contains("Latest Developments"));
        assert!(!payload.body_html.contains("Additional Reading"));
    }

    #[test]
    fn question_uses_type_tag() {
        let q: QuizQuestion = serde_json::from_str(
            r#"{"type":"single_choice","prompt":"2+2?","options":["3","4"],"correct":1}"#,
        )
        .unwrap();
        assert_eq!(q.prompt(), "2+2?");
    }
}
