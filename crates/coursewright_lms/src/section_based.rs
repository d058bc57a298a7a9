//! Section-based dialect: course → section → lesson.
//!
//! Quizzes attach to the first lesson of a section, and there is no native
//! assignment entity, so assignments become lessons of type `assignment`.

use crate::client::LmsClient;
use async_trait::async_trait;
use coursewright_core::{
    AssignmentDraft, ContainerShell, CourseShell, LessonPayload, LmsType, QuizQuestion, QuizShell,
    RemoteId,
};
use coursewright_error::LmsError;
use coursewright_interface::LmsAdapter;
use serde_json::{Value, json};

/// Adapter for section-based LMS instances.
#[derive(Debug, Clone)]
pub struct SectionBasedLms {
    client: LmsClient,
}

impl SectionBasedLms {
    pub(crate) fn new(client: LmsClient) -> Self {
        Self { client }
    }
}

pub(crate) fn question_payload(question: &QuizQuestion, order: u32) -> Value {
    match question {
        QuizQuestion::MultipleChoice {
            prompt,
            options,
            correct,
        } => json!({
            "title": prompt,
            "type": "multiple_choice",
            "order": order,
            "mark": 1,
            "options": options.iter().enumerate().map(|(i, title)| json!({
                "title": title,
                "is_true": if correct.contains(&i) { "yes" } else { "no" },
            })).collect::<Vec<_>>(),
        }),
        QuizQuestion::SingleChoice {
            prompt,
            options,
            correct,
        } => json!({
            "title": prompt,
            "type": "single_choice",
            "order": order,
            "mark": 1,
            "options": options.iter().enumerate().map(|(i, title)| json!({
                "title": title,
                "is_true": if i == *correct { "yes" } else { "no" },
            })).collect::<Vec<_>>(),
        }),
        QuizQuestion::FillInBlank { prompt, answers } => json!({
            "title": prompt,
            "type": "fill_in_blanks",
            "order": order,
            "mark": 1,
            "answers": answers,
        }),
    }
}

fn lesson_body(payload: &LessonPayload) -> String {
    let mut body = payload.body_html.clone();
    if !payload.slides.trim().is_empty() {
        body.push_str(&format!(
            "\n<details><summary>Slides</summary>\n{}\n</details>",
            payload.slides
        ));
    }
    if !payload.voice_over.trim().is_empty() {
        body.push_str(&format!(
            "\n<details><summary>Voice-over script</summary>\n{}\n</details>",
            payload.voice_over
        ));
    }
    body
}

#[async_trait]
impl LmsAdapter for SectionBasedLms {
    fn lms_type(&self) -> LmsType {
        LmsType::SectionBased
    }

    async fn create_course(&self, shell: &CourseShell) -> Result<RemoteId, LmsError> {
        let body = json!({
            "title": shell.title,
            "description": shell.description,
            "status": "draft",
        });
        self.client.create("courses", &body).await
    }

    async fn create_topic_or_section(
        &self,
        course_id: &RemoteId,
        shell: &ContainerShell,
    ) -> Result<RemoteId, LmsError> {
        let body = json!({
            "section_name": shell.title,
            "section_description": shell.description,
            "section_order": shell.order,
        });
        self.client
            .create(&format!("courses/{}/sections", course_id), &body)
            .await
    }

    async fn create_lesson(
        &self,
        parent_id: &RemoteId,
        payload: &LessonPayload,
    ) -> Result<RemoteId, LmsError> {
        let body = json!({
            "title": payload.title,
            "content": lesson_body(payload),
            "order": payload.order,
            "lesson_type": "text",
        });
        self.client
            .create(&format!("sections/{}/lessons", parent_id), &body)
            .await
    }

    async fn create_quiz(
        &self,
        parent_id: &RemoteId,
        shell: &QuizShell,
    ) -> Result<RemoteId, LmsError> {
        let body = json!({
            "title": shell.title,
            "description": shell.description,
            "passing_grade": 70,
        });
        self.client
            .create(&format!("lessons/{}/quizzes", parent_id), &body)
            .await
    }

    async fn create_quiz_question(
        &self,
        quiz_id: &RemoteId,
        question: &QuizQuestion,
        order: u32,
    ) -> Result<RemoteId, LmsError> {
        self.client
            .create(
                &format!("quizzes/{}/questions", quiz_id),
                &question_payload(question, order),
            )
            .await
    }

    async fn create_assignment(
        &self,
        parent_id: &RemoteId,
        draft: &AssignmentDraft,
    ) -> Result<RemoteId, LmsError> {
        let body = json!({
            "title": draft.title,
            "content": draft.content,
            "lesson_type": "assignment",
        });
        self.client
            .create(&format!("sections/{}/lessons", parent_id), &body)
            .await
    }

    fn quiz_parent(&self, _container_id: &RemoteId, lesson_ids: &[RemoteId]) -> Option<RemoteId> {
        lesson_ids.first().cloned()
    }

    fn assignment_parent(
        &self,
        container_id: &RemoteId,
        _lesson_ids: &[RemoteId],
    ) -> Option<RemoteId> {
        Some(container_id.clone())
    }
}
