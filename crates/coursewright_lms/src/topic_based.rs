//! Topic-based dialect: course → topic → lesson, quizzes and assignments on topics.

use crate::client::LmsClient;
use async_trait::async_trait;
use coursewright_core::{
    AssignmentDraft, ContainerShell, CourseShell, LessonPayload, LmsType, QuizQuestion, QuizShell,
    RemoteId,
};
use coursewright_error::LmsError;
use coursewright_interface::LmsAdapter;
use serde_json::{Value, json};

/// Adapter for topic-based LMS instances.
#[derive(Debug, Clone)]
pub struct TopicBasedLms {
    client: LmsClient,
}

impl TopicBasedLms {
    pub(crate) fn new(client: LmsClient) -> Self {
        Self { client }
    }
}

/// Question body in this dialect.
///
/// Choice questions carry `answers` with a `correct` flag; fill-in-the-blank
/// questions are sent as cloze text where `{a|b}` marks the blank and its
/// accepted answers.
pub(crate) fn question_payload(question: &QuizQuestion, order: u32) -> Value {
    match question {
        QuizQuestion::MultipleChoice {
            prompt,
            options,
            correct,
        } => json!({
            "title": format!("Question {}", order),
            "question": prompt,
            "question_type": "multiple",
            "points": 1,
            "menu_order": order,
            "answers": options.iter().enumerate().map(|(i, text)| json!({
                "text": text,
                "correct": correct.contains(&i),
            })).collect::<Vec<_>>(),
        }),
        QuizQuestion::SingleChoice {
            prompt,
            options,
            correct,
        } => json!({
            "title": format!("Question {}", order),
            "question": prompt,
            "question_type": "single",
            "points": 1,
            "menu_order": order,
            "answers": options.iter().enumerate().map(|(i, text)| json!({
                "text": text,
                "correct": i == *correct,
            })).collect::<Vec<_>>(),
        }),
        QuizQuestion::FillInBlank { prompt, answers } => {
            let blank = format!("{{{}}}", answers.join("|"));
            let cloze = match prompt.find("___") {
                Some(start) => {
                    let end = start + prompt[start..].chars().take_while(|c| *c == '_').count();
                    format!("{}{}{}", &prompt[..start], blank, &prompt[end..])
                }
                None => format!("{} {}", prompt.trim_end(), blank),
            };
            json!({
                "title": format!("Question {}", order),
                "question": prompt,
                "question_type": "cloze",
                "points": 1,
                "menu_order": order,
                "cloze_text": cloze,
            })
        }
    }
}

#[async_trait]
impl LmsAdapter for TopicBasedLms {
    fn lms_type(&self) -> LmsType {
        LmsType::TopicBased
    }

    async fn create_course(&self, shell: &CourseShell) -> Result<RemoteId, LmsError> {
        let body = json!({
            "title": shell.title,
            "content": shell.description,
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
            "title": shell.title,
            "content": shell.description,
            "menu_order": shell.order,
            "course_id": course_id.as_str(),
        });
        self.client
            .create(&format!("courses/{}/topics", course_id), &body)
            .await
    }

    async fn create_lesson(
        &self,
        parent_id: &RemoteId,
        payload: &LessonPayload,
    ) -> Result<RemoteId, LmsError> {
        let body = json!({
            "title": payload.title,
            "content": payload.body_html,
            "menu_order": payload.order,
            "meta": {
                "slides": payload.slides,
                "voice_over": payload.voice_over,
            },
        });
        self.client
            .create(&format!("topics/{}/lessons", parent_id), &body)
            .await
    }

    async fn create_quiz(
        &self,
        parent_id: &RemoteId,
        shell: &QuizShell,
    ) -> Result<RemoteId, LmsError> {
        let body = json!({
            "title": shell.title,
            "content": shell.description,
            "passing_percentage": 70,
        });
        self.client
            .create(&format!("topics/{}/quizzes", parent_id), &body)
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
            "points": 10,
        });
        self.client
            .create(&format!("topics/{}/assignments", parent_id), &body)
            .await
    }

    fn quiz_parent(&self, container_id: &RemoteId, _lesson_ids: &[RemoteId]) -> Option<RemoteId> {
        Some(container_id.clone())
    }

    fn assignment_parent(
        &self,
        container_id: &RemoteId,
        _lesson_ids: &[RemoteId],
    ) -> Option<RemoteId> {
        Some(container_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursewright_core::LmsCredentials;
    use std::time::Duration;

    fn adapter() -> TopicBasedLms {
        let creds = LmsCredentials {
            lms_type: "topic_based".into(),
            base_url: "https://lms.example.com/api".into(),
            username: "u".into(),
            password: "p".into(),
        };
        TopicBasedLms::new(LmsClient::new(&creds, Duration::from_secs(5)).unwrap())
    }

    #[test]
    fn quiz_and_assignment_attach_to_topic() {
        let lms = adapter();
        let topic = RemoteId::new("t9");
        let lessons = vec![RemoteId::new("l1"), RemoteId::new("l2")];
        assert_eq!(lms.quiz_parent(&topic, &lessons), Some(topic.clone()));
        assert_eq!(lms.quiz_parent(&topic, &[]), Some(topic.clone()));
        assert_eq!(lms.assignment_parent(&topic, &lessons), Some(topic));
    }

    #[test]
    fn multiple_choice_marks_every_correct_answer() {
        let q = QuizQuestion::MultipleChoice {
            prompt: "Pick primes".into(),
            options: vec!["2".into(), "4".into(), "5".into()],
            correct: vec![0, 2],
        };
        let body = question_payload(&q, 3);
        assert_eq!(body["question_type"], "multiple");
        assert_eq!(body["menu_order"], 3);
        let flags: Vec<bool> = body["answers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["correct"].as_bool().unwrap())
            .collect();
        assert_eq!(flags, vec![true, false, true]);
    }

    #[test]
    fn fill_in_blank_becomes_cloze() {
        let q = QuizQuestion::FillInBlank {
            prompt: "Rust moves are ____ by default.".into(),
            answers: vec!["cheap".into(), "shallow".into()],
        };
        let body = question_payload(&q, 1);
        assert_eq!(body["question_type"], "cloze");
        assert_eq!(body["cloze_text"], "Rust moves are {cheap|shallow} by default.");
    }

    #[test]
    fn fill_in_blank_without_marker_appends_blank() {
        let q = QuizQuestion::FillInBlank {
            prompt: "The borrow checker runs at".into(),
            answers: vec!["compile time".into()],
        };
        let body = question_payload(&q, 1);
        assert_eq!(body["cloze_text"], "The borrow checker runs at {compile time}");
    }
}
