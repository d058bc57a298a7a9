//! LMS adapter capability.

use async_trait::async_trait;
use coursewright_core::{
    AssignmentDraft, ContainerShell, CourseShell, LessonPayload, LmsCredentials, LmsType,
    QuizQuestion, QuizShell, RemoteId,
};
use coursewright_error::LmsError;
use std::sync::Arc;

/// Creates course entities in an external LMS.
///
/// Callers depend only on this trait. Where a quiz or assignment is attached
/// is decided by the adapter through [`LmsAdapter::quiz_parent`] and
/// [`LmsAdapter::assignment_parent`].
#[async_trait]
pub trait LmsAdapter: Send + Sync {
    /// Dialect this adapter speaks.
    fn lms_type(&self) -> LmsType;

    /// Create the course shell.
    async fn create_course(&self, shell: &CourseShell) -> Result<RemoteId, LmsError>;

    /// Create a topic or section under `course_id`.
    async fn create_topic_or_section(
        &self,
        course_id: &RemoteId,
        shell: &ContainerShell,
    ) -> Result<RemoteId, LmsError>;

    /// Create a lesson under `parent_id`.
    async fn create_lesson(
        &self,
        parent_id: &RemoteId,
        payload: &LessonPayload,
    ) -> Result<RemoteId, LmsError>;

    /// Create an empty quiz under `parent_id`.
    async fn create_quiz(&self, parent_id: &RemoteId, shell: &QuizShell)
    -> Result<RemoteId, LmsError>;

    /// Add a question to a quiz. `order` starts at 1.
    async fn create_quiz_question(
        &self,
        quiz_id: &RemoteId,
        question: &QuizQuestion,
        order: u32,
    ) -> Result<RemoteId, LmsError>;

    /// Create an assignment under `parent_id`.
    async fn create_assignment(
        &self,
        parent_id: &RemoteId,
        draft: &AssignmentDraft,
    ) -> Result<RemoteId, LmsError>;

    /// Entity a topic's quiz attaches to, given the container and the
    /// lessons created inside it. `None` means there is nothing to attach to.
    fn quiz_parent(&self, container_id: &RemoteId, lesson_ids: &[RemoteId]) -> Option<RemoteId>;

    /// Entity a topic's assignment attaches to.
    fn assignment_parent(
        &self,
        container_id: &RemoteId,
        lesson_ids: &[RemoteId],
    ) -> Option<RemoteId>;
}

/// Builds an adapter from credentials, failing fast on an unknown dialect.
pub trait LmsConnector: Send + Sync {
    /// Connect using `credentials`.
    fn connect(&self, credentials: &LmsCredentials) -> Result<Arc<dyn LmsAdapter>, LmsError>;
}
