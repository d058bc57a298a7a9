//! Scripted capabilities for orchestrator tests.
//!
//! Every double records what it was asked to do so tests can assert on call
//! counts, ordering and timing without a network.

#![allow(dead_code)]

use async_trait::async_trait;
use coursewright_core::{
    AssignmentDraft, Citation, Completion, CompletionRequest, ContainerShell, Course, CourseShell,
    Lesson, LessonPayload, LmsCredentials, LmsType, QuizQuestion, QuizShell, RemoteId,
    ResearchResult, TokenUsage, Topic,
};
use coursewright_error::{LmsError, LmsErrorKind, ModelError, ModelErrorKind};
use coursewright_generation::{
    GenerationControl, GenerationOrchestrator, GenerationRequest, GenerationSettings,
    ProgressObserver, ProgressUpdate, TaskUpdate, prompts,
};
use coursewright_interface::{
    CompletionDriver, LmsAdapter, LmsConnector, ProviderFactory, RagDriver, WebResearch,
};
use coursewright_retry::{RetryExecutor, RetryPolicy};
use coursewright_storage::{InMemoryRecoveryStore, InMemoryTelemetrySink};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// API key the scripted provider factory refuses.
pub const REJECTED_KEY: &str = "sk-rejected";

pub const DEFAULT_QUIZ: &str = r#"Here are the questions:
```json
{"questions": [
  {"type": "single_choice", "question": "What does a move do?", "options": ["Copies the value", "Transfers ownership"], "correct": 1},
  {"type": "multiple_choice", "question": "Which are references?", "options": ["&T", "&mut T", "Box<T>"], "correct": [0, 1]},
  {"type": "fill_in_blank", "question": "Every value has exactly one ___.", "answers": ["owner"]}
]}
```"#;

fn model_error(status: u16) -> ModelError {
    ModelError::new(ModelErrorKind::Http {
        status,
        message: "scripted failure".to_string(),
        retry_after: None,
    })
}

fn lesson_title(user_prompt: &str) -> String {
    user_prompt
        .lines()
        .find_map(|line| line.strip_prefix("Lesson: "))
        .unwrap_or("lesson")
        .to_string()
}

// Completion

#[derive(Debug, Clone)]
pub struct CompletionCall {
    pub system: String,
    pub user: String,
    pub at: Instant,
}

#[derive(Debug, Clone)]
struct FailureRule {
    system: &'static str,
    needle: Option<String>,
    remaining: u32,
    status: u16,
}

/// Answers by system prompt. Every answer reports usage except the FAQ.
#[derive(Default)]
pub struct ScriptedCompletion {
    calls: Mutex<Vec<CompletionCall>>,
    failures: Mutex<Vec<FailureRule>>,
    usage: Mutex<TokenUsage>,
    quiz_response: Mutex<Option<String>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` calls with `system` whose user prompt contains
    /// `needle`.
    pub fn fail(&self, system: &'static str, needle: Option<&str>, times: u32, status: u16) {
        self.failures.lock().unwrap().push(FailureRule {
            system,
            needle: needle.map(str::to_string),
            remaining: times,
            status,
        });
    }

    pub fn set_quiz_response(&self, raw: &str) {
        *self.quiz_response.lock().unwrap() = Some(raw.to_string());
    }

    pub fn calls(&self) -> Vec<CompletionCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_with(&self, system: &str) -> Vec<CompletionCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.system == system)
            .collect()
    }

    /// Usage of every successful answer.
    pub fn usage(&self) -> TokenUsage {
        *self.usage.lock().unwrap()
    }

    fn take_failure(&self, system: &str, user: &str) -> Option<u16> {
        let mut failures = self.failures.lock().unwrap();
        let rule = failures.iter_mut().find(|r| {
            r.remaining > 0
                && r.system == system
                && r.needle.as_deref().is_none_or(|n| user.contains(n))
        })?;
        rule.remaining -= 1;
        Some(rule.status)
    }
}

#[async_trait]
impl CompletionDriver for ScriptedCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ModelError> {
        let system = request.system_prompt().as_str();
        let user = request.user_prompt().as_str();
        self.calls.lock().unwrap().push(CompletionCall {
            system: system.to_string(),
            user: user.to_string(),
            at: Instant::now(),
        });
        if let Some(status) = self.take_failure(system, user) {
            return Err(model_error(status));
        }

        let usage = Some(TokenUsage::new(10, 20));
        let (text, usage) = if system == prompts::COURSE_CONTEXT_SYSTEM {
            ("An overview of ownership in Rust.".to_string(), usage)
        } else if system == prompts::TOPIC_INTRO_SYSTEM {
            ("<p>This topic introduces ownership.</p>".to_string(), usage)
        } else if system == prompts::READING_SYSTEM {
            (
                format!(
                    "<h2>{}</h2><p>Reading about {} &amp; friends.</p>",
                    lesson_title(user),
                    lesson_title(user)
                ),
                Some(TokenUsage::new(100, 400)),
            )
        } else if system == prompts::FAQ_SYSTEM {
            ("<h3>Why?</h3><p>Because.</p>".to_string(), None)
        } else if system == prompts::QUIZ_SYSTEM {
            let quiz = self
                .quiz_response
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| DEFAULT_QUIZ.to_string());
            (quiz, usage)
        } else if system == prompts::ASSIGNMENT_SYSTEM {
            (
                r#"{"title": "Fix the borrow checker errors", "content": "<p>Make the program compile.</p>"}"#
                    .to_string(),
                usage,
            )
        } else {
            ("<p>Section text.</p>".to_string(), usage)
        };
        if let Some(usage) = usage {
            *self.usage.lock().unwrap() += usage;
        }
        Ok(Completion::new(text, usage))
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

// Retrieval

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RagMode {
    Answer,
    Fail,
    Empty,
}

pub struct ScriptedRag {
    mode: Mutex<RagMode>,
    calls: Mutex<Vec<Vec<String>>>,
    usage: Mutex<TokenUsage>,
}

impl Default for ScriptedRag {
    fn default() -> Self {
        Self {
            mode: Mutex::new(RagMode::Answer),
            calls: Mutex::new(Vec::new()),
            usage: Mutex::new(TokenUsage::default()),
        }
    }
}

impl ScriptedRag {
    pub fn set_mode(&self, mode: RagMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn usage(&self) -> TokenUsage {
        *self.usage.lock().unwrap()
    }
}

#[async_trait]
impl RagDriver for ScriptedRag {
    async fn complete_with_libraries(
        &self,
        library_ids: &[String],
        request: &CompletionRequest,
    ) -> Result<Completion, ModelError> {
        self.calls.lock().unwrap().push(library_ids.to_vec());
        let mode = *self.mode.lock().unwrap();
        match mode {
            RagMode::Fail => Err(model_error(404)),
            RagMode::Empty => Ok(Completion::new("  ", None)),
            RagMode::Answer => {
                let usage = TokenUsage::new(50, 50);
                *self.usage.lock().unwrap() += usage;
                Ok(Completion::new(
                    format!("<p>From the library: {}</p>", lesson_title(request.user_prompt())),
                    Some(usage),
                ))
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "scripted-rag"
    }
}

// Research

#[derive(Default)]
pub struct ScriptedResearch {
    calls: Mutex<Vec<(String, Instant)>>,
    usage: Mutex<TokenUsage>,
}

impl ScriptedResearch {
    pub fn calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn usage(&self) -> TokenUsage {
        *self.usage.lock().unwrap()
    }
}

#[async_trait]
impl WebResearch for ScriptedResearch {
    async fn research(&self, query: &str) -> Result<ResearchResult, ModelError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), Instant::now()));
        let usage = TokenUsage::new(3, 4);
        *self.usage.lock().unwrap() += usage;
        Ok(ResearchResult::new(
            "Recent changes in the ecosystem.",
            vec![Citation::new("https://example.org/news", None)],
            Some(usage),
        ))
    }

    fn model_name(&self) -> &str {
        "scripted-search"
    }
}

// LMS

#[derive(Debug, Clone)]
pub struct LmsOp {
    pub kind: &'static str,
    pub parent: Option<RemoteId>,
    pub title: String,
    pub id: RemoteId,
}

pub struct RecordingLms {
    lms_type: LmsType,
    next_id: AtomicU64,
    ops: Mutex<Vec<LmsOp>>,
    failures: Mutex<Vec<(&'static str, u32, u16)>>,
}

impl RecordingLms {
    pub fn new(lms_type: LmsType) -> Self {
        Self {
            lms_type,
            next_id: AtomicU64::new(100),
            ops: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next `times` creations of `kind`.
    pub fn fail(&self, kind: &'static str, times: u32, status: u16) {
        self.failures.lock().unwrap().push((kind, times, status));
    }

    pub fn ops(&self) -> Vec<LmsOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn ops_of(&self, kind: &str) -> Vec<LmsOp> {
        self.ops().into_iter().filter(|op| op.kind == kind).collect()
    }

    fn record(
        &self,
        kind: &'static str,
        parent: Option<&RemoteId>,
        title: &str,
    ) -> Result<RemoteId, LmsError> {
        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(rule) = failures.iter_mut().find(|r| r.0 == kind && r.1 > 0) {
                rule.1 -= 1;
                return Err(LmsError::new(LmsErrorKind::Http {
                    status: rule.2,
                    message: "scripted failure".to_string(),
                    retry_after: None,
                }));
            }
        }
        let id = RemoteId::from(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.ops.lock().unwrap().push(LmsOp {
            kind,
            parent: parent.cloned(),
            title: title.to_string(),
            id: id.clone(),
        });
        Ok(id)
    }
}

#[async_trait]
impl LmsAdapter for RecordingLms {
    fn lms_type(&self) -> LmsType {
        self.lms_type
    }

    async fn create_course(&self, shell: &CourseShell) -> Result<RemoteId, LmsError> {
        self.record("course", None, &shell.title)
    }

    async fn create_topic_or_section(
        &self,
        course_id: &RemoteId,
        shell: &ContainerShell,
    ) -> Result<RemoteId, LmsError> {
        self.record("topic", Some(course_id), &shell.title)
    }

    async fn create_lesson(
        &self,
        parent_id: &RemoteId,
        payload: &LessonPayload,
    ) -> Result<RemoteId, LmsError> {
        self.record("lesson", Some(parent_id), &payload.title)
    }

    async fn create_quiz(&self, parent_id: &RemoteId, shell: &QuizShell) -> Result<RemoteId, LmsError> {
        self.record("quiz", Some(parent_id), &shell.title)
    }

    async fn create_quiz_question(
        &self,
        quiz_id: &RemoteId,
        question: &QuizQuestion,
        _order: u32,
    ) -> Result<RemoteId, LmsError> {
        self.record("quiz_question", Some(quiz_id), question.prompt())
    }

    async fn create_assignment(
        &self,
        parent_id: &RemoteId,
        draft: &AssignmentDraft,
    ) -> Result<RemoteId, LmsError> {
        self.record("assignment", Some(parent_id), &draft.title)
    }

    fn quiz_parent(&self, container_id: &RemoteId, lesson_ids: &[RemoteId]) -> Option<RemoteId> {
        match self.lms_type {
            LmsType::TopicBased => Some(container_id.clone()),
            LmsType::SectionBased => lesson_ids.first().cloned(),
        }
    }

    fn assignment_parent(&self, container_id: &RemoteId, _lesson_ids: &[RemoteId]) -> Option<RemoteId> {
        Some(container_id.clone())
    }
}

pub struct ScriptedConnector {
    pub lms: Arc<RecordingLms>,
}

impl LmsConnector for ScriptedConnector {
    fn connect(&self, credentials: &LmsCredentials) -> Result<Arc<dyn LmsAdapter>, LmsError> {
        credentials
            .lms_type
            .parse::<LmsType>()
            .map_err(|_| LmsError::new(LmsErrorKind::UnknownVariant(credentials.lms_type.clone())))?;
        let adapter: Arc<dyn LmsAdapter> = self.lms.clone();
        Ok(adapter)
    }
}

pub struct ScriptedProviders {
    pub completion: Arc<ScriptedCompletion>,
    pub rag: Arc<ScriptedRag>,
    pub research: Arc<ScriptedResearch>,
}

impl ProviderFactory for ScriptedProviders {
    fn completion(&self, api_key: &str) -> Result<Arc<dyn CompletionDriver>, ModelError> {
        if api_key == REJECTED_KEY {
            return Err(model_error(401));
        }
        let driver: Arc<dyn CompletionDriver> = self.completion.clone();
        Ok(driver)
    }

    fn rag(&self, _api_key: &str) -> Option<Arc<dyn RagDriver>> {
        let driver: Arc<dyn RagDriver> = self.rag.clone();
        Some(driver)
    }

    fn research(&self, _api_key: &str) -> Option<Arc<dyn WebResearch>> {
        let driver: Arc<dyn WebResearch> = self.research.clone();
        Some(driver)
    }
}

// Progress

/// Records callbacks and can pause or abort the run at a task count.
pub struct RecordingObserver {
    control: GenerationControl,
    progress: Mutex<Vec<ProgressUpdate>>,
    tasks: Mutex<Vec<TaskUpdate>>,
    abort_at: Option<u32>,
    pause_at: Option<(u32, Duration)>,
    paused_at: Mutex<Option<Instant>>,
}

impl RecordingObserver {
    pub fn new(control: &GenerationControl) -> Self {
        Self {
            control: control.clone(),
            progress: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
            abort_at: None,
            pause_at: None,
            paused_at: Mutex::new(None),
        }
    }

    pub fn abort_at(mut self, completed_tasks: u32) -> Self {
        self.abort_at = Some(completed_tasks);
        self
    }

    pub fn pause_at(mut self, completed_tasks: u32, duration: Duration) -> Self {
        self.pause_at = Some((completed_tasks, duration));
        self
    }

    pub fn progress(&self) -> Vec<ProgressUpdate> {
        self.progress.lock().unwrap().clone()
    }

    pub fn tasks(&self) -> Vec<TaskUpdate> {
        self.tasks.lock().unwrap().clone()
    }

    pub fn paused_at(&self) -> Option<Instant> {
        *self.paused_at.lock().unwrap()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_progress(&self, update: ProgressUpdate) {
        self.progress.lock().unwrap().push(update);
    }

    fn on_task_update(&self, update: TaskUpdate) {
        if self.abort_at == Some(update.completed_tasks) {
            self.control.abort();
        }
        if let Some((at, duration)) = self.pause_at {
            let mut paused_at = self.paused_at.lock().unwrap();
            if update.completed_tasks == at && paused_at.is_none() {
                self.control.pause();
                *paused_at = Some(Instant::now());
                let control = self.control.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(duration).await;
                    control.resume();
                });
            }
        }
        self.tasks.lock().unwrap().push(update);
    }
}

// Fixtures

pub fn lesson(id: &str, title: &str) -> Lesson {
    Lesson {
        id: id.to_string(),
        title: title.to_string(),
        description: format!("All about {}", title.to_lowercase()),
        additional_context: None,
        knowledge_library_id: None,
    }
}

/// One topic with two lessons: 17 tasks without research, 18 with.
pub fn sample_course() -> Course {
    Course {
        id: "rust-101".to_string(),
        title: "Rust Ownership".to_string(),
        description: "Moves, borrows and lifetimes".to_string(),
        topics: vec![Topic {
            id: "t1".to_string(),
            title: "Ownership".to_string(),
            learning_objective: "Explain who owns a value".to_string(),
            additional_context: None,
            knowledge_library_id: None,
            lessons: vec![lesson("l1", "Moves"), lesson("l2", "Borrowing")],
        }],
    }
}

/// Two topics of two lessons each: 34 tasks.
pub fn two_topic_course() -> Course {
    let mut course = sample_course();
    course.topics.push(Topic {
        id: "t2".to_string(),
        title: "Lifetimes".to_string(),
        learning_objective: "Read lifetime annotations".to_string(),
        additional_context: None,
        knowledge_library_id: None,
        lessons: vec![lesson("l3", "Elision"), lesson("l4", "Variance")],
    });
    course
}

pub fn credentials(lms_type: &str) -> LmsCredentials {
    LmsCredentials {
        lms_type: lms_type.to_string(),
        base_url: "https://lms.example.org/api".to_string(),
        username: "author".to_string(),
        password: "secret".to_string(),
    }
}

/// Wires the doubles into an orchestrator backed by in-memory stores.
pub struct Harness {
    pub completion: Arc<ScriptedCompletion>,
    pub rag: Arc<ScriptedRag>,
    pub research: Arc<ScriptedResearch>,
    pub lms: Arc<RecordingLms>,
    pub store: Arc<InMemoryRecoveryStore>,
    pub telemetry: Arc<InMemoryTelemetrySink>,
    pub settings: GenerationSettings,
}

impl Harness {
    pub fn new(lms_type: LmsType) -> Self {
        Self {
            completion: Arc::new(ScriptedCompletion::new()),
            rag: Arc::new(ScriptedRag::default()),
            research: Arc::new(ScriptedResearch::default()),
            lms: Arc::new(RecordingLms::new(lms_type)),
            store: Arc::new(InMemoryRecoveryStore::new()),
            telemetry: Arc::new(InMemoryTelemetrySink::new()),
            settings: GenerationSettings::default(),
        }
    }

    pub fn orchestrator(&self) -> GenerationOrchestrator {
        let providers = ScriptedProviders {
            completion: self.completion.clone(),
            rag: self.rag.clone(),
            research: self.research.clone(),
        };
        GenerationOrchestrator::new(
            Arc::new(providers),
            Arc::new(ScriptedConnector {
                lms: self.lms.clone(),
            }),
            self.store.clone(),
            self.store.clone(),
            RetryExecutor::new(RetryPolicy::default(), self.telemetry.clone()),
            self.settings.clone(),
        )
    }

    pub fn request(&self, course: Course) -> GenerationRequest {
        let lms_type = self.lms.lms_type().to_string();
        GenerationRequest::new(course, credentials(&lms_type), "sk-test")
    }
}
