//! The step sequence of one generation run.
//!
//! Every remote creation is followed by a checkpoint write before the next
//! remote action. The checkpoint's task count only moves at those writes, so
//! a resumed run recounts exactly the work it redoes.

use crate::plan::{TASKS_PER_LESSON, TaskCounter, TaskPlan};
use crate::prompts::{self, LessonPrompt, LessonSection};
use crate::{
    DetailPatch, GenerationControl, GenerationError, GenerationErrorKind, GenerationSettings,
    ProgressObserver, ProgressUpdate, StatusPhase, TaskUpdate, parse_assignment, parse_questions,
    strip_tags,
};
use chrono::Utc;
use coursewright_core::{
    Completion, CompletionRequest, ContainerShell, Course, CourseGenerationRecord, CourseShell,
    GenerationCheckpoint, LessonCheckpoint, LessonContent, LessonPayload, LibraryAssignments,
    QuizShell, RemoteId, SkippedStep, TelemetryEvent, TelemetryEventKind, TokenUsage, Topic,
    TopicCheckpoint,
};
use coursewright_error::LmsError;
use coursewright_interface::{
    CompletionDriver, CourseRecordStore, LmsAdapter, RagDriver, RecoveryStore, WebResearch,
};
use coursewright_retry::{CallContext, CallError, CallThrottle, RetryExecutor};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// What a finished run hands back to the orchestrator.
#[derive(Debug)]
pub(crate) struct RunSummary {
    pub remote_course_id: RemoteId,
    pub token_usage: TokenUsage,
    pub completed_tasks: u32,
    pub skipped_steps: Vec<SkippedStep>,
}

/// Remote capabilities resolved for this run.
pub(crate) struct Drivers {
    pub lms: Arc<dyn LmsAdapter>,
    pub completion: Arc<dyn CompletionDriver>,
    pub rag: Option<Arc<dyn RagDriver>>,
    pub research: Option<Arc<dyn WebResearch>>,
}

/// Shared services borrowed from the orchestrator.
pub(crate) struct Services<'a> {
    pub executor: &'a RetryExecutor,
    pub store: &'a dyn RecoveryStore,
    pub records: &'a dyn CourseRecordStore,
    pub settings: &'a GenerationSettings,
}

pub(crate) struct Pipeline<'a> {
    course: &'a Course,
    libraries: &'a LibraryAssignments,
    drivers: Drivers,
    services: Services<'a>,
    control: &'a GenerationControl,
    cancel: CancellationToken,
    observer: &'a dyn ProgressObserver,
    throttle: CallThrottle,
    checkpoint: GenerationCheckpoint,
    counter: TaskCounter,
    usage: TokenUsage,
    skipped: Vec<SkippedStep>,
}

fn topic_finished(topic: &TopicCheckpoint) -> bool {
    topic.skipped || topic.assignment_done
}

fn join_context(topic: &str, lesson: &str) -> String {
    match (topic.trim().is_empty(), lesson.trim().is_empty()) {
        (true, _) => lesson.trim().to_string(),
        (_, true) => topic.trim().to_string(),
        _ => format!("{}\n\n{}", topic.trim(), lesson.trim()),
    }
}

impl<'a> Pipeline<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        course: &'a Course,
        libraries: &'a LibraryAssignments,
        drivers: Drivers,
        services: Services<'a>,
        control: &'a GenerationControl,
        observer: &'a dyn ProgressObserver,
        plan: TaskPlan,
        checkpoint: GenerationCheckpoint,
    ) -> Self {
        let counter = TaskCounter::new(checkpoint.completed_task_count, *plan.total_tasks());
        let usage = checkpoint.token_usage;
        let throttle = CallThrottle::new(services.settings.research_interval());
        Self {
            course,
            libraries,
            drivers,
            services,
            control,
            cancel: control.abort_signal(),
            observer,
            throttle,
            checkpoint,
            counter,
            usage,
            skipped: Vec::new(),
        }
    }

    /// Run every remaining step, then write the course record and drop the
    /// checkpoint.
    pub(crate) async fn run(&mut self) -> Result<RunSummary, GenerationError> {
        let resuming = self.checkpoint.lms_course_id.is_some();
        self.observer.on_task_update(TaskUpdate {
            completed_tasks: self.counter.completed(),
            total_tasks: self.counter.total(),
            current_task_label: if resuming { "Resuming" } else { "Starting" }.to_string(),
            detail: self.totals_detail(),
        });

        let course_id = self.ensure_course().await?;
        self.ensure_course_context().await?;
        for ti in 0..self.course.topics.len() {
            self.run_topic(ti, &course_id).await?;
        }

        if self.counter.completed() != self.counter.total() {
            warn!(
                completed = self.counter.completed(),
                total = self.counter.total(),
                "Task count did not reach the planned total"
            );
        }
        self.finish(course_id).await
    }

    /// Persist the failure with the running usage and return the checkpoint.
    ///
    /// The task count stays at the last durable boundary.
    pub(crate) async fn record_failure(&mut self, failure: &GenerationError) -> GenerationCheckpoint {
        self.checkpoint.token_usage = self.usage;
        self.checkpoint.last_error = Some(failure.kind.to_string());
        self.checkpoint.touch();
        if let Err(e) = self.services.store.save(&self.checkpoint).await {
            warn!(error = %e, "Could not persist checkpoint after failure");
        }
        self.checkpoint.clone()
    }

    async fn finish(&mut self, remote_course_id: RemoteId) -> Result<RunSummary, GenerationError> {
        let record = CourseGenerationRecord {
            course_id: self.course.id.clone(),
            checkpoint_key: self.checkpoint.key.clone(),
            remote_course_id: remote_course_id.clone(),
            lms_type: self.drivers.lms.lms_type().to_string(),
            token_usage: self.usage,
            completed_tasks: self.counter.completed(),
            skipped_steps: self.skipped.clone(),
            completed_at: Utc::now(),
        };
        self.services.records.save_record(&record).await?;

        self.services.executor.telemetry().record(
            TelemetryEvent::new("generation.token_usage", TelemetryEventKind::TokenUsage)
                .with_request_id(self.checkpoint.key.to_string())
                .with_token_usage(self.usage),
        );

        if let Err(e) = self.services.store.delete(&self.checkpoint.key).await {
            warn!(error = %e, key = %self.checkpoint.key, "Could not delete finished checkpoint");
        }

        info!(
            remote_course_id = %remote_course_id,
            total_tokens = *self.usage.total_tokens(),
            skipped = self.skipped.len(),
            "Course generation complete"
        );
        Ok(RunSummary {
            remote_course_id,
            token_usage: self.usage,
            completed_tasks: self.counter.completed(),
            skipped_steps: std::mem::take(&mut self.skipped),
        })
    }

    // Progress

    fn totals_detail(&self) -> DetailPatch {
        DetailPatch::default()
            .with_course_title(self.course.title.clone())
            .with_total_topics(self.course.topics.len() as u32)
            .with_total_lessons(self.course.lesson_count() as u32)
            .with_topics_completed(
                self.checkpoint
                    .topics
                    .iter()
                    .filter(|t| topic_finished(t))
                    .count() as u32,
            )
            .with_lessons_completed(
                self.checkpoint
                    .topics
                    .iter()
                    .map(|t| t.lessons.len() as u32)
                    .sum::<u32>(),
            )
    }

    fn announce(&self, message: String, label: &str, detail: DetailPatch) {
        self.observer.on_progress(
            ProgressUpdate::new(self.counter.percent(), message, StatusPhase::Loading)
                .with_task_label(label)
                .with_detail(detail),
        );
    }

    fn finish_task(&mut self, label: &str, detail: DetailPatch) {
        self.counter.advance();
        self.observer.on_task_update(TaskUpdate {
            completed_tasks: self.counter.completed(),
            total_tasks: self.counter.total(),
            current_task_label: label.to_string(),
            detail,
        });
    }

    async fn save(&mut self) -> Result<(), GenerationError> {
        self.checkpoint.completed_task_count = self.counter.completed();
        self.checkpoint.progress_percent = self.counter.percent();
        self.checkpoint.token_usage = self.usage;
        self.checkpoint.touch();
        self.services.store.save(&self.checkpoint).await.map_err(|e| {
            error!(error = %e, key = %self.checkpoint.key, "Checkpoint write failed");
            GenerationError::from(e)
        })
    }

    /// Recover a non-fatal failure by recording the step as skipped.
    fn recover(
        &mut self,
        failure: GenerationError,
        topic_id: &str,
        lesson_id: Option<&str>,
        step: &str,
    ) -> Result<(), GenerationError> {
        if failure.is_fatal() {
            return Err(failure);
        }
        warn!(topic = topic_id, lesson = ?lesson_id, step, error = %failure.kind, "Skipping step");
        self.note_skip(topic_id, lesson_id, step, failure.kind.to_string());
        Ok(())
    }

    fn note_skip(&mut self, topic_id: &str, lesson_id: Option<&str>, step: &str, reason: String) {
        self.skipped.push(SkippedStep {
            topic_id: topic_id.to_string(),
            lesson_id: lesson_id.map(str::to_string),
            step: step.to_string(),
            reason,
        });
    }

    // Remote calls

    async fn gate(&self) -> Result<(), GenerationError> {
        self.control.check_pause_status().await
    }

    fn request(
        &self,
        system: &str,
        user: String,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<CompletionRequest, GenerationError> {
        CompletionRequest::builder()
            .model(self.services.settings.model().clone())
            .system_prompt(system)
            .user_prompt(user)
            .max_tokens(max_tokens)
            .temperature(temperature)
            .build()
            .map_err(|e| GenerationError::new(GenerationErrorKind::Configuration(e.to_string())))
    }

    async fn complete(
        &mut self,
        operation: &str,
        request: CompletionRequest,
    ) -> Result<Completion, GenerationError> {
        self.gate().await?;
        let context = CallContext::new(operation)
            .with_model(request.model().clone())
            .with_request_data(serde_json::json!({ "prompt_chars": request.user_prompt().len() }));
        let driver = Arc::clone(&self.drivers.completion);
        let completion = self
            .services
            .executor
            .execute(&context, &self.cancel, || {
                let driver = Arc::clone(&driver);
                let request = request.clone();
                async move { driver.complete(&request).await }
            })
            .await
            .map_err(GenerationError::from_model_call)?;
        self.usage += *completion.usage();
        Ok(completion)
    }

    async fn complete_with_library(
        &mut self,
        driver: Arc<dyn RagDriver>,
        library: &str,
        request: CompletionRequest,
    ) -> Result<Completion, GenerationError> {
        self.gate().await?;
        let context = CallContext::new("lesson.reading_content.rag")
            .with_model(request.model().clone())
            .with_request_data(serde_json::json!({ "library": library }));
        let libraries = vec![library.to_string()];
        let completion = self
            .services
            .executor
            .execute(&context, &self.cancel, || {
                let driver = Arc::clone(&driver);
                let request = request.clone();
                let libraries = libraries.clone();
                async move { driver.complete_with_libraries(&libraries, &request).await }
            })
            .await
            .map_err(GenerationError::from_model_call)?;
        self.usage += *completion.usage();
        Ok(completion)
    }

    /// Web research for one scope. Failures other than abort yield `None`.
    async fn research(&mut self, operation: &str, query: String) -> Result<Option<String>, GenerationError> {
        let Some(driver) = self.drivers.research.clone() else {
            return Ok(None);
        };
        self.gate().await?;
        let context = CallContext::new(operation).with_model(driver.model_name().to_string());
        let result = self
            .services
            .executor
            .execute(&context, &self.cancel, || {
                let driver = Arc::clone(&driver);
                let query = query.clone();
                async move { driver.research(&query).await }
            })
            .await;
        match result {
            Ok(found) => {
                self.usage += *found.usage();
                Ok(Some(found.as_context()))
            }
            Err(CallError::Aborted) => Err(GenerationError::new(GenerationErrorKind::Aborted)),
            Err(CallError::Failed { error, attempts }) => {
                warn!(operation, attempts, error = %error, "Web research failed, continuing without it");
                Ok(None)
            }
        }
    }

    async fn lms_create<F, Fut>(&self, operation: &str, call: F) -> Result<RemoteId, GenerationError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<RemoteId, LmsError>>,
    {
        self.gate().await?;
        self.services
            .executor
            .execute(&CallContext::new(operation), &self.cancel, call)
            .await
            .map_err(GenerationError::from_lms_call)
    }

    // Course level

    async fn ensure_course(&mut self) -> Result<RemoteId, GenerationError> {
        if let Some(id) = &self.checkpoint.lms_course_id {
            info!(remote_course_id = %id, "Reusing course from checkpoint");
            return Ok(id.clone());
        }
        self.announce(
            format!("Creating course \"{}\"", self.course.title),
            "Create course",
            self.totals_detail(),
        );
        let lms = Arc::clone(&self.drivers.lms);
        let shell = CourseShell {
            title: self.course.title.clone(),
            description: self.course.description.clone(),
        };
        let id = self
            .lms_create("lms.create_course", || {
                let lms = Arc::clone(&lms);
                let shell = shell.clone();
                async move { lms.create_course(&shell).await }
            })
            .await?;
        info!(remote_course_id = %id, "Course created");
        self.checkpoint.lms_course_id = Some(id.clone());
        self.save().await?;
        Ok(id)
    }

    async fn ensure_course_context(&mut self) -> Result<(), GenerationError> {
        if !self.checkpoint.course_context_text.trim().is_empty() {
            return Ok(());
        }
        self.announce(
            "Generating course overview".to_string(),
            "Course overview",
            DetailPatch::default(),
        );
        let settings = self.services.settings;
        let request = self.request(
            prompts::COURSE_CONTEXT_SYSTEM,
            prompts::course_context(self.course),
            *settings.section_max_tokens(),
            *settings.temperature(),
        )?;
        let text = self.complete("course.context", request).await?.into_text();
        if text.trim().is_empty() {
            return Err(GenerationError::new(GenerationErrorKind::PartialContent(
                "course overview is empty".to_string(),
            )));
        }
        self.checkpoint.course_context_text = text;
        self.save().await
    }

    // Topic level

    #[instrument(skip(self, course_id), fields(topic = %self.course.topics[ti].id))]
    async fn run_topic(&mut self, ti: usize, course_id: &RemoteId) -> Result<(), GenerationError> {
        let course = self.course;
        let topic = &course.topics[ti];
        if topic_finished(&self.checkpoint.topics[ti]) {
            debug!("Topic already finished");
            return Ok(());
        }
        self.checkpoint.current_topic_index = ti;
        let detail = DetailPatch::default()
            .with_current_topic(topic.title.clone())
            .with_current_lesson(String::new());
        self.announce(
            format!("Topic {}/{}: {}", ti + 1, course.topics.len(), topic.title),
            "Create topic",
            detail.clone(),
        );

        let container = match self.checkpoint.topics[ti].topic_lms_id.clone() {
            Some(id) => id,
            None => {
                let lms = Arc::clone(&self.drivers.lms);
                let parent = course_id.clone();
                let shell = ContainerShell {
                    title: topic.title.clone(),
                    description: topic.learning_objective.clone(),
                    order: ti as u32 + 1,
                };
                let created = self
                    .lms_create("lms.create_topic", || {
                        let lms = Arc::clone(&lms);
                        let parent = parent.clone();
                        let shell = shell.clone();
                        async move { lms.create_topic_or_section(&parent, &shell).await }
                    })
                    .await;
                match created {
                    Ok(id) => {
                        self.checkpoint.topics[ti].topic_lms_id = Some(id.clone());
                        self.save().await?;
                        id
                    }
                    Err(e) => {
                        self.recover(e, &topic.id, None, "lms_topic")?;
                        return self.skip_topic(ti, detail).await;
                    }
                }
            }
        };

        if self.drivers.research.is_some() && self.checkpoint.topics[ti].research_context.is_none() {
            self.announce(
                format!("Researching \"{}\"", topic.title),
                "Web research",
                detail.clone(),
            );
            let found = self
                .research("topic.research", prompts::topic_research_query(course, topic))
                .await?;
            if found.is_none() {
                self.note_skip(&topic.id, None, "topic_research", "web research failed".to_string());
            }
            self.checkpoint.topics[ti].research_context = Some(found.unwrap_or_default());
            self.finish_task("Web research", detail.clone());
            self.save().await?;
        }

        if self.checkpoint.topics[ti].topic_introduction_text.is_none() {
            let settings = self.services.settings;
            let user = prompts::topic_intro(
                &self.checkpoint.course_context_text,
                topic,
                self.checkpoint.topics[ti]
                    .research_context
                    .as_deref()
                    .unwrap_or_default(),
            );
            let request = self.request(
                prompts::TOPIC_INTRO_SYSTEM,
                user,
                *settings.section_max_tokens(),
                *settings.temperature(),
            )?;
            let intro = match self.complete("topic.introduction", request).await {
                Ok(completion) => completion.into_text(),
                Err(e) => {
                    self.recover(e, &topic.id, None, "topic_introduction")?;
                    String::new()
                }
            };
            self.checkpoint.topics[ti].topic_introduction_text = Some(intro);
            self.save().await?;
        }

        for li in self.checkpoint.topics[ti].lessons.len()..topic.lessons.len() {
            self.run_lesson(ti, li, &container).await?;
        }

        let material = self.checkpoint.topics[ti].combined_plain_text();

        if !self.checkpoint.topics[ti].quiz_done {
            self.announce(format!("Creating quiz for \"{}\"", topic.title), "Create quiz", detail.clone());
            let lesson_ids = self.checkpoint.topics[ti].lesson_lms_ids();
            match self.drivers.lms.quiz_parent(&container, &lesson_ids) {
                Some(parent) => {
                    let lms = Arc::clone(&self.drivers.lms);
                    let shell = QuizShell {
                        title: format!("{} Quiz", topic.title),
                        description: format!("Check your understanding of {}.", topic.title),
                    };
                    let created = self
                        .lms_create("lms.create_quiz", || {
                            let lms = Arc::clone(&lms);
                            let parent = parent.clone();
                            let shell = shell.clone();
                            async move { lms.create_quiz(&parent, &shell).await }
                        })
                        .await;
                    match created {
                        Ok(id) => self.checkpoint.topics[ti].quiz_id = Some(id),
                        Err(e) => self.recover(e, &topic.id, None, "quiz")?,
                    }
                }
                None => self.note_skip(
                    &topic.id,
                    None,
                    "quiz",
                    "no created lesson to attach the quiz to".to_string(),
                ),
            }
            self.checkpoint.topics[ti].quiz_done = true;
            self.finish_task("Create quiz", detail.clone());
            self.save().await?;
        }

        if !self.checkpoint.topics[ti].quiz_questions_done {
            if let Some(quiz_id) = self.checkpoint.topics[ti].quiz_id.clone() {
                self.announce(
                    format!("Writing quiz questions for \"{}\"", topic.title),
                    "Quiz questions",
                    detail.clone(),
                );
                self.create_quiz_questions(topic, &quiz_id, &material).await?;
            }
            self.checkpoint.topics[ti].quiz_questions_done = true;
            self.finish_task("Quiz questions", detail.clone());
            self.save().await?;
        }

        self.announce(
            format!("Creating assignment for \"{}\"", topic.title),
            "Create assignment",
            detail.clone(),
        );
        let lesson_ids = self.checkpoint.topics[ti].lesson_lms_ids();
        match self.drivers.lms.assignment_parent(&container, &lesson_ids) {
            Some(parent) => self.create_assignment(topic, &parent, &material).await?,
            None => self.note_skip(
                &topic.id,
                None,
                "assignment",
                "no parent for the assignment".to_string(),
            ),
        }
        self.checkpoint.topics[ti].assignment_done = true;
        self.checkpoint.current_topic_index = ti + 1;
        self.checkpoint.current_lesson_index = 0;
        let topics_done = self.totals_detail().topics_completed.unwrap_or_default();
        self.finish_task("Create assignment", detail.with_topics_completed(topics_done));
        self.save().await
    }

    /// Mark a topic skipped, counting each of its remaining tasks.
    async fn skip_topic(&mut self, ti: usize, detail: DetailPatch) -> Result<(), GenerationError> {
        let topic = &self.course.topics[ti];
        let progress = &self.checkpoint.topics[ti];
        let mut remaining =
            topic.lessons.len().saturating_sub(progress.lessons.len()) as u32 * TASKS_PER_LESSON;
        if self.drivers.research.is_some() && progress.research_context.is_none() {
            remaining += 1;
        }
        remaining += [
            progress.quiz_done,
            progress.quiz_questions_done,
            progress.assignment_done,
        ]
        .iter()
        .filter(|done| !**done)
        .count() as u32;

        warn!(topic = %topic.id, remaining, "Skipping topic");
        for _ in 0..remaining {
            self.finish_task("Skipped", detail.clone());
        }
        let progress = &mut self.checkpoint.topics[ti];
        progress.skipped = true;
        self.checkpoint.current_topic_index = ti + 1;
        self.checkpoint.current_lesson_index = 0;
        self.save().await
    }

    async fn create_quiz_questions(
        &mut self,
        topic: &Topic,
        quiz_id: &RemoteId,
        material: &str,
    ) -> Result<(), GenerationError> {
        if material.trim().is_empty() {
            self.note_skip(&topic.id, None, "quiz_questions", "no lesson text".to_string());
            return Ok(());
        }
        let settings = self.services.settings;
        let count = *settings.quiz_question_count();
        let request = self.request(
            prompts::QUIZ_SYSTEM,
            prompts::quiz_questions(topic, material, count),
            *settings.section_max_tokens() * 2,
            *settings.structured_temperature(),
        )?;
        let raw = match self.complete("topic.quiz_questions", request).await {
            Ok(completion) => completion.into_text(),
            Err(e) => return self.recover(e, &topic.id, None, "quiz_questions"),
        };
        let questions = match parse_questions(&raw, count) {
            Ok(questions) => questions,
            Err(e) => return self.recover(e, &topic.id, None, "quiz_questions"),
        };

        let mut created = 0usize;
        for (i, question) in questions.iter().enumerate() {
            let lms = Arc::clone(&self.drivers.lms);
            let quiz = quiz_id.clone();
            let order = i as u32 + 1;
            let result = self
                .lms_create("lms.create_quiz_question", || {
                    let lms = Arc::clone(&lms);
                    let quiz = quiz.clone();
                    let question = question.clone();
                    async move { lms.create_quiz_question(&quiz, &question, order).await }
                })
                .await;
            match result {
                Ok(_) => created += 1,
                Err(e) => self.recover(e, &topic.id, None, "quiz_question")?,
            }
        }
        info!(topic = %topic.id, created, generated = questions.len(), "Quiz questions created");
        Ok(())
    }

    async fn create_assignment(
        &mut self,
        topic: &Topic,
        parent: &RemoteId,
        material: &str,
    ) -> Result<(), GenerationError> {
        if material.trim().is_empty() {
            self.note_skip(&topic.id, None, "assignment", "no lesson text".to_string());
            return Ok(());
        }
        let settings = self.services.settings;
        let request = self.request(
            prompts::ASSIGNMENT_SYSTEM,
            prompts::assignment(topic, material),
            *settings.section_max_tokens(),
            *settings.structured_temperature(),
        )?;
        let raw = match self.complete("topic.assignment", request).await {
            Ok(completion) => completion.into_text(),
            Err(e) => return self.recover(e, &topic.id, None, "assignment"),
        };
        let draft = match parse_assignment(&raw) {
            Ok(draft) => draft,
            Err(e) => return self.recover(e, &topic.id, None, "assignment"),
        };

        let lms = Arc::clone(&self.drivers.lms);
        let parent = parent.clone();
        let result = self
            .lms_create("lms.create_assignment", || {
                let lms = Arc::clone(&lms);
                let parent = parent.clone();
                let draft = draft.clone();
                async move { lms.create_assignment(&parent, &draft).await }
            })
            .await;
        match result {
            Ok(id) => {
                debug!(assignment = %id, "Assignment created");
                Ok(())
            }
            Err(e) => self.recover(e, &topic.id, None, "assignment"),
        }
    }

    // Lesson level

    #[instrument(skip(self, container), fields(lesson = %self.course.topics[ti].lessons[li].id))]
    async fn run_lesson(
        &mut self,
        ti: usize,
        li: usize,
        container: &RemoteId,
    ) -> Result<(), GenerationError> {
        let course = self.course;
        let topic = &course.topics[ti];
        let lesson = &topic.lessons[li];
        self.checkpoint.current_lesson_index = li;
        let detail = DetailPatch::default()
            .with_current_topic(topic.title.clone())
            .with_current_lesson(lesson.title.clone());
        self.announce(
            format!("Lesson {}/{}: {}", li + 1, topic.lessons.len(), lesson.title),
            "Reading content",
            detail.clone(),
        );

        let course_context = self.checkpoint.course_context_text.clone();
        let progress = &self.checkpoint.topics[ti];
        let intro = progress.topic_introduction_text.clone().unwrap_or_default();
        let topic_research = progress.research_context.clone().unwrap_or_default();

        let mut prompt = LessonPrompt {
            course_context: &course_context,
            topic,
            topic_intro: &intro,
            lesson,
            web_context: &topic_research,
        };

        let lesson_research = if self.drivers.research.is_some() {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(GenerationError::new(GenerationErrorKind::Aborted));
                }
                _ = self.throttle.wait() => {}
            }
            self.research("lesson.research", prompt.research_query())
                .await?
                .unwrap_or_default()
        } else {
            String::new()
        };
        let web_context = join_context(&topic_research, &lesson_research);
        prompt.web_context = &web_context;

        let library = self
            .libraries
            .effective_library(topic, lesson)
            .map(str::to_string);
        let reading = self.generate_reading(&prompt, library.as_deref()).await?;
        let mut content = LessonContent {
            reading_plain: strip_tags(reading.text()),
            usage: *reading.usage(),
            reading_html: reading.into_text(),
            ..Default::default()
        };
        self.finish_task("Reading content", detail.clone());

        let settings = self.services.settings;
        for section in LessonSection::ALL {
            let request = self.request(
                section.system_prompt(),
                prompt.section(section, &content.reading_plain),
                *settings.section_max_tokens(),
                *settings.temperature(),
            )?;
            let text = match self.complete(&format!("lesson.{}", section), request).await {
                Ok(completion) => {
                    content.usage += *completion.usage();
                    completion.into_text()
                }
                Err(e) => {
                    self.recover(e, &topic.id, Some(&lesson.id), &section.to_string())?;
                    String::new()
                }
            };
            match section {
                LessonSection::Faq => content.faq = text,
                LessonSection::LatestDevelopments => content.latest_developments = text,
                LessonSection::AdditionalReading => content.additional_reading = text,
                LessonSection::Slides => content.slides = text,
                LessonSection::VoiceOver => content.voice_over = text,
            }
            self.finish_task(section.label(), detail.clone());
        }
        debug!(total_tokens = *content.usage.total_tokens(), "Lesson content generated");

        self.announce(
            format!("Publishing lesson \"{}\"", lesson.title),
            "Create lesson",
            detail.clone(),
        );
        let lms = Arc::clone(&self.drivers.lms);
        let parent = container.clone();
        let payload = LessonPayload::from_content(lesson.title.clone(), li as u32 + 1, &content);
        let created = self
            .lms_create("lms.create_lesson", || {
                let lms = Arc::clone(&lms);
                let parent = parent.clone();
                let payload = payload.clone();
                async move { lms.create_lesson(&parent, &payload).await }
            })
            .await;
        let (lesson_lms_id, skipped) = match created {
            Ok(id) => (Some(id), false),
            Err(e) => {
                self.recover(e, &topic.id, Some(&lesson.id), "lms_lesson")?;
                (None, true)
            }
        };

        self.checkpoint.topics[ti].lessons.push(LessonCheckpoint {
            lesson_id: lesson.id.clone(),
            lesson_lms_id,
            plain_text: content.reading_plain,
            skipped,
        });
        self.checkpoint.current_lesson_index = li + 1;
        let lessons_done = self.totals_detail().lessons_completed.unwrap_or_default();
        self.finish_task("Create lesson", detail.with_lessons_completed(lessons_done));
        self.save().await
    }

    /// Main reading, through the knowledge library when one applies.
    ///
    /// Any library failure other than abort, or an empty library answer,
    /// falls back to plain completion of the same prompt without the
    /// retrieval instruction.
    async fn generate_reading(
        &mut self,
        prompt: &LessonPrompt<'_>,
        library: Option<&str>,
    ) -> Result<Completion, GenerationError> {
        let settings = self.services.settings;
        if let Some(library) = library {
            match self.drivers.rag.clone() {
                Some(driver) => {
                    let request = self.request(
                        prompts::READING_SYSTEM,
                        prompt.reading(true),
                        *settings.reading_max_tokens(),
                        *settings.temperature(),
                    )?;
                    match self.complete_with_library(driver, library, request).await {
                        Ok(completion) if !completion.text().trim().is_empty() => {
                            return Ok(completion);
                        }
                        Ok(_) => warn!(library, "Knowledge library returned nothing, using plain completion"),
                        Err(e) if e.is_aborted() => return Err(e),
                        Err(e) => warn!(library, error = %e.kind, "Knowledge library failed, using plain completion"),
                    }
                }
                None => warn!(library, "No knowledge library driver, using plain completion"),
            }
        }

        let request = self.request(
            prompts::READING_SYSTEM,
            prompt.reading(false),
            *settings.reading_max_tokens(),
            *settings.temperature(),
        )?;
        let completion = self.complete("lesson.reading_content", request).await?;
        if completion.text().trim().is_empty() {
            return Err(GenerationError::new(GenerationErrorKind::PartialContent(
                format!("reading for lesson \"{}\" is empty", prompt.lesson.title),
            )));
        }
        Ok(completion)
    }
}
