//! Entry point of a generation run.

use crate::pipeline::{Drivers, Pipeline, RunSummary, Services};
use crate::{
    GenerationControl, GenerationError, GenerationErrorKind, GenerationOptions,
    GenerationSettings, ProgressObserver, ProgressUpdate, StatusPhase, TaskPlan,
};
use coursewright_core::{
    CheckpointKey, Course, GenerationCheckpoint, LibraryAssignments, LmsCredentials, RemoteId,
    SkippedStep, TokenUsage,
};
use coursewright_interface::{
    CourseRecordStore, LmsConnector, ProviderFactory, RecoveryStore, WebResearch,
};
use coursewright_retry::RetryExecutor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Everything a run needs from the caller.
#[derive(Clone, derive_setters::Setters)]
#[setters(prefix = "with_", strip_option)]
pub struct GenerationRequest {
    /// Course tree to generate
    #[setters(skip)]
    pub course: Course,
    /// Target LMS
    #[setters(skip)]
    pub lms_credentials: LmsCredentials,
    /// Key for the completion provider
    #[setters(skip)]
    pub llm_api_key: String,
    /// Knowledge library per topic or lesson
    pub library_assignments: LibraryAssignments,
    /// Optional features
    pub options: GenerationOptions,
    /// Resume under this key instead of the one derived from the course id
    pub checkpoint_key: Option<CheckpointKey>,
}

impl GenerationRequest {
    /// Request with no library assignments and default options.
    pub fn new(course: Course, lms_credentials: LmsCredentials, llm_api_key: impl Into<String>) -> Self {
        Self {
            course,
            lms_credentials,
            llm_api_key: llm_api_key.into(),
            library_assignments: LibraryAssignments::default(),
            options: GenerationOptions::default(),
            checkpoint_key: None,
        }
    }

    /// Key the run checkpoints under.
    pub fn checkpoint_key(&self) -> CheckpointKey {
        self.checkpoint_key
            .clone()
            .unwrap_or_else(|| CheckpointKey::for_course(&self.course))
    }
}

impl std::fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("course", &self.course.id)
            .field("lms_credentials", &self.lms_credentials)
            .field("llm_api_key", &"<redacted>")
            .field("library_assignments", &self.library_assignments)
            .field("options", &self.options)
            .field("checkpoint_key", &self.checkpoint_key)
            .finish()
    }
}

/// Result of a run that reached the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    /// Always true; failures are returned as [`GenerationError`]
    pub success: bool,
    /// Course id in the LMS
    pub remote_course_id: RemoteId,
    /// Usage of every model call, earlier interrupted runs included
    pub token_usage: TokenUsage,
    /// Tasks counted, equal to `total_tasks` on a complete run
    pub completed_tasks: u32,
    /// Planned tasks
    pub total_tasks: u32,
    /// Steps recovered by skipping
    pub skipped_steps: Vec<SkippedStep>,
    /// Key the run checkpointed under
    pub checkpoint_key: CheckpointKey,
}

/// Drives course generation against the injected capabilities.
///
/// One orchestrator can serve many runs; each run gets its own
/// [`GenerationControl`] and observer.
pub struct GenerationOrchestrator {
    providers: Arc<dyn ProviderFactory>,
    lms: Arc<dyn LmsConnector>,
    store: Arc<dyn RecoveryStore>,
    records: Arc<dyn CourseRecordStore>,
    executor: RetryExecutor,
    settings: GenerationSettings,
}

impl GenerationOrchestrator {
    /// Create an orchestrator. `store` must already be initialized.
    pub fn new(
        providers: Arc<dyn ProviderFactory>,
        lms: Arc<dyn LmsConnector>,
        store: Arc<dyn RecoveryStore>,
        records: Arc<dyn CourseRecordStore>,
        executor: RetryExecutor,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            providers,
            lms,
            store,
            records,
            executor,
            settings,
        }
    }

    /// Active settings.
    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Generate the course described by `request`, resuming from its
    /// checkpoint when one exists.
    ///
    /// The observer always receives a final terminal update. On failure the
    /// returned error carries the checkpoint the next run resumes from.
    #[instrument(
        skip_all,
        fields(course = %request.course.id, lms_type = %request.lms_credentials.lms_type)
    )]
    pub async fn start(
        &self,
        request: GenerationRequest,
        control: &GenerationControl,
        observer: &dyn ProgressObserver,
    ) -> Result<GenerationOutcome, GenerationError> {
        let result = self.run(request, control, observer).await;
        match &result {
            Ok(outcome) => {
                observer.on_progress(
                    ProgressUpdate::new(
                        100.0,
                        format!("Course generated ({} tasks)", outcome.completed_tasks),
                        StatusPhase::Success,
                    )
                    .terminal(),
                );
            }
            Err(e) => {
                if e.is_aborted() {
                    warn!("Generation aborted");
                } else {
                    error!(error = %e, "Generation failed");
                }
                let percent = e
                    .checkpoint
                    .as_ref()
                    .map(|cp| cp.progress_percent)
                    .unwrap_or_default();
                observer.on_progress(
                    ProgressUpdate::new(percent, e.user_message(), StatusPhase::Error).terminal(),
                );
            }
        }
        result
    }

    async fn run(
        &self,
        request: GenerationRequest,
        control: &GenerationControl,
        observer: &dyn ProgressObserver,
    ) -> Result<GenerationOutcome, GenerationError> {
        validate(&request)?;

        let lms = self.lms.connect(&request.lms_credentials)?;
        let completion = self.providers.completion(&request.llm_api_key)?;
        let rag = self.providers.rag(&request.llm_api_key);
        let research = self.research_driver(&request);

        let plan = TaskPlan::for_course(&request.course, research.is_some());
        let key = request.checkpoint_key();
        info!(
            key = %key,
            total_tasks = *plan.total_tasks(),
            research = research.is_some(),
            "Starting generation"
        );

        // Held until this future completes or is dropped.
        let Some(lease) = self.store.acquire_lease(&key).await? else {
            return Err(GenerationError::new(GenerationErrorKind::RunInProgress(
                key.to_string(),
            )));
        };

        let drivers = Drivers {
            lms,
            completion,
            rag,
            research,
        };
        let result = self
            .run_leased(&request, &key, plan, drivers, control, observer)
            .await;
        drop(lease);
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_leased(
        &self,
        request: &GenerationRequest,
        key: &CheckpointKey,
        plan: TaskPlan,
        drivers: Drivers,
        control: &GenerationControl,
        observer: &dyn ProgressObserver,
    ) -> Result<GenerationOutcome, GenerationError> {
        let checkpoint = self.load_checkpoint(key, &request.course, plan).await?;

        let services = Services {
            executor: &self.executor,
            store: self.store.as_ref(),
            records: self.records.as_ref(),
            settings: &self.settings,
        };
        let mut pipeline = Pipeline::new(
            &request.course,
            &request.library_assignments,
            drivers,
            services,
            control,
            observer,
            plan,
            checkpoint,
        );

        match pipeline.run().await {
            Ok(RunSummary {
                remote_course_id,
                token_usage,
                completed_tasks,
                skipped_steps,
            }) => Ok(GenerationOutcome {
                success: true,
                remote_course_id,
                token_usage,
                completed_tasks,
                total_tasks: *plan.total_tasks(),
                skipped_steps,
                checkpoint_key: key.clone(),
            }),
            Err(e) => {
                let checkpoint = pipeline.record_failure(&e).await;
                Err(e.with_checkpoint(checkpoint))
            }
        }
    }

    async fn load_checkpoint(
        &self,
        key: &CheckpointKey,
        course: &Course,
        plan: TaskPlan,
    ) -> Result<GenerationCheckpoint, GenerationError> {
        match self.store.load(key).await? {
            Some(checkpoint) if checkpoint.matches(course, *plan.total_tasks()) => {
                info!(
                    key = %key,
                    completed = checkpoint.completed_task_count,
                    "Resuming from checkpoint"
                );
                Ok(checkpoint)
            }
            Some(checkpoint) => Err(GenerationError::new(
                GenerationErrorKind::CheckpointMismatch {
                    key: key.to_string(),
                    reason: format!(
                        "stored plan has {} tasks for course '{}', this run plans {} for '{}'",
                        checkpoint.total_tasks,
                        checkpoint.course_id,
                        plan.total_tasks(),
                        course.id
                    ),
                },
            )),
            None => Ok(GenerationCheckpoint::new(
                key.clone(),
                course,
                *plan.total_tasks(),
            )),
        }
    }

    fn research_driver(&self, request: &GenerationRequest) -> Option<Arc<dyn WebResearch>> {
        if !request.options.web_research {
            return None;
        }
        let api_key = request
            .options
            .research_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or(&request.llm_api_key);
        let driver = self.providers.research(api_key);
        if driver.is_none() {
            warn!("Web research requested but no research provider is available");
        }
        driver
    }
}

fn validate(request: &GenerationRequest) -> Result<(), GenerationError> {
    let invalid = |message: String| -> Result<(), GenerationError> {
        Err(GenerationError::new(GenerationErrorKind::Validation(message)))
    };
    if request.llm_api_key.trim().is_empty() {
        return invalid("LLM API key is empty".to_string());
    }
    if request.course.topics.is_empty() {
        return invalid(format!("course '{}' has no topics", request.course.title));
    }
    if let Some(topic) = request.course.topics.iter().find(|t| t.lessons.is_empty()) {
        return invalid(format!("topic '{}' has no lessons", topic.title));
    }
    Ok(())
}
