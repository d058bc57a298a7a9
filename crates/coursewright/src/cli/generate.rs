//! Course generation command handler.

use super::GenerateArgs;
use coursewright::{
    CheckpointKey, Course, CoursewrightConfig, CoursewrightResult, GenerationOptions, GenerationOrchestrator,
    GenerationRequest, GenerationStatusController, HttpLmsConnector, HttpProviderFactory,
    JsonError, JsonLinesTelemetrySink, LibraryAssignments, LmsCredentials, RetryExecutor,
    StatusPhase, StorageError, StorageErrorKind, TelemetrySink, TracingTelemetrySink,
};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Run `coursewright generate`.
///
/// Ctrl-C aborts the run at the next safe point; the checkpoint is kept so
/// the same command resumes it.
pub async fn run_generate(
    config: &CoursewrightConfig,
    args: GenerateArgs,
) -> CoursewrightResult<ExitCode> {
    let course: Course = read_json(&args.course).await?;
    let library_assignments: LibraryAssignments = match &args.libraries {
        Some(path) => read_json(path).await?,
        None => LibraryAssignments::default(),
    };

    let store = super::open_store(config).await?;
    let telemetry_file = config.storage().resolved_telemetry_file();
    let json_sink = match &telemetry_file {
        Some(path) => Some(Arc::new(
            JsonLinesTelemetrySink::open(path, *config.storage().telemetry_capacity()).await?,
        )),
        None => None,
    };
    let telemetry: Arc<dyn TelemetrySink> = match &json_sink {
        Some(sink) => sink.clone(),
        None => Arc::new(TracingTelemetrySink),
    };

    let executor = RetryExecutor::new(config.retry().clone(), telemetry)
        .with_limiter(config.rate_limit().limiter());
    let orchestrator = GenerationOrchestrator::new(
        Arc::new(HttpProviderFactory::new(config.models().clone())?),
        Arc::new(HttpLmsConnector::new(config.lms().request_timeout())),
        store.clone(),
        store,
        executor,
        config.generation().clone(),
    );

    let options = GenerationOptions {
        web_research: args.web_research,
        research_api_key: args.research_key,
    };
    let mut request = GenerationRequest::new(
        course,
        LmsCredentials {
            lms_type: args.lms_type,
            base_url: args.lms_url,
            username: args.lms_user,
            password: args.lms_password,
        },
        args.api_key,
    )
    .with_library_assignments(library_assignments)
    .with_options(options);
    if let Some(key) = args.checkpoint_key {
        request = request.with_checkpoint_key(CheckpointKey::new(key));
    }

    let status = Arc::new(GenerationStatusController::new(config.status().hide_after()));
    let control = status.begin_run(&request.course.title);
    let watcher = tokio::spawn(log_status(status.clone()));
    let interrupt = tokio::spawn(abort_on_ctrl_c(status.clone()));

    let result = orchestrator.start(request, &control, status.as_ref()).await;

    interrupt.abort();
    watcher.abort();
    drop(orchestrator);
    if let Some(sink) = json_sink.and_then(|sink| Arc::try_unwrap(sink).ok()) {
        sink.close().await;
    }

    match result {
        Ok(outcome) => {
            let text = serde_json::to_string_pretty(&outcome)
                .map_err(|e| JsonError::new("generation outcome", e.to_string()))?;
            println!("{}", text);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            if let Some(checkpoint) = &e.checkpoint {
                eprintln!(
                    "Checkpoint '{}' saved at {:.0}% ({} of {} tasks).",
                    checkpoint.key,
                    checkpoint.progress_percent,
                    checkpoint.completed_task_count,
                    checkpoint.total_tasks
                );
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> CoursewrightResult<T> {
    debug!(path = %path.display(), "Reading JSON input");
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        StorageError::new(StorageErrorKind::FileRead(format!(
            "{}: {}",
            path.display(),
            e
        )))
    })?;
    let value = serde_json::from_str(&text)
        .map_err(|e| JsonError::new(path.display().to_string(), e.to_string()))?;
    Ok(value)
}

async fn abort_on_ctrl_c(status: Arc<GenerationStatusController>) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("Interrupt received, aborting after the current step");
            status.abort();
        }
        Err(e) => warn!(error = %e, "Could not listen for Ctrl-C"),
    }
}

async fn log_status(status: Arc<GenerationStatusController>) {
    let mut updates = status.subscribe();
    let mut last_label = String::new();
    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();
        if snapshot.current_task_label == last_label && snapshot.phase == StatusPhase::Loading {
            continue;
        }
        last_label = snapshot.current_task_label.clone();
        info!(
            phase = %snapshot.phase,
            progress = snapshot.progress_percent,
            completed = snapshot.completed_tasks,
            total = snapshot.total_tasks,
            eta_secs = snapshot.estimated_millis_remaining.map(|ms| ms / 1_000),
            "{}",
            snapshot.message
        );
    }
}
