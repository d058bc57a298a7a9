//! End-to-end runs of the orchestrator against scripted providers and an
//! in-memory LMS.

mod test_utils;

use coursewright_core::{GenerationCheckpoint, LmsType, TelemetryEventKind};
use coursewright_generation::{
    GenerationControl, GenerationErrorKind, GenerationOptions, StatusPhase, prompts,
};
use coursewright_interface::{CourseRecordStore, RecoveryStore};
use std::time::Duration;
use test_utils::{
    Harness, REJECTED_KEY, RagMode, RecordingObserver, sample_course, two_topic_course,
};

#[tokio::test]
async fn full_run_creates_every_entity_exactly_once() -> anyhow::Result<()> {
    let harness = Harness::new(LmsType::TopicBased);
    let control = GenerationControl::new();
    let observer = RecordingObserver::new(&control);

    let outcome = harness
        .orchestrator()
        .start(harness.request(sample_course()), &control, &observer)
        .await?;

    assert!(outcome.success);
    assert_eq!(outcome.total_tasks, 17);
    assert_eq!(outcome.completed_tasks, 17);
    assert!(outcome.skipped_steps.is_empty());

    let lms = &harness.lms;
    assert_eq!(lms.ops_of("course").len(), 1);
    assert_eq!(lms.ops_of("topic").len(), 1);
    assert_eq!(lms.ops_of("lesson").len(), 2);
    assert_eq!(lms.ops_of("quiz").len(), 1);
    assert_eq!(lms.ops_of("quiz_question").len(), 3);
    assert_eq!(lms.ops_of("assignment").len(), 1);

    let course_id = lms.ops_of("course")[0].id.clone();
    let topic_id = lms.ops_of("topic")[0].id.clone();
    assert_eq!(outcome.remote_course_id, course_id);
    assert_eq!(lms.ops_of("topic")[0].parent.as_ref(), Some(&course_id));
    assert!(lms
        .ops_of("lesson")
        .iter()
        .all(|op| op.parent.as_ref() == Some(&topic_id)));
    assert_eq!(lms.ops_of("quiz")[0].parent.as_ref(), Some(&topic_id));

    // Overview, introduction, six calls per lesson, quiz and assignment.
    assert_eq!(harness.completion.calls().len(), 16);

    assert_eq!(harness.store.checkpoint_count(), 0);
    assert!(!harness.store.is_leased(&outcome.checkpoint_key));
    let record = harness
        .store
        .load_record("rust-101")
        .await?
        .expect("record saved");
    assert_eq!(record.completed_tasks, 17);
    assert_eq!(record.remote_course_id, outcome.remote_course_id);
    assert_eq!(record.lms_type, "topic_based");
    Ok(())
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_one_hundred() {
    let harness = Harness::new(LmsType::TopicBased);
    let control = GenerationControl::new();
    let observer = RecordingObserver::new(&control);

    harness
        .orchestrator()
        .start(harness.request(sample_course()), &control, &observer)
        .await
        .expect("run succeeds");

    let tasks = observer.tasks();
    assert_eq!(tasks.first().map(|t| t.current_task_label.as_str()), Some("Starting"));
    assert!(tasks
        .windows(2)
        .all(|w| w[0].completed_tasks <= w[1].completed_tasks));
    assert!(tasks.iter().all(|t| t.total_tasks == 17));
    assert_eq!(tasks.last().map(|t| t.completed_tasks), Some(17));

    let progress = observer.progress();
    assert!(progress.windows(2).all(|w| w[0].percent <= w[1].percent));
    assert!(progress.iter().all(|p| (0.0..=100.0).contains(&p.percent)));
    let last = progress.last().expect("terminal update");
    assert!(last.terminal);
    assert_eq!(last.phase, StatusPhase::Success);
    assert_eq!(last.percent, 100.0);
    assert_eq!(progress.iter().filter(|p| p.terminal).count(), 1);
}

#[tokio::test]
async fn token_usage_is_the_sum_of_every_reported_call() -> anyhow::Result<()> {
    let harness = Harness::new(LmsType::TopicBased);
    let control = GenerationControl::new();
    let observer = RecordingObserver::new(&control);

    let outcome = harness
        .orchestrator()
        .start(harness.request(sample_course()), &control, &observer)
        .await?;

    // The FAQ answers carry no usage and count as zero.
    assert_eq!(*outcome.token_usage.total_tokens(), 30 + 30 + 2 * (500 + 4 * 30) + 30 + 30);
    assert_eq!(outcome.token_usage, harness.completion.usage());

    let summaries = harness.telemetry.events_of(TelemetryEventKind::TokenUsage);
    assert_eq!(summaries.len(), 1);
    assert_eq!(*summaries[0].token_usage(), Some(outcome.token_usage));
    Ok(())
}

#[tokio::test]
async fn abort_stops_before_the_next_call_and_resume_creates_nothing_twice() {
    let harness = Harness::new(LmsType::TopicBased);
    let orchestrator = harness.orchestrator();

    // Abort once reading, FAQ and latest developments of lesson 1 are done.
    let control = GenerationControl::new();
    let observer = RecordingObserver::new(&control).abort_at(3);
    let err = orchestrator
        .start(harness.request(sample_course()), &control, &observer)
        .await
        .expect_err("run is aborted");

    assert!(err.is_aborted());
    assert_eq!(harness.completion.calls().len(), 5);
    let checkpoint = err.checkpoint.as_deref().expect("checkpoint attached");
    assert_eq!(checkpoint.completed_task_count, 0);
    assert!(checkpoint.lms_course_id.is_some());
    assert!(checkpoint.topics[0].topic_lms_id.is_some());
    assert!(checkpoint.topics[0].lessons.is_empty());
    assert_eq!(checkpoint.last_error.as_deref(), Some("Generation aborted"));
    assert_eq!(*checkpoint.token_usage.total_tokens(), 30 + 30 + 500 + 30);
    assert_eq!(harness.store.checkpoint_count(), 1);
    assert!(!harness.store.is_leased(&checkpoint.key));

    let last = observer.progress().last().cloned().expect("terminal update");
    assert!(last.terminal);
    assert_eq!(last.phase, StatusPhase::Error);
    assert_eq!(last.message, "Generation cancelled.");

    let control = GenerationControl::new();
    let observer = RecordingObserver::new(&control);
    let outcome = orchestrator
        .start(harness.request(sample_course()), &control, &observer)
        .await
        .expect("resumed run succeeds");

    assert_eq!(outcome.completed_tasks, 17);
    assert_eq!(observer.tasks()[0].current_task_label, "Resuming");
    assert_eq!(harness.lms.ops_of("course").len(), 1);
    assert_eq!(harness.lms.ops_of("topic").len(), 1);
    assert_eq!(harness.lms.ops_of("lesson").len(), 2);
    assert_eq!(harness.lms.ops_of("quiz").len(), 1);
    assert_eq!(harness.lms.ops_of("assignment").len(), 1);
    assert_eq!(harness.completion.calls_with(prompts::COURSE_CONTEXT_SYSTEM).len(), 1);
    assert_eq!(harness.completion.calls_with(prompts::TOPIC_INTRO_SYSTEM).len(), 1);

    // Usage spans both runs, including the discarded partial lesson.
    assert_eq!(outcome.token_usage, harness.completion.usage());
    assert_eq!(harness.store.checkpoint_count(), 0);
}

#[tokio::test]
async fn resume_mid_topic_continues_at_the_next_lesson() {
    let harness = Harness::new(LmsType::TopicBased);
    let orchestrator = harness.orchestrator();

    // Topic 1 takes 17 tasks; lesson "Elision" of topic 2 ends at 24.
    let control = GenerationControl::new();
    let observer = RecordingObserver::new(&control).abort_at(24);
    let err = orchestrator
        .start(harness.request(two_topic_course()), &control, &observer)
        .await
        .expect_err("run is aborted");

    assert!(err.is_aborted());
    let checkpoint = err.checkpoint.as_deref().expect("checkpoint attached");
    assert_eq!(checkpoint.completed_task_count, 24);
    assert_eq!(checkpoint.current_topic_index, 1);
    assert_eq!(checkpoint.current_lesson_index, 1);
    assert_eq!(checkpoint.topics[1].lessons.len(), 1);
    assert!(checkpoint.topics[1].lessons[0].plain_text.contains("Reading about Elision"));
    let lessons_before = harness.lms.ops_of("lesson").len();
    assert_eq!(lessons_before, 3);
    let calls_before = harness.completion.calls().len();

    let control = GenerationControl::new();
    let observer = RecordingObserver::new(&control);
    let outcome = orchestrator
        .start(harness.request(two_topic_course()), &control, &observer)
        .await
        .expect("resumed run succeeds");

    assert_eq!(outcome.completed_tasks, 34);
    assert_eq!(observer.tasks()[0].completed_tasks, 24);
    assert_eq!(harness.lms.ops_of("course").len(), 1);
    assert_eq!(harness.lms.ops_of("topic").len(), 2);
    let lessons = harness.lms.ops_of("lesson");
    assert_eq!(lessons.len(), 4);
    assert_eq!(lessons[3].title, "Variance");
    assert_eq!(harness.lms.ops_of("quiz").len(), 2);
    assert_eq!(harness.lms.ops_of("assignment").len(), 2);

    // Reading, five sections, quiz and assignment; nothing earlier is redone.
    let resumed = &harness.completion.calls()[calls_before..];
    assert_eq!(resumed.len(), 8);
    assert_eq!(resumed[0].system, prompts::READING_SYSTEM);
    assert!(resumed[0].user.contains("Lesson: Variance"));
    assert!(resumed.iter().all(|c| !c.user.contains("Lesson: Elision")));

    let quiz = resumed
        .iter()
        .find(|c| c.system == prompts::QUIZ_SYSTEM)
        .expect("quiz for the second topic");
    assert!(quiz.user.contains("\"Lifetimes\""));
    assert!(quiz.user.contains("Reading about Elision"));
    assert!(quiz.user.contains("Reading about Variance"));
}

#[tokio::test(start_paused = true)]
async fn dropping_a_run_frees_its_checkpoint_key() {
    let harness = Harness::new(LmsType::TopicBased);
    let orchestrator = harness.orchestrator();
    let key = harness.request(sample_course()).checkpoint_key();

    let control = GenerationControl::new();
    let observer = RecordingObserver::new(&control).pause_at(7, Duration::from_secs(600));
    let timed_out = tokio::time::timeout(
        Duration::from_secs(10),
        orchestrator.start(harness.request(sample_course()), &control, &observer),
    )
    .await;

    assert!(timed_out.is_err());
    assert!(!harness.store.is_leased(&key));

    let control = GenerationControl::new();
    let outcome = orchestrator
        .start(harness.request(sample_course()), &control, &RecordingObserver::new(&control))
        .await
        .expect("second run resumes");

    assert_eq!(outcome.completed_tasks, 17);
    assert_eq!(harness.lms.ops_of("lesson").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_rate_limit_ends_the_run_and_resume_redoes_the_lesson() {
    let harness = Harness::new(LmsType::TopicBased);
    harness
        .completion
        .fail(prompts::FAQ_SYSTEM, Some("Lesson: Borrowing"), 4, 429);
    let orchestrator = harness.orchestrator();

    let control = GenerationControl::new();
    let err = orchestrator
        .start(harness.request(sample_course()), &control, &RecordingObserver::new(&control))
        .await
        .expect_err("rate limit outlasts the retries");

    assert!(matches!(err.kind, GenerationErrorKind::RateLimit(_)), "{:?}", err.kind);
    assert!(err.user_message().contains("resume"));
    let checkpoint = err.checkpoint.as_deref().expect("checkpoint attached");
    assert_eq!(checkpoint.completed_task_count, 7);
    assert_eq!(checkpoint.topics[0].lessons.len(), 1);
    assert_eq!(harness.lms.ops_of("lesson").len(), 1);

    let control = GenerationControl::new();
    let outcome = orchestrator
        .start(harness.request(sample_course()), &control, &RecordingObserver::new(&control))
        .await
        .expect("resumed run succeeds");

    assert!(outcome.skipped_steps.is_empty());
    assert_eq!(outcome.completed_tasks, 17);
    let lessons = harness.lms.ops_of("lesson");
    assert_eq!(lessons.len(), 2);
    assert_eq!(lessons[1].title, "Borrowing");
    let borrowing_faq = harness
        .completion
        .calls_with(prompts::FAQ_SYSTEM)
        .into_iter()
        .filter(|c| c.user.contains("Lesson: Borrowing"))
        .count();
    assert_eq!(borrowing_faq, 5);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_on_one_reading_are_retried() {
    let harness = Harness::new(LmsType::TopicBased);
    harness
        .completion
        .fail(prompts::READING_SYSTEM, Some("Lesson: Borrowing"), 3, 503);
    let control = GenerationControl::new();
    let observer = RecordingObserver::new(&control);

    let outcome = harness
        .orchestrator()
        .start(harness.request(sample_course()), &control, &observer)
        .await
        .expect("fourth attempt succeeds");

    assert_eq!(outcome.completed_tasks, 17);
    let borrowing = harness
        .completion
        .calls_with(prompts::READING_SYSTEM)
        .into_iter()
        .filter(|c| c.user.contains("Lesson: Borrowing"))
        .count();
    assert_eq!(borrowing, 4);

    let reading_events: Vec<_> = harness
        .telemetry
        .events()
        .into_iter()
        .filter(|e| e.operation() == "lesson.reading_content")
        .collect();
    let failures = reading_events
        .iter()
        .filter(|e| *e.kind() == TelemetryEventKind::Failure)
        .count();
    let successes: Vec<_> = reading_events
        .iter()
        .filter(|e| *e.kind() == TelemetryEventKind::Success)
        .collect();
    assert_eq!(failures, 3);
    assert_eq!(successes.len(), 2);
    assert_eq!(*successes[1].attempt(), Some(4));
}

#[tokio::test(start_paused = true)]
async fn pause_between_lessons_holds_every_call() {
    let harness = Harness::new(LmsType::TopicBased);
    let control = GenerationControl::new();
    let observer = RecordingObserver::new(&control).pause_at(7, Duration::from_secs(5));

    harness
        .orchestrator()
        .start(harness.request(sample_course()), &control, &observer)
        .await
        .expect("run succeeds after resume");

    let paused_at = observer.paused_at().expect("run was paused");
    let calls = harness.completion.calls();
    // Overview, introduction and the six calls of lesson 1.
    assert!(calls[..8].iter().all(|c| c.at <= paused_at));
    let next = &calls[8];
    assert!(next.at >= paused_at + Duration::from_secs(5));
    assert_eq!(next.system, prompts::READING_SYSTEM);
    assert!(next.user.contains("Lesson: Borrowing"));
}

#[tokio::test]
async fn invalid_courses_are_rejected_before_any_remote_call() {
    let harness = Harness::new(LmsType::TopicBased);
    let orchestrator = harness.orchestrator();

    let mut no_topics = sample_course();
    no_topics.topics.clear();
    let mut empty_topic = sample_course();
    empty_topic.topics[0].lessons.clear();
    let mut no_key = harness.request(sample_course());
    no_key.llm_api_key = "  ".to_string();

    for request in [
        harness.request(no_topics),
        harness.request(empty_topic),
        no_key,
    ] {
        let control = GenerationControl::new();
        let observer = RecordingObserver::new(&control);
        let err = orchestrator
            .start(request, &control, &observer)
            .await
            .expect_err("invalid input");
        assert!(matches!(err.kind, GenerationErrorKind::Validation(_)), "{:?}", err.kind);
        assert!(err.checkpoint.is_none());
        let last = observer.progress().last().cloned().expect("terminal update");
        assert_eq!(last.phase, StatusPhase::Error);
    }

    assert!(harness.lms.ops().is_empty());
    assert!(harness.completion.calls().is_empty());
    assert_eq!(harness.store.checkpoint_count(), 0);
}

#[tokio::test]
async fn rejected_llm_key_is_an_authentication_error() {
    let harness = Harness::new(LmsType::TopicBased);
    let mut request = harness.request(sample_course());
    request.llm_api_key = REJECTED_KEY.to_string();
    let control = GenerationControl::new();

    let err = harness
        .orchestrator()
        .start(request, &control, &RecordingObserver::new(&control))
        .await
        .expect_err("key is rejected");

    assert!(matches!(err.kind, GenerationErrorKind::Authentication(_)));
    assert!(harness.lms.ops().is_empty());
}

#[tokio::test]
async fn unknown_lms_type_is_a_configuration_error() {
    let harness = Harness::new(LmsType::TopicBased);
    let mut request = harness.request(sample_course());
    request.lms_credentials.lms_type = "moodle".to_string();
    let control = GenerationControl::new();

    let err = harness
        .orchestrator()
        .start(request, &control, &RecordingObserver::new(&control))
        .await
        .expect_err("unknown variant");

    match err.kind {
        GenerationErrorKind::Configuration(message) => assert!(message.contains("moodle")),
        other => panic!("expected configuration error, got {:?}", other),
    }
    assert!(harness.lms.ops().is_empty());
}

#[tokio::test]
async fn a_held_lease_rejects_a_second_run() {
    let harness = Harness::new(LmsType::TopicBased);
    let request = harness.request(sample_course());
    let key = request.checkpoint_key();
    let _lease = harness.store.acquire_lease(&key).await.unwrap().expect("free key");
    let control = GenerationControl::new();

    let err = harness
        .orchestrator()
        .start(request, &control, &RecordingObserver::new(&control))
        .await
        .expect_err("lease is held");

    assert!(matches!(err.kind, GenerationErrorKind::RunInProgress(_)));
    assert!(harness.store.is_leased(&key));
    assert!(harness.lms.ops().is_empty());
}

#[tokio::test]
async fn checkpoint_for_a_different_structure_is_refused() {
    let harness = Harness::new(LmsType::TopicBased);
    let request = harness.request(sample_course());
    let key = request.checkpoint_key();
    let mut other = sample_course();
    other.topics[0].lessons.pop();
    harness
        .store
        .save(&GenerationCheckpoint::new(key.clone(), &other, 10))
        .await
        .unwrap();
    let control = GenerationControl::new();

    let err = harness
        .orchestrator()
        .start(request, &control, &RecordingObserver::new(&control))
        .await
        .expect_err("mismatch");

    assert!(matches!(err.kind, GenerationErrorKind::CheckpointMismatch { .. }));
    assert!(harness.lms.ops().is_empty());
    assert!(harness.store.load(&key).await.unwrap().is_some());
    assert!(!harness.store.is_leased(&key));
}

#[tokio::test]
async fn malformed_quiz_output_skips_questions_but_keeps_the_count() {
    let harness = Harness::new(LmsType::TopicBased);
    harness
        .completion
        .set_quiz_response("Sorry, I can only answer in prose today.");
    let control = GenerationControl::new();

    let outcome = harness
        .orchestrator()
        .start(harness.request(sample_course()), &control, &RecordingObserver::new(&control))
        .await
        .expect("run succeeds");

    assert_eq!(outcome.completed_tasks, 17);
    assert_eq!(harness.lms.ops_of("quiz").len(), 1);
    assert!(harness.lms.ops_of("quiz_question").is_empty());
    assert_eq!(harness.lms.ops_of("assignment").len(), 1);
    assert!(outcome
        .skipped_steps
        .iter()
        .any(|s| s.step == "quiz_questions" && s.topic_id == "t1"));
}

#[tokio::test]
async fn rejected_lesson_is_skipped_and_the_run_continues() {
    let harness = Harness::new(LmsType::TopicBased);
    harness.lms.fail("lesson", 1, 422);
    let control = GenerationControl::new();

    let outcome = harness
        .orchestrator()
        .start(harness.request(sample_course()), &control, &RecordingObserver::new(&control))
        .await
        .expect("run succeeds");

    assert_eq!(outcome.completed_tasks, 17);
    let lessons = harness.lms.ops_of("lesson");
    assert_eq!(lessons.len(), 1);
    assert_eq!(lessons[0].title, "Borrowing");
    let skipped = &outcome.skipped_steps[0];
    assert_eq!(skipped.step, "lms_lesson");
    assert_eq!(skipped.lesson_id.as_deref(), Some("l1"));
    assert_eq!(harness.lms.ops_of("quiz").len(), 1);
}

#[tokio::test]
async fn rejected_topic_skips_all_of_its_work() {
    let harness = Harness::new(LmsType::TopicBased);
    harness.lms.fail("topic", 1, 422);
    let control = GenerationControl::new();
    let observer = RecordingObserver::new(&control);

    let outcome = harness
        .orchestrator()
        .start(harness.request(sample_course()), &control, &observer)
        .await
        .expect("run succeeds");

    assert_eq!(outcome.completed_tasks, 17);
    assert_eq!(harness.lms.ops().len(), 1);
    assert_eq!(harness.completion.calls().len(), 1);
    assert_eq!(outcome.skipped_steps[0].step, "lms_topic");
    assert!(observer
        .tasks()
        .windows(2)
        .all(|w| w[1].completed_tasks <= w[0].completed_tasks + 1));
}

#[tokio::test]
async fn lms_authentication_failure_ends_the_run_at_the_last_durable_step() {
    let harness = Harness::new(LmsType::TopicBased);
    harness.lms.fail("lesson", 1, 401);
    let control = GenerationControl::new();

    let err = harness
        .orchestrator()
        .start(harness.request(sample_course()), &control, &RecordingObserver::new(&control))
        .await
        .expect_err("authentication is fatal");

    assert!(matches!(err.kind, GenerationErrorKind::Authentication(_)));
    let checkpoint = err.checkpoint.as_deref().expect("checkpoint attached");
    assert_eq!(checkpoint.completed_task_count, 0);
    assert!(checkpoint.topics[0].lessons.is_empty());
    assert_eq!(harness.store.checkpoint_count(), 1);
}

#[tokio::test]
async fn section_based_quiz_hangs_off_the_first_lesson() {
    let harness = Harness::new(LmsType::SectionBased);
    let control = GenerationControl::new();

    harness
        .orchestrator()
        .start(harness.request(sample_course()), &control, &RecordingObserver::new(&control))
        .await
        .expect("run succeeds");

    let first_lesson = harness.lms.ops_of("lesson")[0].id.clone();
    let section = harness.lms.ops_of("topic")[0].id.clone();
    assert_eq!(harness.lms.ops_of("quiz")[0].parent.as_ref(), Some(&first_lesson));
    assert_eq!(harness.lms.ops_of("assignment")[0].parent.as_ref(), Some(&section));
}

#[tokio::test]
async fn failing_library_falls_back_to_plain_completion() {
    let harness = Harness::new(LmsType::TopicBased);
    harness.rag.set_mode(RagMode::Fail);
    let mut request = harness.request(sample_course());
    request.library_assignments.assign_topic("t1", "lib-ownership");
    let control = GenerationControl::new();

    let outcome = harness
        .orchestrator()
        .start(request, &control, &RecordingObserver::new(&control))
        .await
        .expect("run succeeds");

    assert_eq!(outcome.completed_tasks, 17);
    assert_eq!(harness.rag.calls(), vec![vec!["lib-ownership".to_string()]; 2]);
    let readings = harness.completion.calls_with(prompts::READING_SYSTEM);
    assert_eq!(readings.len(), 2);
    assert!(readings.iter().all(|c| !c.user.contains("file search")));
    assert_eq!(harness.lms.ops_of("lesson").len(), 2);
}

#[tokio::test]
async fn empty_library_answer_also_falls_back() {
    let harness = Harness::new(LmsType::TopicBased);
    harness.rag.set_mode(RagMode::Empty);
    let mut request = harness.request(sample_course());
    request.library_assignments.assign_lesson("l2", "lib-borrowing");
    let control = GenerationControl::new();

    harness
        .orchestrator()
        .start(request, &control, &RecordingObserver::new(&control))
        .await
        .expect("run succeeds");

    assert_eq!(harness.rag.calls().len(), 1);
    assert_eq!(harness.completion.calls_with(prompts::READING_SYSTEM).len(), 2);
}

#[tokio::test]
async fn library_answers_replace_plain_reading() {
    let harness = Harness::new(LmsType::TopicBased);
    let mut request = harness.request(sample_course());
    request.library_assignments.assign_topic("t1", "lib-ownership");
    request.library_assignments.assign_lesson("l2", "lib-borrowing");
    let control = GenerationControl::new();

    let outcome = harness
        .orchestrator()
        .start(request, &control, &RecordingObserver::new(&control))
        .await
        .expect("run succeeds");

    assert_eq!(
        harness.rag.calls(),
        vec![vec!["lib-ownership".to_string()], vec!["lib-borrowing".to_string()]]
    );
    assert!(harness.completion.calls_with(prompts::READING_SYSTEM).is_empty());
    assert_eq!(
        outcome.token_usage,
        harness.completion.usage() + harness.rag.usage()
    );
}

#[tokio::test(start_paused = true)]
async fn web_research_adds_a_task_per_topic_and_spaces_lesson_queries() {
    let harness = Harness::new(LmsType::TopicBased);
    let mut request = harness.request(sample_course());
    request.options = GenerationOptions::default().with_web_research(true);
    let control = GenerationControl::new();

    let outcome = harness
        .orchestrator()
        .start(request, &control, &RecordingObserver::new(&control))
        .await
        .expect("run succeeds");

    assert_eq!(outcome.total_tasks, 18);
    assert_eq!(outcome.completed_tasks, 18);

    let calls = harness.research.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[0].0.contains("Ownership"));
    assert!(calls[1].0.contains("Moves"));
    assert!(calls[2].0.contains("Borrowing"));
    assert!(calls[2].1 - calls[1].1 >= Duration::from_millis(1_500));

    let readings = harness.completion.calls_with(prompts::READING_SYSTEM);
    assert!(readings[0].user.contains("Recent changes in the ecosystem."));
    assert_eq!(
        outcome.token_usage,
        harness.completion.usage() + harness.research.usage()
    );
}
