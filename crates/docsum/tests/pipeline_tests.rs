//! End-to-end pipeline behavior: submission through a queue delivery to a
//! terminal job record.

mod common;

use std::time::{Duration, Instant};

use common::harness::{rank, OWNER, TOPIC};
use common::{FakeTransport, FlakyStore, TestHarness};

use docsum::broadcast::{JobPhase, JobProgressBroadcaster};
use docsum::job::{FileType, ProcessingStatus};
use docsum::pipeline::{Outcome, Pipeline, PipelineConfig, Stage};
use docsum::provider::response::DEGRADED_KEY_POINT;
use docsum::provider::{
    Providers, FALLBACK_SUMMARY_CONFIDENCE, LIVE_STRUCTURED_CONFIDENCE,
    LIVE_UNSTRUCTURED_CONFIDENCE,
};
use docsum::queue::{FileDescriptor, MessageQueue};
use docsum::retry::RetryPolicy;
use docsum::store::JobStore;
use docsum::Job;

const MEETING: &str = "Alice will ship the report. Bob will review it Friday.";

const STRUCTURED_REPLY: &str = r#"{
    "summary": "Alice ships the report and Bob reviews it.",
    "keyPoints": ["Report ships", "Review on Friday"],
    "actionItems": [
        {"task": "Ship the report", "assignee": "Alice", "deadline": null},
        {"task": "Review the report", "assignee": "Bob", "deadline": "Friday"}
    ]
}"#;

fn assert_monotonic(harness: &TestHarness, job: &Job) {
    let transitions = harness.transitions(job);
    assert_eq!(transitions[0].from, None);
    assert_eq!(transitions[0].to, ProcessingStatus::Pending);

    for pair in transitions.windows(2) {
        assert!(
            rank(pair[1].to) > rank(pair[0].to),
            "transition log went backwards: {:?}",
            transitions
        );
        assert_eq!(pair[1].from, Some(pair[0].to));
    }

    let terminal = transitions.iter().filter(|t| t.to.is_terminal()).count();
    assert!(terminal <= 1, "more than one terminal transition: {:?}", transitions);
}

#[test]
fn test_text_job_completes_with_offline_providers() {
    let harness = TestHarness::new();
    let job = harness.submit_text(MEETING);

    let outcome = harness.process_next(harness.pipeline(&Providers::fallback()));
    assert_eq!(outcome, Outcome::Completed { job_id: job.id.clone() });

    let stored = harness.load(&job);
    assert_eq!(stored.processing_status, ProcessingStatus::Completed);
    assert_eq!(stored.original_text, MEETING);
    assert!(stored.summary.as_deref().is_some_and(|s| !s.is_empty()));
    assert!(!stored.key_points.is_empty());
    assert!(!stored.action_items.is_empty());
    assert!(stored
        .action_items
        .iter()
        .any(|item| item.assignee.as_deref() == Some("Alice")));

    let metadata = stored.metadata.expect("completed job has metadata");
    assert_eq!(metadata.word_count, 9);
    assert_eq!(metadata.duration, None);
    assert_eq!(metadata.confidence, FALLBACK_SUMMARY_CONFIDENCE);

    assert_eq!(harness.backlog(), 0);
    assert_monotonic(&harness, &job);
}

#[test]
fn test_transition_log_records_each_step() {
    let harness = TestHarness::new();
    let job = harness.submit_text(MEETING);
    harness.process_next(harness.pipeline(&Providers::fallback()));

    let transitions = harness.transitions(&job);
    let steps: Vec<_> = transitions
        .iter()
        .map(|t| (t.to, t.stage.clone().unwrap_or_default()))
        .collect();
    assert_eq!(
        steps,
        vec![
            (ProcessingStatus::Pending, "submit".to_string()),
            (ProcessingStatus::Processing, "claim".to_string()),
            (ProcessingStatus::Completed, "persist".to_string()),
        ]
    );
}

#[test]
fn test_unsupported_media_type_fails_job() {
    let harness = TestHarness::new();
    let job = harness.submit_inline(FileType::Txt, "application/unknown", "blob.bin", b"\x00\x01");

    let outcome = harness.process_next(harness.pipeline(&Providers::fallback()));
    match outcome {
        Outcome::Failed { job_id, stage, .. } => {
            assert_eq!(job_id, job.id);
            assert_eq!(stage, Stage::Extract);
        }
        other => panic!("expected failure, got {:?}", other),
    }

    let stored = harness.load(&job);
    assert_eq!(stored.processing_status, ProcessingStatus::Failed);
    assert_eq!(stored.original_text, "");
    assert_eq!(stored.summary, None);
    assert!(stored.key_points.is_empty());
    assert_eq!(stored.metadata, None);

    let last = harness.transitions(&job).pop().expect("transitions recorded");
    assert_eq!(last.stage.as_deref(), Some("extract"));
    assert_monotonic(&harness, &job);
}

#[test]
fn test_whitespace_only_text_fails_job() {
    let harness = TestHarness::new();
    let job = harness.submit_text("   \n\t  ");

    let outcome = harness.process_next(harness.pipeline(&Providers::fallback()));
    assert!(matches!(outcome, Outcome::Failed { stage: Stage::Extract, .. }));
    assert_eq!(harness.load(&job).processing_status, ProcessingStatus::Failed);
}

#[test]
fn test_oversized_inline_payload_fails_job() {
    let harness = TestHarness::new();
    let big = "word ".repeat(400_000);
    let job = harness.submit_text(&big);

    let outcome = harness.process_next(harness.pipeline(&Providers::fallback()));
    assert!(matches!(outcome, Outcome::Failed { stage: Stage::Resolve, .. }));
    assert_eq!(harness.load(&job).processing_status, ProcessingStatus::Failed);
}

#[test]
fn test_stored_reference_is_read_from_upload_directory() {
    let harness = TestHarness::new();
    let job = harness.submit_stored(FileType::Txt, "text/plain", "notes.txt", MEETING.as_bytes());

    let outcome = harness.process_next(harness.pipeline(&Providers::fallback()));
    assert_eq!(outcome, Outcome::Completed { job_id: job.id.clone() });
    assert_eq!(harness.load(&job).original_text, MEETING);
}

#[test]
fn test_reference_outside_upload_directory_is_rejected() {
    let harness = TestHarness::new();
    std::fs::write(harness.temp_path().join("secret.txt"), "top secret").unwrap();

    let job = Job::new(OWNER, FileType::Txt, "secret.txt");
    harness
        .producer()
        .submit(&job, FileDescriptor::stored("text/plain", "../secret.txt", "secret.txt"))
        .unwrap();

    let outcome = harness.process_next(harness.pipeline(&Providers::fallback()));
    assert!(matches!(outcome, Outcome::Failed { stage: Stage::Resolve, .. }));
    assert_eq!(harness.load(&job).original_text, "");
}

#[test]
fn test_structured_live_reply_is_recorded() {
    let harness = TestHarness::new();
    let transport = FakeTransport::chat(STRUCTURED_REPLY);
    let job = harness.submit_text(MEETING);

    harness.process_next(harness.pipeline(&transport.providers()));

    let stored = harness.load(&job);
    assert_eq!(stored.processing_status, ProcessingStatus::Completed);
    assert_eq!(
        stored.summary.as_deref(),
        Some("Alice ships the report and Bob reviews it.")
    );
    assert_eq!(stored.key_points, vec!["Report ships", "Review on Friday"]);
    assert_eq!(stored.action_items.len(), 2);
    assert_eq!(stored.action_items[0].deadline, None);
    assert_eq!(stored.action_items[1].deadline.as_deref(), Some("Friday"));
    assert_eq!(stored.metadata.unwrap().confidence, LIVE_STRUCTURED_CONFIDENCE);
    assert_eq!(transport.chat_calls(), 1);
}

#[test]
fn test_non_json_live_reply_completes_degraded() {
    let harness = TestHarness::new();
    let transport = FakeTransport::chat("The team agreed that Alice ships the report.");
    let job = harness.submit_text(MEETING);

    let outcome = harness.process_next(harness.pipeline(&transport.providers()));
    assert_eq!(outcome, Outcome::Completed { job_id: job.id.clone() });

    let stored = harness.load(&job);
    assert!(stored
        .summary
        .as_deref()
        .is_some_and(|s| s.starts_with("The team agreed that Alice ships the report.")));
    assert_eq!(stored.key_points, vec![DEGRADED_KEY_POINT.to_string()]);
    assert!(stored.action_items.is_empty());
    assert_eq!(stored.metadata.unwrap().confidence, LIVE_UNSTRUCTURED_CONFIDENCE);
}

#[test]
fn test_unreachable_provider_falls_back_with_lower_confidence() {
    let live = TestHarness::new();
    let live_job = live.submit_text(MEETING);
    live.process_next(live.pipeline(&FakeTransport::chat(STRUCTURED_REPLY).providers()));

    let offline = TestHarness::new();
    let transport = FakeTransport::unreachable();
    let offline_job = offline.submit_text(MEETING);
    let outcome = offline.process_next(offline.pipeline(&transport.providers()));

    assert_eq!(outcome, Outcome::Completed { job_id: offline_job.id.clone() });
    assert_eq!(transport.chat_calls(), 1);

    let live_confidence = live.load(&live_job).metadata.unwrap().confidence;
    let fallback = offline.load(&offline_job);
    let fallback_confidence = fallback.metadata.as_ref().unwrap().confidence;
    assert!(fallback_confidence < live_confidence);
    assert!(!fallback.action_items.is_empty());

    let persisted = offline.transitions(&offline_job).pop().unwrap();
    assert!(persisted
        .detail
        .as_deref()
        .is_some_and(|d| d.contains("fallback")));
}

#[test]
fn test_audio_job_uses_transcript_and_reported_duration() {
    let harness = TestHarness::new();
    let transport = FakeTransport::with_transcript(STRUCTURED_REPLY, MEETING);
    let job = harness.submit_inline(FileType::Audio, "audio/mpeg", "memo.mp3", &[0u8; 32_000]);

    harness.process_next(harness.pipeline(&transport.providers()));

    let stored = harness.load(&job);
    assert_eq!(stored.processing_status, ProcessingStatus::Completed);
    assert_eq!(stored.original_text, MEETING);
    let metadata = stored.metadata.unwrap();
    assert_eq!(metadata.word_count, 9);
    assert_eq!(metadata.duration, Some(12.5));
    assert_eq!(metadata.confidence, LIVE_STRUCTURED_CONFIDENCE);
    assert_eq!(transport.transcription_calls(), 1);
}

#[test]
fn test_audio_job_without_provider_still_completes() {
    let harness = TestHarness::new();
    let job = harness.submit_inline(FileType::Audio, "audio/mpeg", "memo.mp3", &[0u8; 32_000]);

    let outcome = harness.process_next(harness.pipeline(&Providers::fallback()));
    assert_eq!(outcome, Outcome::Completed { job_id: job.id.clone() });

    let stored = harness.load(&job);
    assert!(stored.original_text.contains("approximately 2 seconds"));
    let metadata = stored.metadata.unwrap();
    assert_eq!(metadata.duration, Some(2.0));
    assert_eq!(metadata.confidence, FALLBACK_SUMMARY_CONFIDENCE);
}

#[test]
fn test_audio_confidence_is_the_summary_score() {
    let harness = TestHarness::new();
    // Chat answers, transcription is unreachable.
    let transport = FakeTransport::chat(STRUCTURED_REPLY);
    let job = harness.submit_inline(FileType::Audio, "audio/mpeg", "memo.mp3", &[0u8; 32_000]);

    let outcome = harness.process_next(harness.pipeline(&transport.providers()));
    assert_eq!(outcome, Outcome::Completed { job_id: job.id.clone() });

    let stored = harness.load(&job);
    assert_eq!(stored.metadata.unwrap().confidence, LIVE_STRUCTURED_CONFIDENCE);

    let persisted = harness.transitions(&job).pop().unwrap();
    let detail = persisted.detail.unwrap_or_default();
    assert!(detail.starts_with("live"), "detail was {:?}", detail);
    assert!(detail.contains("transcript fallback"), "detail was {:?}", detail);
}

#[test]
fn test_stalled_summarizer_falls_back_within_deadline() {
    let harness = TestHarness::new();
    let transport = FakeTransport::stalled(Duration::from_secs(1));
    let config = PipelineConfig {
        summarization_timeout: Duration::from_millis(100),
        ..harness.pipeline_config()
    };
    let pipeline = harness.pipeline_with(
        config,
        harness.job_store(),
        &transport.providers(),
        RetryPolicy::none(),
    );
    let job = harness.submit_text(MEETING);

    let started = Instant::now();
    let outcome = harness.process_next(pipeline);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(outcome, Outcome::Completed { job_id: job.id.clone() });

    let stored = harness.load(&job);
    assert_eq!(stored.metadata.unwrap().word_count, 9);
    assert!(!stored.action_items.is_empty());

    let persisted = harness.transitions(&job).pop().unwrap();
    assert!(persisted
        .detail
        .as_deref()
        .is_some_and(|d| d.contains("transient")));
    assert_eq!(transport.chat_calls(), 1);
}

#[test]
fn test_stalled_transcriber_falls_back_within_deadline() {
    let harness = TestHarness::new();
    let transport = FakeTransport::stalled(Duration::from_secs(1));
    let config = PipelineConfig {
        transcription_timeout: Duration::from_millis(100),
        summarization_timeout: Duration::from_millis(100),
        ..harness.pipeline_config()
    };
    let pipeline = harness.pipeline_with(
        config,
        harness.job_store(),
        &transport.providers(),
        RetryPolicy::none(),
    );
    let job = harness.submit_inline(FileType::Audio, "audio/mpeg", "memo.mp3", &[0u8; 32_000]);

    let outcome = harness.process_next(pipeline);
    assert_eq!(outcome, Outcome::Completed { job_id: job.id.clone() });

    let stored = harness.load(&job);
    assert!(stored.original_text.contains("approximately 2 seconds"));
    let metadata = stored.metadata.unwrap();
    assert_eq!(metadata.duration, Some(2.0));
    assert_eq!(metadata.confidence, FALLBACK_SUMMARY_CONFIDENCE);
    assert_eq!(transport.transcription_calls(), 1);
}

fn quick_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        backoff_factor: 2.0,
        max_delay: Duration::from_millis(5),
    }
}

#[test]
fn test_store_outage_within_retry_budget_completes() {
    let harness = TestHarness::new();
    let store = FlakyStore::new(harness.job_store(), 2);
    let pipeline = harness.pipeline_with(
        harness.pipeline_config(),
        store.clone(),
        &Providers::fallback(),
        quick_retry(3),
    );
    let job = harness.submit_text(MEETING);

    let outcome = harness.process_next(pipeline);
    assert_eq!(outcome, Outcome::Completed { job_id: job.id.clone() });

    // Claim: two failures then success. Persist: one attempt.
    assert_eq!(store.save_attempts(), 4);
    assert_eq!(store.remaining_failures(), 0);
    assert_eq!(harness.load(&job).processing_status, ProcessingStatus::Completed);
    assert_eq!(harness.transitions(&job).len(), 3);
    assert_eq!(harness.backlog(), 0);
}

#[test]
fn test_store_outage_beyond_retry_budget_returns_message_to_queue() {
    let harness = TestHarness::new();
    let store = FlakyStore::new(harness.job_store(), 3);
    let pipeline = harness.pipeline_with(
        harness.pipeline_config(),
        store.clone(),
        &Providers::fallback(),
        quick_retry(2),
    );
    let job = harness.submit_text(MEETING);

    let outcome = harness.process_next(pipeline.clone());
    assert!(matches!(outcome, Outcome::Retry { .. }), "got {:?}", outcome);
    assert!(!outcome.should_ack());
    assert_eq!(store.save_attempts(), 2);

    // Nothing landed and the message is still owed.
    assert_eq!(harness.load(&job).processing_status, ProcessingStatus::Pending);
    assert_eq!(harness.transitions(&job).len(), 1);
    assert_eq!(harness.backlog(), 1);

    std::thread::sleep(Duration::from_millis(20));
    let mut subscription = harness.subscribe();
    let redelivered = subscription
        .receive(Duration::from_millis(500))
        .unwrap()
        .expect("message redelivered after nack");
    assert!(redelivered.is_redelivery());
    assert_eq!(redelivered.attempts, 2);

    // Third failure, then the claim and the persist go through.
    let outcome = pipeline.process(&redelivered.payload);
    redelivered.ack().unwrap();
    assert_eq!(outcome, Outcome::Completed { job_id: job.id.clone() });
    assert_eq!(store.save_attempts(), 5);
    assert_eq!(harness.load(&job).processing_status, ProcessingStatus::Completed);
    assert_eq!(harness.backlog(), 0);
    assert_monotonic(&harness, &job);
}

#[test]
fn test_redelivery_of_settled_job_is_a_no_op() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline(&Providers::fallback());
    let job = harness.submit_text(MEETING);
    harness.process_next(pipeline.clone());
    let before = harness.load(&job);

    // The same message published again, as an at-least-once queue may.
    harness
        .producer()
        .publish(&job.id, FileDescriptor::inline("text/plain", MEETING.as_bytes(), "notes.txt"))
        .unwrap();

    let outcome = harness.process_next(pipeline);
    assert_eq!(
        outcome,
        Outcome::Duplicate {
            job_id: job.id.clone(),
            status: ProcessingStatus::Completed,
        }
    );
    assert!(outcome.should_ack());
    assert_eq!(harness.load(&job), before);
    assert_eq!(harness.transitions(&job).len(), 3);
    assert_eq!(harness.backlog(), 0);
    assert_monotonic(&harness, &job);
}

#[test]
fn test_delivery_for_claimed_job_stands_down() {
    let harness = TestHarness::new();
    let job = harness.submit_text(MEETING);

    let mut claimed = harness.load(&job);
    claimed.begin_processing().unwrap();
    harness.store.save(&mut claimed).unwrap();

    let outcome = harness.process_next(harness.pipeline(&Providers::fallback()));
    assert_eq!(
        outcome,
        Outcome::Duplicate {
            job_id: job.id.clone(),
            status: ProcessingStatus::Processing,
        }
    );
    assert_eq!(harness.load(&job).processing_status, ProcessingStatus::Processing);
}

#[test]
fn test_unacknowledged_delivery_is_redelivered_and_absorbed() {
    let harness = TestHarness::with_visibility_timeout(Duration::from_millis(50));
    let pipeline = harness.pipeline(&Providers::fallback());
    let job = harness.submit_text(MEETING);

    // Process without settling, as a worker that dies before acking would.
    let mut subscription = harness.subscribe();
    let first = subscription
        .receive(Duration::from_millis(500))
        .unwrap()
        .expect("message delivered");
    assert_eq!(pipeline.process(&first.payload), Outcome::Completed { job_id: job.id.clone() });
    drop(first);

    std::thread::sleep(Duration::from_millis(100));
    let mut consumer = harness.consumer(pipeline);
    let outcome = consumer.poll_once().unwrap().expect("message redelivered");
    assert!(matches!(outcome, Outcome::Duplicate { .. }));

    let terminal = harness
        .transitions(&job)
        .iter()
        .filter(|t| t.to.is_terminal())
        .count();
    assert_eq!(terminal, 1);
    assert_eq!(harness.backlog(), 0);
}

#[test]
fn test_undecodable_message_is_discarded_and_acked() {
    let harness = TestHarness::new();
    harness.queue.publish(TOPIC, "not json at all").unwrap();

    let outcome = harness.process_next(harness.pipeline(&Providers::fallback()));
    assert!(matches!(outcome, Outcome::Discarded { .. }));
    assert_eq!(harness.backlog(), 0);
}

#[test]
fn test_message_for_unknown_job_is_discarded() {
    let harness = TestHarness::new();
    let ghost = Job::new(OWNER, FileType::Txt, "ghost.txt");
    harness
        .producer()
        .publish(&ghost.id, FileDescriptor::inline("text/plain", b"boo", "ghost.txt"))
        .unwrap();

    let outcome = harness.process_next(harness.pipeline(&Providers::fallback()));
    assert!(matches!(outcome, Outcome::Discarded { .. }));
    assert!(harness.store.load(&ghost.id).is_err());
}

#[test]
fn test_progress_events_follow_the_job() {
    let harness = TestHarness::new();
    let broadcaster = JobProgressBroadcaster::new(32);
    let mut rx = broadcaster.subscribe();
    let pipeline = std::sync::Arc::new(
        Pipeline::new(
            std::sync::Arc::new(harness.pipeline_config()),
            harness.job_store(),
            &Providers::fallback(),
        )
        .with_progress(broadcaster),
    );

    let job = harness.submit_text(MEETING);
    harness.process_next(pipeline);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    let phases: Vec<JobPhase> = events.iter().map(|e| e.phase).collect();
    assert_eq!(
        phases,
        vec![
            JobPhase::Processing,
            JobPhase::Extracting,
            JobPhase::Summarizing,
            JobPhase::Completed,
        ]
    );

    let last = events.last().unwrap();
    assert_eq!(last.job_id, job.id.as_str());
    assert_eq!(last.word_count, Some(9));
    assert_eq!(last.confidence, Some(FALLBACK_SUMMARY_CONFIDENCE));
}
