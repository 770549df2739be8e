//! End-to-end pipeline tests against stub collaborators
//!
//! Each stub writes real files into a per-test temp directory so cleanup
//! behavior is observable. The publisher records uploads and can be told to
//! fail selectively.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Notify;

use video_digest_common::{
    EventType, MediaFetcher, PipelineError, PromptResolver, PromptSpec, Publisher, RequestStatus,
    Result, Stage, Submission, Submitter, Summarizer, Transcriber, VideoInfo,
};
use video_digest_engine::{EngineConfig, ProcessingEngine};

struct StubFetcher {
    tmp: PathBuf,
    /// When set, `fetch_metadata` blocks until notified (for cancel tests).
    gate: Option<Arc<Notify>>,
}

#[async_trait]
impl MediaFetcher for StubFetcher {
    async fn fetch_metadata(&self, url: &str) -> Result<VideoInfo> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(VideoInfo {
            title: Some("Stub Talk".to_string()),
            channel: Some("Stub Channel".to_string()),
            duration: Some(90.0),
            webpage_url: Some(url.to_string()),
            ..VideoInfo::default()
        })
    }

    async fn extract_audio(&self, _url: &str) -> Result<PathBuf> {
        let path = self.tmp.join(format!("audio-{}.mp3", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"fake audio").await?;
        Ok(path)
    }

    fn supports_url(&self, url: &str) -> bool {
        url.starts_with("http://") || url.starts_with("https://")
    }
}

struct StubTranscriber {
    tmp: PathBuf,
    text: String,
}

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, _audio_path: &Path) -> Result<PathBuf> {
        let path = self
            .tmp
            .join(format!("transcript-{}.txt", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, &self.text).await?;
        Ok(path)
    }
}

#[derive(Default)]
struct StubSummarizer {
    tmp: PathBuf,
    prompts_seen: Mutex<Vec<String>>,
}

#[async_trait]
impl Summarizer for StubSummarizer {
    async fn summarize(&self, text: &str, prompt: &str, _max_tokens: u32) -> Result<PathBuf> {
        self.prompts_seen.lock().unwrap().push(prompt.to_string());
        let path = self
            .tmp
            .join(format!("summary-{}.txt", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, format!("summary of {} chars", text.len())).await?;
        Ok(path)
    }
}

#[derive(Default)]
struct RecordingPublisher {
    uploads: Mutex<Vec<(String, String)>>, // (kind, location)
    fail_transcript: AtomicBool,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn upload_summary(
        &self,
        request_id: &str,
        _info: &VideoInfo,
        _path: &Path,
        category: &str,
        user: &str,
    ) -> Result<String> {
        let location = format!("{category}/{user}/{request_id}_summary.txt");
        self.uploads
            .lock()
            .unwrap()
            .push(("summary".to_string(), location.clone()));
        Ok(location)
    }

    async fn upload_transcript(
        &self,
        request_id: &str,
        _info: &VideoInfo,
        _path: &Path,
        category: &str,
        user: &str,
    ) -> Result<String> {
        if self.fail_transcript.load(Ordering::SeqCst) {
            return Err(PipelineError::Publish("transcript upload refused".into()));
        }
        let location = format!("{category}/{user}/{request_id}_transcript.txt");
        self.uploads
            .lock()
            .unwrap()
            .push(("transcript".to_string(), location.clone()));
        Ok(location)
    }
}

struct StubPrompts;

impl PromptResolver for StubPrompts {
    fn resolve(&self, input: &str) -> Option<String> {
        match input {
            "general" => Some("You summarize transcripts concisely.".to_string()),
            "key_points" => Some("You extract key points.".to_string()),
            _ => None,
        }
    }
}

struct Harness {
    engine: Arc<ProcessingEngine>,
    publisher: Arc<RecordingPublisher>,
    summarizer: Arc<StubSummarizer>,
    fetch_gate: Option<Arc<Notify>>,
    _tmp: TempDir,
}

fn build_harness(gated_fetch: bool, transcript_text: &str) -> Harness {
    let tmp = TempDir::new().unwrap();
    let tmp_path = tmp.path().to_path_buf();

    let fetch_gate = gated_fetch.then(|| Arc::new(Notify::new()));
    let publisher = Arc::new(RecordingPublisher::default());
    let summarizer = Arc::new(StubSummarizer {
        tmp: tmp_path.clone(),
        prompts_seen: Mutex::new(Vec::new()),
    });

    let config = EngineConfig {
        poll_interval: Duration::from_millis(5),
        ..EngineConfig::default()
    };

    let engine = ProcessingEngine::new(
        config,
        Arc::new(StubFetcher {
            tmp: tmp_path.clone(),
            gate: fetch_gate.clone(),
        }),
        Arc::new(StubTranscriber {
            tmp: tmp_path.clone(),
            text: transcript_text.to_string(),
        }),
        Arc::clone(&summarizer) as Arc<dyn Summarizer>,
        Some(Arc::clone(&publisher) as Arc<dyn Publisher>),
        Arc::new(StubPrompts),
    );
    engine.start();

    Harness {
        engine,
        publisher,
        summarizer,
        fetch_gate,
        _tmp: tmp,
    }
}

async fn wait_until_finished(engine: &ProcessingEngine, request_id: &str) -> RequestStatus {
    for _ in 0..400 {
        let state = engine.state(request_id).unwrap();
        if state.status.is_terminal() && state.completed_at.is_some() {
            return state.status;
        }
        // Cancelled requests never get a cleanup pass.
        if state.status == RequestStatus::Cancelled {
            return state.status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("request {request_id} did not finish in time");
}

#[tokio::test]
async fn test_happy_path_completes_and_cleans_up() {
    let harness = build_harness(false, "hello world transcript");

    let outcome = harness
        .engine
        .submit(
            Submission::new("https://example.com/v1", PromptSpec::id("general"))
                .with_category("finance"),
        )
        .await
        .unwrap();
    assert!(!outcome.deduplicated);

    let status = wait_until_finished(&harness.engine, &outcome.request_id).await;
    assert_eq!(status, RequestStatus::Completed);

    let state = harness.engine.state(&outcome.request_id).unwrap();
    assert!(state.error.is_none());
    assert_eq!(state.category, "finance");
    assert_eq!(state.user, "admin");
    assert!(state.video_info.is_some());
    assert_eq!(
        state.output_path.as_deref(),
        Some(format!("finance/admin/{}_summary.txt", outcome.request_id).as_str())
    );

    // Both artifacts went out, under category/user.
    let uploads = harness.publisher.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 2);
    assert!(uploads.iter().all(|(_, loc)| loc.starts_with("finance/admin/")));

    // All three temp files were deleted by cleanup.
    for path in [
        state.audio_path.as_ref().unwrap(),
        state.transcript_path.as_ref().unwrap(),
        state.summary_path.as_ref().unwrap(),
    ] {
        assert!(!path.exists(), "{} should be deleted", path.display());
    }

    // Events arrived in pipeline order.
    let kinds: Vec<EventType> = harness
        .engine
        .events(&outcome.request_id)
        .iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(
        kinds,
        vec![
            EventType::RequestAccepted,
            EventType::VideoInfoFetched,
            EventType::AudioDownloaded,
            EventType::TranscriptionCompleted,
            EventType::SummarizationCompleted,
            EventType::OutputCompleted,
            EventType::ProcessingCompleted,
        ]
    );

    harness.engine.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_submissions_share_one_request() {
    let harness = build_harness(false, "text");

    let submission = || Submission::new("https://example.com/dup", PromptSpec::id("general"));
    let first = harness.engine.submit(submission()).await.unwrap();
    let second = harness.engine.submit(submission()).await.unwrap();
    let third = harness.engine.submit(submission()).await.unwrap();

    assert!(!first.deduplicated);
    assert!(second.deduplicated);
    assert!(third.deduplicated);
    assert_eq!(first.request_id, second.request_id);
    assert_eq!(first.request_id, third.request_id);

    // Exactly one pipeline ran: one RequestAccepted in the log.
    wait_until_finished(&harness.engine, &first.request_id).await;
    let accepted = harness
        .engine
        .events(&first.request_id)
        .iter()
        .filter(|e| e.event_type == EventType::RequestAccepted)
        .count();
    assert_eq!(accepted, 1);

    harness.engine.shutdown().await;
}

#[tokio::test]
async fn test_different_prompts_are_not_deduplicated() {
    let harness = build_harness(false, "text");

    let first = harness
        .engine
        .submit(Submission::new(
            "https://example.com/v",
            PromptSpec::id("general"),
        ))
        .await
        .unwrap();
    let second = harness
        .engine
        .submit(Submission::new(
            "https://example.com/v",
            PromptSpec::id("key_points"),
        ))
        .await
        .unwrap();

    assert_ne!(first.request_id, second.request_id);
    harness.engine.shutdown().await;
}

#[tokio::test]
async fn test_partial_upload_failure_fails_request_but_cleans_up() {
    let harness = build_harness(false, "text");
    harness
        .publisher
        .fail_transcript
        .store(true, Ordering::SeqCst);

    let outcome = harness
        .engine
        .submit(Submission::new(
            "https://example.com/v2",
            PromptSpec::id("general"),
        ))
        .await
        .unwrap();

    let status = wait_until_finished(&harness.engine, &outcome.request_id).await;
    assert_eq!(status, RequestStatus::Failed);

    let state = harness.engine.state(&outcome.request_id).unwrap();
    let error = state.error.as_deref().unwrap();
    assert!(error.contains("transcript upload"), "error was: {error}");

    // The summary still went out before the transcript failed.
    let uploads = harness.publisher.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, "summary");

    // Cleanup still ran and deleted the local artifacts.
    for path in [
        state.audio_path.as_ref().unwrap(),
        state.transcript_path.as_ref().unwrap(),
        state.summary_path.as_ref().unwrap(),
    ] {
        assert!(!path.exists());
    }

    harness.engine.shutdown().await;
}

#[tokio::test]
async fn test_failed_fingerprint_can_be_resubmitted() {
    let harness = build_harness(false, "text");
    harness
        .publisher
        .fail_transcript
        .store(true, Ordering::SeqCst);

    let submission = || Submission::new("https://example.com/v3", PromptSpec::id("general"));
    let first = harness.engine.submit(submission()).await.unwrap();
    let status = wait_until_finished(&harness.engine, &first.request_id).await;
    assert_eq!(status, RequestStatus::Failed);

    // The fingerprint was released; a retry starts a fresh pipeline.
    harness
        .publisher
        .fail_transcript
        .store(false, Ordering::SeqCst);
    let second = harness.engine.submit(submission()).await.unwrap();
    assert!(!second.deduplicated);
    assert_ne!(first.request_id, second.request_id);

    let status = wait_until_finished(&harness.engine, &second.request_id).await;
    assert_eq!(status, RequestStatus::Completed);

    harness.engine.shutdown().await;
}

#[tokio::test]
async fn test_cancel_mid_flight_stops_the_pipeline() {
    let harness = build_harness(true, "text");
    let gate = harness.fetch_gate.clone().unwrap();

    let outcome = harness
        .engine
        .submit(Submission::new(
            "https://example.com/v4",
            PromptSpec::id("general"),
        ))
        .await
        .unwrap();

    // Let the video_info worker pick the task up and block in the fetcher.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        harness.engine.state(&outcome.request_id).unwrap().status,
        RequestStatus::Running
    );

    harness.engine.cancel(&outcome.request_id).unwrap();
    assert_eq!(
        harness.engine.state(&outcome.request_id).unwrap().status,
        RequestStatus::Cancelled
    );

    // A second cancel reports the terminal state.
    let err = harness.engine.cancel(&outcome.request_id).unwrap_err();
    assert!(matches!(err, PipelineError::TerminalState { .. }));

    // Release the in-flight fetch; its late patch must bounce off the
    // terminal guard and no successor stage may run.
    gate.notify_waiters();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let state = harness.engine.state(&outcome.request_id).unwrap();
    assert_eq!(state.status, RequestStatus::Cancelled);
    assert!(state.audio_path.is_none());

    let kinds: Vec<EventType> = harness
        .engine
        .events(&outcome.request_id)
        .iter()
        .map(|e| e.event_type)
        .collect();
    assert!(kinds.contains(&EventType::RequestCancelled));
    assert!(!kinds.contains(&EventType::TranscriptionCompleted));

    // No task for the cancelled request is sitting in any queue.
    for stage in Stage::ALL {
        assert_eq!(harness.engine.queue_len(stage), 0);
    }

    harness.engine.shutdown().await;
}

#[tokio::test]
async fn test_unknown_prompt_id_falls_back_to_literal() {
    let harness = build_harness(false, "text");

    let outcome = harness
        .engine
        .submit(Submission::new(
            "https://example.com/v5",
            PromptSpec::id("nonexistent_id"),
        ))
        .await
        .unwrap();

    let status = wait_until_finished(&harness.engine, &outcome.request_id).await;
    assert_eq!(status, RequestStatus::Completed);

    let prompts = harness.summarizer.prompts_seen.lock().unwrap().clone();
    assert_eq!(prompts, vec!["nonexistent_id".to_string()]);

    harness.engine.shutdown().await;
}

#[tokio::test]
async fn test_empty_transcript_still_completes() {
    let harness = build_harness(false, "");

    let outcome = harness
        .engine
        .submit(Submission::new(
            "https://example.com/v6",
            PromptSpec::text("summarize this"),
        ))
        .await
        .unwrap();

    let status = wait_until_finished(&harness.engine, &outcome.request_id).await;
    assert_eq!(status, RequestStatus::Completed);

    harness.engine.shutdown().await;
}

#[tokio::test]
async fn test_invalid_url_is_rejected_without_state() {
    let harness = build_harness(false, "text");

    let err = harness
        .engine
        .submit(Submission::new("", PromptSpec::id("general")))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput(_)));

    let err = harness
        .engine
        .submit(Submission::new("ftp://example.com/v", PromptSpec::id("general")))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput(_)));

    assert!(harness.engine.counts_by_status().is_empty());
    harness.engine.shutdown().await;
}
