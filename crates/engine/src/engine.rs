//! The processing engine
//!
//! Owns the request state machine. Submissions are fingerprinted and
//! deduplicated, accepted requests enter the event-driven stage chain, and
//! cancellation flips the record terminal and purges its queued tasks.
//! The engine is the only component that subscribes to the bus; each
//! subscription turns a stage-completion event into the successor stage's
//! task, so cross-stage ordering is decided in exactly one place.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use video_digest_common::{
    Event, EventType, Fingerprint, MediaFetcher, PipelineError, ProcessingState, PromptResolver,
    Publisher, RequestStatus, Result, Stage, StatePatch, StatusCounts, Submission,
    SubmissionOutcome, Submitter, Summarizer, Task, Transcriber,
};

use crate::bus::EventBus;
use crate::context::EngineContext;
use crate::dispatcher::ProcessorRegistry;
use crate::pool::WorkerPool;
use crate::queue::TaskQueue;
use crate::store::StateStore;

/// Engine tuning knobs
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Model identifier passed to the summarizer; part of the dedup
    /// fingerprint.
    pub model: String,
    /// Default summarizer token cap for submissions that carry none.
    pub max_tokens: u32,
    /// Publisher addressing defaults.
    pub default_category: String,
    pub default_user: String,
    /// Worker count per stage; stages not listed run one worker.
    pub concurrency: HashMap<Stage, usize>,
    /// Idle-worker polling interval.
    pub poll_interval: Duration,
    /// Terminal records older than this are purged by the GC sweep.
    pub request_ttl: Duration,
    /// How often the GC sweep runs.
    pub gc_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            max_tokens: 10_000,
            default_category: "general".to_string(),
            default_user: "admin".to_string(),
            concurrency: HashMap::new(),
            poll_interval: crate::pool::DEFAULT_POLL_INTERVAL,
            request_ttl: Duration::from_secs(24 * 60 * 60),
            gc_interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Orchestrator for the six-stage processing pipeline
pub struct ProcessingEngine {
    ctx: Arc<EngineContext>,
    pool: WorkerPool,
    config: EngineConfig,
    gc_stop: watch::Sender<bool>,
    gc_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ProcessingEngine {
    /// Wire up the engine around its collaborators and subscribe the stage
    /// chain. Workers do not run until [`start`](Self::start).
    pub fn new(
        config: EngineConfig,
        fetcher: Arc<dyn MediaFetcher>,
        transcriber: Arc<dyn Transcriber>,
        summarizer: Arc<dyn Summarizer>,
        publisher: Option<Arc<dyn Publisher>>,
        prompts: Arc<dyn PromptResolver>,
    ) -> Arc<Self> {
        let store = Arc::new(StateStore::new());
        let bus = Arc::new(EventBus::new());
        let queue = Arc::new(TaskQueue::new());

        let ctx = Arc::new(EngineContext {
            store,
            bus,
            queue,
            prompts,
            fetcher,
            transcriber,
            summarizer,
            publisher,
        });

        let registry = Arc::new(ProcessorRegistry::with_default_processors());
        let pool = WorkerPool::new(Arc::clone(&ctx.queue), registry, Arc::clone(&ctx))
            .with_poll_interval(config.poll_interval);

        let (gc_stop, _) = watch::channel(false);
        let engine = Arc::new(Self {
            ctx,
            pool,
            config,
            gc_stop,
            gc_handle: Mutex::new(None),
        });
        engine.subscribe_stage_chain();
        engine
    }

    /// Register the event subscriptions that advance the state machine.
    fn subscribe_stage_chain(&self) {
        let ctx = &self.ctx;

        // RequestAccepted: enqueue the first stage and mark the request
        // running. The status flip happens here, not in the processor, so
        // `Running` means "entered the pipeline" even while queued.
        {
            let store = Arc::clone(&ctx.store);
            let queue = Arc::clone(&ctx.queue);
            ctx.bus.subscribe(EventType::RequestAccepted, move |event| {
                let state = match store.get(&event.request_id) {
                    Ok(state) => state,
                    Err(err) => {
                        error!("no state for accepted request {}: {err}", event.request_id);
                        return;
                    }
                };
                if state.status.is_terminal() {
                    return;
                }

                if let Err(err) = store.update(
                    &event.request_id,
                    StatePatch::new().with_status(RequestStatus::Running),
                ) {
                    warn!("could not mark {} running: {err}", event.request_id);
                    return;
                }

                let mut data = serde_json::Map::new();
                data.insert("url".into(), serde_json::json!(state.url));
                queue.enqueue(Task::new(Stage::VideoInfo, event.request_id.clone(), data));
            });
        }

        self.chain(EventType::VideoInfoFetched, Stage::AudioDownload, |state, _| {
            let mut data = serde_json::Map::new();
            data.insert("url".into(), serde_json::json!(state.url));
            data
        });

        self.chain(EventType::AudioDownloaded, Stage::Transcription, |state, event| {
            let mut data = serde_json::Map::new();
            let audio_path = state
                .audio_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .or_else(|| event.data_str("audio_path").map(str::to_string));
            if let Some(path) = audio_path {
                data.insert("audio_path".into(), serde_json::json!(path));
            }
            data
        });

        self.chain(
            EventType::TranscriptionCompleted,
            Stage::Summarization,
            |state, event| {
                let mut data = serde_json::Map::new();
                let transcript_path = state
                    .transcript_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned())
                    .or_else(|| event.data_str("transcript_path").map(str::to_string));
                if let Some(path) = transcript_path {
                    data.insert("transcript_path".into(), serde_json::json!(path));
                }
                data
            },
        );

        self.chain(EventType::SummarizationCompleted, Stage::Output, |state, event| {
            let mut data = serde_json::Map::new();
            let summary_path = state
                .summary_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .or_else(|| event.data_str("summary_path").map(str::to_string));
            if let Some(path) = summary_path {
                data.insert("summary_path".into(), serde_json::json!(path));
            }
            data
        });

        // Output drives the record terminal; cleanup must still run, so its
        // enqueue skips the terminal guard the other links use.
        {
            let queue = Arc::clone(&ctx.queue);
            ctx.bus.subscribe(EventType::OutputCompleted, move |event| {
                queue.enqueue(Task::new(
                    Stage::Cleanup,
                    event.request_id.clone(),
                    serde_json::Map::new(),
                ));
            });
        }
    }

    /// Subscribe one link of the stage chain: on `trigger`, enqueue a
    /// `next`-stage task whose payload is built by `payload` from current
    /// state and the triggering event. Requests already terminal (raced by
    /// cancellation) are skipped.
    fn chain<F>(&self, trigger: EventType, next: Stage, payload: F)
    where
        F: Fn(&ProcessingState, &Event) -> serde_json::Map<String, serde_json::Value>
            + Send
            + Sync
            + 'static,
    {
        let store = Arc::clone(&self.ctx.store);
        let queue = Arc::clone(&self.ctx.queue);
        self.ctx.bus.subscribe(trigger, move |event| {
            let state = match store.get(&event.request_id) {
                Ok(state) => state,
                Err(err) => {
                    error!("no state for request {}: {err}", event.request_id);
                    return;
                }
            };
            if state.status.is_terminal() {
                debug!(
                    "request {} is {}; not enqueueing {next}",
                    event.request_id, state.status
                );
                return;
            }
            queue.enqueue(Task::new(next, event.request_id.clone(), payload(&state, event)));
        });
    }

    /// Spawn the per-stage workers and the terminal-record GC sweep.
    pub fn start(&self) {
        for stage in Stage::ALL {
            let limit = self.config.concurrency.get(&stage).copied().unwrap_or(1);
            self.pool.set_limit(stage, limit);
        }

        let store = Arc::clone(&self.ctx.store);
        let ttl = self.config.request_ttl;
        let gc_interval = self.config.gc_interval;
        let mut stop_rx = self.gc_stop.subscribe();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(gc_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await; // immediate first tick
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let cutoff = Utc::now()
                            - chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(24));
                        store.gc_terminal(cutoff);
                    }
                    _ = stop_rx.changed() => break,
                }
            }
        });
        *self.gc_handle.lock().expect("engine lock poisoned") = Some(handle);

        info!("processing engine started");
    }

    /// Stop the GC sweep and drain all workers.
    pub async fn shutdown(&self) {
        let _ = self.gc_stop.send(true);
        let handle = self.gc_handle.lock().expect("engine lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.pool.shutdown().await;
        info!("processing engine stopped");
    }

    /// Cancel a request.
    ///
    /// Terminal requests return [`PipelineError::TerminalState`]. Otherwise
    /// the record flips to `Cancelled`, every queued task for it is purged,
    /// and `RequestCancelled` is published. In-flight work is not
    /// interrupted; its later writes bounce off the terminal guard.
    pub fn cancel(&self, request_id: &str) -> Result<()> {
        let state = self.ctx.store.get(request_id)?;
        if state.status.is_terminal() {
            return Err(PipelineError::TerminalState {
                request_id: request_id.to_string(),
                status: state.status,
            });
        }

        self.ctx.store.update(
            request_id,
            StatePatch::new()
                .with_status(RequestStatus::Cancelled)
                .with_completed_at(Utc::now()),
        )?;

        self.ctx.queue.remove_for_request(request_id);

        let mut data = serde_json::Map::new();
        data.insert("cancelled_at".into(), serde_json::json!(Utc::now()));
        self.ctx
            .publish(Event::new(request_id, EventType::RequestCancelled, data));

        info!("request {request_id} cancelled");
        Ok(())
    }

    /// Current state of a request.
    pub fn state(&self, request_id: &str) -> Result<ProcessingState> {
        self.ctx.store.get(request_id)
    }

    /// Recorded events for a request, in publication order.
    #[must_use]
    pub fn events(&self, request_id: &str) -> Vec<Event> {
        self.ctx.store.events_for(request_id)
    }

    /// Request count histogram by status.
    #[must_use]
    pub fn counts_by_status(&self) -> StatusCounts {
        self.ctx.store.counts_by_status()
    }

    /// All non-terminal requests.
    #[must_use]
    pub fn active_requests(&self) -> Vec<ProcessingState> {
        self.ctx.store.active_requests()
    }

    /// Queue depth for one stage (observability only).
    #[must_use]
    pub fn queue_len(&self, stage: Stage) -> usize {
        self.ctx.queue.len(stage)
    }

    /// Replace the worker set for one stage. Safe to call at any time;
    /// displaced workers finish their current task before exiting.
    pub fn set_stage_limit(&self, stage: Stage, count: usize) {
        self.pool.set_limit(stage, count);
    }
}

#[async_trait]
impl Submitter for ProcessingEngine {
    /// Accept a submission, deduplicating on `(url, prompt value, model)`.
    ///
    /// A fresh request is created `Pending` and `RequestAccepted` fires; a
    /// duplicate returns the existing request id without publishing.
    async fn submit(&self, submission: Submission) -> Result<SubmissionOutcome> {
        if submission.url.trim().is_empty() {
            return Err(PipelineError::InvalidInput("url is required".to_string()));
        }
        if !self.ctx.fetcher.supports_url(&submission.url) {
            return Err(PipelineError::InvalidInput(format!(
                "unsupported url: {}",
                submission.url
            )));
        }

        let fingerprint = Fingerprint::new(
            &submission.url,
            &submission.prompt.value,
            &self.config.model,
        );

        let request_id = format!("req-{}", Uuid::new_v4());
        let state = ProcessingState::new(
            request_id,
            submission.url.clone(),
            submission.prompt,
            submission.source_type,
            submission
                .category
                .unwrap_or_else(|| self.config.default_category.clone()),
            submission
                .user
                .unwrap_or_else(|| self.config.default_user.clone()),
            submission.max_tokens.unwrap_or(self.config.max_tokens),
        );

        let (request_id, already_existed) = self.ctx.store.create_or_get_dedup(fingerprint, state);
        if already_existed {
            debug!(
                "submission for {} deduplicated to request {request_id}",
                submission.url
            );
            return Ok(SubmissionOutcome {
                request_id,
                deduplicated: true,
            });
        }

        info!("accepted request {request_id} for {}", submission.url);
        let mut data = serde_json::Map::new();
        data.insert("url".into(), serde_json::json!(submission.url));
        self.ctx
            .publish(Event::new(&request_id, EventType::RequestAccepted, data));

        Ok(SubmissionOutcome {
            request_id,
            deduplicated: false,
        })
    }
}
