//! Per-stage worker pool
//!
//! Each stage gets a fixed number of long-lived tokio tasks that pull from
//! the task queue and hand work to the dispatcher. Concurrency is bounded
//! per stage so expensive stages (transcription, summarization) can be
//! tuned independently of cheap ones.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use video_digest_common::Stage;

use crate::context::EngineContext;
use crate::dispatcher::ProcessorRegistry;
use crate::queue::TaskQueue;

/// How long an idle worker sleeps before polling the queue again. An
/// enqueue becomes visible to some worker within this bound.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

struct StageWorkers {
    stop_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

/// Bounded per-stage worker sets
pub struct WorkerPool {
    queue: Arc<TaskQueue>,
    registry: Arc<ProcessorRegistry>,
    ctx: Arc<EngineContext>,
    poll_interval: Duration,
    stages: Mutex<HashMap<Stage, StageWorkers>>,
    /// Workers displaced by reconfiguration; joined at shutdown.
    retired: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    #[must_use]
    pub fn new(
        queue: Arc<TaskQueue>,
        registry: Arc<ProcessorRegistry>,
        ctx: Arc<EngineContext>,
    ) -> Self {
        Self {
            queue,
            registry,
            ctx,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stages: Mutex::new(HashMap::new()),
            retired: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the worker count for `stage`, replacing any existing workers.
    ///
    /// Old workers are signalled to stop and drain (they finish their
    /// current task); the replacements start immediately. `count = 0`
    /// leaves the stage unmanned — queued tasks accumulate until a later
    /// reconfiguration.
    pub fn set_limit(&self, stage: Stage, count: usize) {
        let (stop_tx, stop_rx) = watch::channel(false);

        let mut handles = Vec::with_capacity(count);
        for worker_index in 0..count {
            handles.push(self.spawn_worker(stage, worker_index, stop_rx.clone()));
        }

        let replaced = self.stages.lock().expect("worker pool lock poisoned").insert(
            stage,
            StageWorkers { stop_tx, handles },
        );

        if let Some(old) = replaced {
            let _ = old.stop_tx.send(true);
            self.retired
                .lock()
                .expect("worker pool lock poisoned")
                .extend(old.handles);
        }

        info!("stage {stage}: {count} worker(s) running");
    }

    fn spawn_worker(
        &self,
        stage: Stage,
        worker_index: usize,
        mut stop_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let registry = Arc::clone(&self.registry);
        let ctx = Arc::clone(&self.ctx);
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            debug!("worker {stage}/{worker_index} started");
            loop {
                if *stop_rx.borrow() {
                    break;
                }

                match queue.dequeue(stage) {
                    Some(task) => {
                        debug!(
                            "worker {stage}/{worker_index} picked up task {} for request {}",
                            task.id, task.request_id
                        );
                        registry.dispatch(&task, &ctx).await;
                    }
                    None => {
                        // Idle: sleep, but wake early on the stop signal.
                        tokio::select! {
                            _ = tokio::time::sleep(poll_interval) => {}
                            _ = stop_rx.changed() => {}
                        }
                    }
                }
            }
            debug!("worker {stage}/{worker_index} exited");
        })
    }

    /// Signal every worker to stop and wait until all have exited.
    /// Workers finish their in-flight task first.
    pub async fn shutdown(&self) {
        let mut all_handles = Vec::new();

        {
            let mut stages = self.stages.lock().expect("worker pool lock poisoned");
            for (_, workers) in stages.drain() {
                let _ = workers.stop_tx.send(true);
                all_handles.extend(workers.handles);
            }
        }
        all_handles.extend(
            self.retired
                .lock()
                .expect("worker pool lock poisoned")
                .drain(..),
        );

        for handle in all_handles {
            let _ = handle.await;
        }
        info!("worker pool stopped");
    }
}
