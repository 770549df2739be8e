//! Background poller
//!
//! Runs its discovery once at start and then on every interval tick until
//! stopped. Each discovered URL is submitted independently; a failed
//! submission or a failed cycle is logged and the poller carries on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use video_digest_common::{PromptSpec, Submission, Submitter};

use crate::discovery::Discovery;

#[derive(Debug)]
struct PollerInner {
    name: String,
    interval: Duration,
    prompt_id: String,
    category: Option<String>,
    discovery: Arc<dyn Discovery>,
    submitter: Arc<dyn Submitter>,
    running: AtomicBool,
}

impl PollerInner {
    /// One discovery cycle: find URLs and submit each of them.
    async fn run_cycle(&self) {
        let urls = match self.discovery.discover().await {
            Ok(urls) => urls,
            Err(err) => {
                warn!("poller {}: discovery failed: {err}", self.name);
                return;
            }
        };
        if urls.is_empty() {
            debug!("poller {}: nothing discovered", self.name);
            return;
        }

        let mut submitted = 0usize;
        for url in urls {
            let mut submission = Submission::new(&url, PromptSpec::id(&self.prompt_id));
            if let Some(category) = &self.category {
                submission = submission.with_category(category.clone());
            }

            match self.submitter.submit(submission).await {
                Ok(outcome) => {
                    submitted += 1;
                    if outcome.deduplicated {
                        debug!(
                            "poller {}: {url} already tracked as {}",
                            self.name, outcome.request_id
                        );
                    } else {
                        info!(
                            "poller {}: submitted {url} as {}",
                            self.name, outcome.request_id
                        );
                    }
                }
                Err(err) => warn!("poller {}: failed to submit {url}: {err}", self.name),
            }
        }
        debug!("poller {}: cycle submitted {submitted} url(s)", self.name);
    }
}

/// A named background discovery loop
#[derive(Debug)]
pub struct Poller {
    inner: Arc<PollerInner>,
    stop_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Poller {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        interval: Duration,
        prompt_id: impl Into<String>,
        category: Option<String>,
        discovery: Arc<dyn Discovery>,
        submitter: Arc<dyn Submitter>,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(PollerInner {
                name: name.into(),
                interval,
                prompt_id: prompt_id.into(),
                category,
                discovery,
                submitter,
                running: AtomicBool::new(false),
            }),
            stop_tx,
            handle: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Start the polling loop. A second start while running is a no-op.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            warn!("poller {} is already running", self.inner.name);
            return;
        }
        let _ = self.stop_tx.send(false);

        let inner = Arc::clone(&self.inner);
        let mut stop_rx = self.stop_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => inner.run_cycle().await,
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            inner.running.store(false, Ordering::SeqCst);
            debug!("poller {} exited", inner.name);
        });

        *self.handle.lock().expect("poller lock poisoned") = Some(handle);
        info!(
            "poller {} started (interval {:?})",
            self.inner.name, self.inner.interval
        );
    }

    /// Signal the loop to stop and wait for any in-flight cycle to finish.
    pub async fn stop(&self) {
        if !self.is_running() {
            return;
        }
        let _ = self.stop_tx.send(true);
        let handle = self.handle.lock().expect("poller lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!("poller {} stopped", self.inner.name);
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use video_digest_common::{PipelineError, Result, Submission, SubmissionOutcome};

    use super::*;
    use crate::discovery::StaticListDiscovery;

    #[derive(Default)]
    struct RecordingSubmitter {
        submissions: Mutex<Vec<Submission>>,
        fail_all: AtomicBool,
    }

    #[async_trait]
    impl Submitter for RecordingSubmitter {
        async fn submit(&self, submission: Submission) -> Result<SubmissionOutcome> {
            if self.fail_all.load(Ordering::SeqCst) {
                return Err(PipelineError::InvalidInput("rejected".to_string()));
            }
            let id = format!("req-{}", self.submissions.lock().unwrap().len());
            self.submissions.lock().unwrap().push(submission);
            Ok(SubmissionOutcome {
                request_id: id,
                deduplicated: false,
            })
        }
    }

    fn list_poller(
        urls: Vec<String>,
        submitter: Arc<RecordingSubmitter>,
        interval: Duration,
    ) -> Poller {
        Poller::new(
            "test-source",
            interval,
            "key_points",
            Some("tech".to_string()),
            Arc::new(StaticListDiscovery::new(urls)),
            submitter,
        )
    }

    #[tokio::test]
    async fn test_poller_submits_discovered_urls_with_attributes() {
        let submitter = Arc::new(RecordingSubmitter::default());
        let poller = list_poller(
            vec![
                "https://example.com/u1".to_string(),
                "https://example.com/u2".to_string(),
            ],
            Arc::clone(&submitter),
            Duration::from_millis(10),
        );

        poller.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        poller.stop().await;

        let submissions = submitter.submissions.lock().unwrap();
        // Runs immediately plus several ticks: at least both URLs once.
        assert!(submissions.len() >= 2, "got {} submissions", submissions.len());
        for submission in submissions.iter() {
            assert_eq!(submission.prompt, PromptSpec::id("key_points"));
            assert_eq!(submission.category.as_deref(), Some("tech"));
        }
        assert!(submissions.iter().any(|s| s.url.ends_with("/u1")));
        assert!(submissions.iter().any(|s| s.url.ends_with("/u2")));
    }

    #[tokio::test]
    async fn test_poller_survives_submitter_failures() {
        let submitter = Arc::new(RecordingSubmitter::default());
        submitter.fail_all.store(true, Ordering::SeqCst);
        let poller = list_poller(
            vec!["https://example.com/u1".to_string()],
            Arc::clone(&submitter),
            Duration::from_millis(10),
        );

        poller.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(poller.is_running());

        // Recovers once submissions succeed again.
        submitter.fail_all.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        poller.stop().await;

        assert!(!submitter.submissions.lock().unwrap().is_empty());
        assert!(!poller.is_running());
    }

    #[tokio::test]
    async fn test_double_start_is_noop_and_stop_is_idempotent() {
        let submitter = Arc::new(RecordingSubmitter::default());
        let poller = list_poller(Vec::new(), submitter, Duration::from_secs(3600));

        poller.start();
        poller.start();
        assert!(poller.is_running());

        poller.stop().await;
        assert!(!poller.is_running());
        poller.stop().await;
    }
}
