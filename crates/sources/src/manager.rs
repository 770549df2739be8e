//! Poller lifecycle management

use std::sync::{Arc, Mutex};

use tracing::info;

use crate::poller::Poller;

struct SourceEntry {
    poller: Arc<Poller>,
    enabled: bool,
}

/// Named collection of background pollers
#[derive(Default)]
pub struct SourceManager {
    entries: Mutex<Vec<SourceEntry>>,
}

impl SourceManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a poller. Disabled pollers are kept for listing but never
    /// started.
    pub fn add(&self, poller: Arc<Poller>, enabled: bool) {
        self.entries
            .lock()
            .expect("source manager lock poisoned")
            .push(SourceEntry { poller, enabled });
    }

    /// Start every enabled poller. Each poller runs in isolation; one
    /// failing never stops the others.
    pub fn start_enabled(&self) {
        let entries = self.entries.lock().expect("source manager lock poisoned");
        let mut started = 0;
        for entry in entries.iter() {
            if entry.enabled {
                entry.poller.start();
                started += 1;
            } else {
                info!("source {} is disabled, not starting", entry.poller.name());
            }
        }
        info!("started {started} background source(s)");
    }

    /// Stop all running pollers and wait for their loops to exit.
    pub async fn stop_all(&self) {
        let pollers: Vec<Arc<Poller>> = {
            let entries = self.entries.lock().expect("source manager lock poisoned");
            entries.iter().map(|e| Arc::clone(&e.poller)).collect()
        };
        for poller in pollers {
            poller.stop().await;
        }
        info!("all background sources stopped");
    }

    /// Names of the enabled sources (health endpoint).
    #[must_use]
    pub fn enabled_names(&self) -> Vec<String> {
        self.entries
            .lock()
            .expect("source manager lock poisoned")
            .iter()
            .filter(|e| e.enabled)
            .map(|e| e.poller.name().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use video_digest_common::{Result, Submission, SubmissionOutcome, Submitter};

    use super::*;
    use crate::discovery::StaticListDiscovery;

    struct CountingSubmitter;

    #[async_trait]
    impl Submitter for CountingSubmitter {
        async fn submit(&self, _submission: Submission) -> Result<SubmissionOutcome> {
            Ok(SubmissionOutcome {
                request_id: "req-x".to_string(),
                deduplicated: false,
            })
        }
    }

    fn poller(name: &str) -> Arc<Poller> {
        Arc::new(Poller::new(
            name,
            Duration::from_secs(3600),
            "general",
            None,
            Arc::new(StaticListDiscovery::new(Vec::new())),
            Arc::new(CountingSubmitter),
        ))
    }

    #[tokio::test]
    async fn test_only_enabled_sources_start() {
        let manager = SourceManager::new();
        let enabled = poller("enabled-source");
        let disabled = poller("disabled-source");
        manager.add(Arc::clone(&enabled), true);
        manager.add(Arc::clone(&disabled), false);

        manager.start_enabled();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(enabled.is_running());
        assert!(!disabled.is_running());
        assert_eq!(manager.enabled_names(), vec!["enabled-source".to_string()]);

        manager.stop_all().await;
        assert!(!enabled.is_running());
    }

    #[tokio::test]
    async fn test_stop_all_without_start_is_fine() {
        let manager = SourceManager::new();
        manager.add(poller("idle"), true);
        manager.stop_all().await;
    }
}
