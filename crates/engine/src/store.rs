//! In-memory request state store
//!
//! Single source of truth for request state, the per-request event log, and
//! the deduplication index. One `RwLock` guards all three maps so every
//! operation is one logical critical section; readers get cloned snapshots
//! and never observe a partially applied patch.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::debug;

use video_digest_common::{
    Event, Fingerprint, PipelineError, ProcessingState, RequestStatus, Result, StatePatch,
    StatusCounts,
};

#[derive(Default)]
struct StoreInner {
    requests: HashMap<String, ProcessingState>,
    events: HashMap<String, Vec<Event>>,
    dedup: HashMap<Fingerprint, String>,
}

/// Thread-safe in-memory state store
#[derive(Default)]
pub struct StateStore {
    inner: RwLock<StoreInner>,
}

impl StateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `state` for its fingerprint, or return the id of an existing
    /// equivalent request.
    ///
    /// Returns `(request_id, already_existed)`. An existing mapping is
    /// honored only while its record is not `Failed`; a failed record
    /// releases the fingerprint and the new request replaces the mapping.
    pub fn create_or_get_dedup(
        &self,
        fingerprint: Fingerprint,
        state: ProcessingState,
    ) -> (String, bool) {
        let mut inner = self.inner.write().expect("state store lock poisoned");

        if let Some(existing_id) = inner.dedup.get(&fingerprint) {
            if let Some(existing) = inner.requests.get(existing_id) {
                if existing.status != RequestStatus::Failed {
                    return (existing_id.clone(), true);
                }
            }
            // Failed or dangling mapping: the new request claims the key.
        }

        let request_id = state.request_id.clone();
        inner.requests.insert(request_id.clone(), state);
        inner.dedup.insert(fingerprint, request_id.clone());
        (request_id, false)
    }

    /// Snapshot of a request's state.
    pub fn get(&self, request_id: &str) -> Result<ProcessingState> {
        self.inner
            .read()
            .expect("state store lock poisoned")
            .requests
            .get(request_id)
            .cloned()
            .ok_or_else(|| PipelineError::RequestNotFound(request_id.to_string()))
    }

    /// Merge a typed patch into a record.
    ///
    /// Rejects writes against terminal records unless the patch touches only
    /// `completed_at` (cleanup stamps its finish time on records that output
    /// already drove terminal). `updated_at` advances monotonically.
    pub fn update(&self, request_id: &str, patch: StatePatch) -> Result<()> {
        let mut inner = self.inner.write().expect("state store lock poisoned");
        let state = inner
            .requests
            .get_mut(request_id)
            .ok_or_else(|| PipelineError::RequestNotFound(request_id.to_string()))?;

        if state.status.is_terminal() && !patch.only_touches_completed_at() {
            return Err(PipelineError::TerminalState {
                request_id: request_id.to_string(),
                status: state.status,
            });
        }

        patch.apply(state);
        state.updated_at = state.updated_at.max(Utc::now());
        Ok(())
    }

    /// Remove a record and its event log. Not used on the hot path.
    pub fn delete(&self, request_id: &str) -> Result<()> {
        let mut inner = self.inner.write().expect("state store lock poisoned");
        if inner.requests.remove(request_id).is_none() {
            return Err(PipelineError::RequestNotFound(request_id.to_string()));
        }
        inner.events.remove(request_id);
        inner.dedup.retain(|_, id| id.as_str() != request_id);
        Ok(())
    }

    /// Append an event to its request's log.
    pub fn log_event(&self, event: Event) {
        let mut inner = self.inner.write().expect("state store lock poisoned");
        inner
            .events
            .entry(event.request_id.clone())
            .or_default()
            .push(event);
    }

    /// Events recorded for a request, in publication order.
    #[must_use]
    pub fn events_for(&self, request_id: &str) -> Vec<Event> {
        self.inner
            .read()
            .expect("state store lock poisoned")
            .events
            .get(request_id)
            .cloned()
            .unwrap_or_default()
    }

    /// All records not yet in a terminal status.
    #[must_use]
    pub fn active_requests(&self) -> Vec<ProcessingState> {
        self.inner
            .read()
            .expect("state store lock poisoned")
            .requests
            .values()
            .filter(|s| !s.status.is_terminal())
            .cloned()
            .collect()
    }

    /// Purge terminal records last touched before `older_than`, along with
    /// their event logs and dedup entries. Returns the number purged.
    pub fn gc_terminal(&self, older_than: DateTime<Utc>) -> usize {
        let mut inner = self.inner.write().expect("state store lock poisoned");

        let expired: Vec<String> = inner
            .requests
            .values()
            .filter(|s| s.status.is_terminal() && s.updated_at < older_than)
            .map(|s| s.request_id.clone())
            .collect();

        for id in &expired {
            inner.requests.remove(id);
            inner.events.remove(id);
        }
        inner
            .dedup
            .retain(|_, id| !expired.iter().any(|e| e == id.as_str()));

        if !expired.is_empty() {
            debug!("purged {} terminal request(s)", expired.len());
        }
        expired.len()
    }

    /// Histogram of request counts by status name.
    #[must_use]
    pub fn counts_by_status(&self) -> StatusCounts {
        let inner = self.inner.read().expect("state store lock poisoned");
        let mut counts = StatusCounts::new();
        for state in inner.requests.values() {
            *counts.entry(state.status.as_str().to_string()).or_insert(0) += 1;
        }
        counts
    }
}
