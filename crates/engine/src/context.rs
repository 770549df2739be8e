//! Capability view handed to stage processors
//!
//! Processors never see the engine itself; they get this narrow bundle of
//! the stores and collaborators they are allowed to touch. All coupling
//! between stages flows through events published here.

use std::sync::Arc;

use tracing::{debug, error};

use video_digest_common::{
    Event, MediaFetcher, PipelineError, PromptResolver, Publisher, RequestStatus, StatePatch,
    Summarizer, Transcriber,
};

use crate::bus::EventBus;
use crate::queue::TaskQueue;
use crate::store::StateStore;

/// Everything a stage processor may access
pub struct EngineContext {
    pub store: Arc<StateStore>,
    pub bus: Arc<EventBus>,
    pub queue: Arc<TaskQueue>,
    pub prompts: Arc<dyn PromptResolver>,

    pub fetcher: Arc<dyn MediaFetcher>,
    pub transcriber: Arc<dyn Transcriber>,
    pub summarizer: Arc<dyn Summarizer>,
    /// Optional: without a publisher, output completes without uploads.
    pub publisher: Option<Arc<dyn Publisher>>,
}

impl EngineContext {
    /// Record `event` in the store's log, then dispatch it on the bus.
    ///
    /// Logging first keeps the event log a faithful prefix of what handlers
    /// have observed.
    pub fn publish(&self, event: Event) {
        self.store.log_event(event.clone());
        self.bus.publish(&event);
    }

    /// Persist a stage failure: `status = Failed` plus the error message.
    ///
    /// A terminal-state rejection means the request was cancelled (or
    /// already failed) while the stage was in flight; the late failure
    /// is not recorded.
    pub fn fail_request(&self, request_id: &str, message: String) {
        error!("request {request_id} failed: {message}");
        let patch = StatePatch::new()
            .with_status(RequestStatus::Failed)
            .with_error(message);
        match self.store.update(request_id, patch) {
            Ok(()) => {}
            Err(PipelineError::TerminalState { status, .. }) => {
                debug!("request {request_id} already {status}; failure not recorded");
            }
            Err(err) => error!("could not record failure for {request_id}: {err}"),
        }
    }

    /// True when the request is already in a terminal status (or gone).
    /// Late-arriving work for such requests is swallowed.
    #[must_use]
    pub fn is_finished(&self, request_id: &str) -> bool {
        match self.store.get(request_id) {
            Ok(state) => state.status.is_terminal(),
            Err(_) => true,
        }
    }
}
