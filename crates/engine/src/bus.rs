//! Synchronous in-process event bus
//!
//! Topic-keyed fan-out to registered handlers. `publish` runs every handler
//! for the event's type on the caller's stack, in subscription order, before
//! returning — the bus never buffers or reorders, so per-request event order
//! is exactly publication order. Handlers must stay non-blocking: they
//! update state or enqueue tasks and return; long work belongs in a stage
//! processor.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::trace;

use video_digest_common::{Event, EventType};

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Topic → ordered handler list
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<EventType, Vec<Handler>>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event_type`, after any existing handlers.
    pub fn subscribe<F>(&self, event_type: EventType, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .expect("event bus lock poisoned")
            .entry(event_type)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Dispatch `event` to every handler of its type, synchronously.
    ///
    /// The handler list is snapshotted first, so a handler may subscribe
    /// without deadlocking (new subscriptions take effect from the next
    /// publish).
    pub fn publish(&self, event: &Event) {
        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .expect("event bus lock poisoned")
            .get(&event.event_type)
            .cloned()
            .unwrap_or_default();

        trace!(
            "dispatching {} to {} handler(s) for request {}",
            event.event_type,
            handlers.len(),
            event.request_id
        );

        for handler in handlers {
            handler(event);
        }
    }
}
