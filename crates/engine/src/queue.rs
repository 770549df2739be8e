//! Per-stage FIFO task queues

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tracing::debug;

use video_digest_common::{Stage, Task};

/// Thread-safe mapping from stage to a FIFO of pending tasks
///
/// FIFO order is guaranteed per stage; there is no ordering across stages.
#[derive(Default)]
pub struct TaskQueue {
    queues: Mutex<HashMap<Stage, VecDeque<Task>>>,
}

impl TaskQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task to its stage's queue.
    pub fn enqueue(&self, task: Task) {
        debug!(
            "enqueued {} task {} for request {}",
            task.stage, task.id, task.request_id
        );
        self.queues
            .lock()
            .expect("task queue lock poisoned")
            .entry(task.stage)
            .or_default()
            .push_back(task);
    }

    /// Pop the head task for `stage`, if any.
    pub fn dequeue(&self, stage: Stage) -> Option<Task> {
        self.queues
            .lock()
            .expect("task queue lock poisoned")
            .get_mut(&stage)
            .and_then(VecDeque::pop_front)
    }

    /// Number of tasks waiting for `stage`.
    #[must_use]
    pub fn len(&self, stage: Stage) -> usize {
        self.queues
            .lock()
            .expect("task queue lock poisoned")
            .get(&stage)
            .map_or(0, VecDeque::len)
    }

    #[must_use]
    pub fn is_empty(&self, stage: Stage) -> bool {
        self.len(stage) == 0
    }

    /// Drop every queued task for `request_id`, across all stages.
    ///
    /// Used by cancellation. In-flight tasks are unaffected; the terminal
    /// state guard swallows their late writes. Returns the number removed.
    pub fn remove_for_request(&self, request_id: &str) -> usize {
        let mut queues = self.queues.lock().expect("task queue lock poisoned");
        let mut removed = 0;
        for queue in queues.values_mut() {
            let before = queue.len();
            queue.retain(|task| task.request_id != request_id);
            removed += before - queue.len();
        }
        if removed > 0 {
            debug!("removed {removed} queued task(s) for request {request_id}");
        }
        removed
    }
}
