//! Stage processor registry and dispatch

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, warn};

use video_digest_common::{Result, Stage, Task};

use crate::context::EngineContext;
use crate::processors;

/// One pipeline stage's execution logic
///
/// Contract: read current state and return immediately if the request is
/// terminal; call the collaborator; on success patch state and publish the
/// stage-completion event; on failure persist `Failed` and return the error
/// (which the dispatcher logs and swallows — workers never die on a stage
/// error and nothing retries).
#[async_trait]
pub trait StageProcessor: Send + Sync {
    /// The stage this processor serves.
    fn stage(&self) -> Stage;

    /// Execute one task.
    async fn process(&self, task: &Task, ctx: &EngineContext) -> Result<()>;
}

/// Immutable `stage → processor` routing table
pub struct ProcessorRegistry {
    processors: HashMap<Stage, Arc<dyn StageProcessor>>,
}

impl ProcessorRegistry {
    /// Empty registry; callers register processors explicitly.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            processors: HashMap::new(),
        }
    }

    /// Registry with the six standard pipeline processors.
    #[must_use]
    pub fn with_default_processors() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(processors::VideoInfoProcessor));
        registry.register(Arc::new(processors::AudioDownloadProcessor));
        registry.register(Arc::new(processors::TranscriptionProcessor));
        registry.register(Arc::new(processors::SummarizationProcessor));
        registry.register(Arc::new(processors::OutputProcessor));
        registry.register(Arc::new(processors::CleanupProcessor));
        registry
    }

    /// Register (or replace) the processor for its stage.
    pub fn register(&mut self, processor: Arc<dyn StageProcessor>) {
        self.processors.insert(processor.stage(), processor);
    }

    #[must_use]
    pub fn get(&self, stage: Stage) -> Option<Arc<dyn StageProcessor>> {
        self.processors.get(&stage).cloned()
    }

    /// Route `task` to its stage's processor.
    ///
    /// Processor errors are logged and dropped here: the failure is already
    /// persisted in request state, and the calling worker must survive to
    /// pick up its next task.
    pub async fn dispatch(&self, task: &Task, ctx: &EngineContext) {
        let Some(processor) = self.get(task.stage) else {
            error!("no processor registered for stage {}", task.stage);
            return;
        };

        if let Err(err) = processor.process(task, ctx).await {
            warn!(
                "{} processor failed for request {}: {err}",
                task.stage, task.request_id
            );
        }
    }
}
