//! Cleanup stage: delete local artifacts and stamp the finish time
//!
//! The single deleter of record for the three artifact paths. Deletion
//! failures (including files a publisher already removed after upload) are
//! warnings only and never change the request status, which output has
//! already driven terminal.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use video_digest_common::{Event, EventType, Result, Stage, StatePatch, Task};

use crate::context::EngineContext;
use crate::dispatcher::StageProcessor;

pub struct CleanupProcessor;

async fn remove_artifact(request_id: &str, label: &str, path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("removed {label} file {} for {request_id}", path.display()),
        Err(err) => warn!(
            "failed to remove {label} file {} for {request_id}: {err}",
            path.display()
        ),
    }
}

#[async_trait]
impl StageProcessor for CleanupProcessor {
    fn stage(&self) -> Stage {
        Stage::Cleanup
    }

    async fn process(&self, task: &Task, ctx: &EngineContext) -> Result<()> {
        info!("processing cleanup for request {}", task.request_id);

        let state = ctx.store.get(&task.request_id)?;

        if let Some(path) = state.audio_path.as_deref() {
            remove_artifact(&task.request_id, "audio", path).await;
        }
        if let Some(path) = state.transcript_path.as_deref() {
            remove_artifact(&task.request_id, "transcript", path).await;
        }
        if let Some(path) = state.summary_path.as_deref() {
            remove_artifact(&task.request_id, "summary", path).await;
        }

        // completed_at is the one field writable on a terminal record.
        ctx.store.update(
            &task.request_id,
            StatePatch::new().with_completed_at(Utc::now()),
        )?;

        let mut data = serde_json::Map::new();
        data.insert("status".into(), serde_json::json!(state.status.as_str()));
        ctx.publish(Event::new(
            task.request_id.clone(),
            EventType::ProcessingCompleted,
            data,
        ));

        Ok(())
    }
}
