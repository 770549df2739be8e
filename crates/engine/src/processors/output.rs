//! Output stage: publish the summary and transcript, decide the final status
//!
//! Uploads run only when `video_info` is present (the publisher derives the
//! output filename from the title). Upload errors are collected rather than
//! short-circuiting so a transcript failure does not block the summary;
//! any collected error makes the request `Failed` with a combined message.

use async_trait::async_trait;
use tracing::{debug, error, info};

use video_digest_common::{Event, EventType, RequestStatus, Result, Stage, StatePatch, Task};

use crate::context::EngineContext;
use crate::dispatcher::StageProcessor;

pub struct OutputProcessor;

#[async_trait]
impl StageProcessor for OutputProcessor {
    fn stage(&self) -> Stage {
        Stage::Output
    }

    async fn process(&self, task: &Task, ctx: &EngineContext) -> Result<()> {
        info!("processing output for request {}", task.request_id);

        if ctx.is_finished(&task.request_id) {
            debug!("request {} already terminal, skipping", task.request_id);
            return Ok(());
        }

        let state = ctx.store.get(&task.request_id)?;
        let mut upload_errors: Vec<String> = Vec::new();
        let mut summary_location: Option<String> = None;

        if let (Some(publisher), Some(info)) = (ctx.publisher.as_ref(), state.video_info.as_ref())
        {
            if let Some(summary_path) = state.summary_path.as_deref() {
                match publisher
                    .upload_summary(
                        &task.request_id,
                        info,
                        summary_path,
                        &state.category,
                        &state.user,
                    )
                    .await
                {
                    Ok(location) => {
                        debug!("summary for {} uploaded to {location}", task.request_id);
                        summary_location = Some(location);
                    }
                    Err(err) => {
                        let message = format!("summary upload error: {err}");
                        error!("{message}");
                        upload_errors.push(message);
                    }
                }
            }

            if let Some(transcript_path) = state.transcript_path.as_deref() {
                match publisher
                    .upload_transcript(
                        &task.request_id,
                        info,
                        transcript_path,
                        &state.category,
                        &state.user,
                    )
                    .await
                {
                    Ok(location) => {
                        debug!("transcript for {} uploaded to {location}", task.request_id);
                    }
                    Err(err) => {
                        let message = format!("transcript upload error: {err}");
                        error!("{message}");
                        upload_errors.push(message);
                    }
                }
            }
        } else {
            debug!(
                "request {}: no publisher or no video info, skipping uploads",
                task.request_id
            );
        }

        let final_status = if upload_errors.is_empty() {
            RequestStatus::Completed
        } else {
            RequestStatus::Failed
        };

        let mut patch = StatePatch::new().with_status(final_status);
        if let Some(location) = summary_location {
            patch = patch.with_output_path(location);
        }
        if !upload_errors.is_empty() {
            patch = patch.with_error(format!("upload errors: {}", upload_errors.join("; ")));
        }
        ctx.store.update(&task.request_id, patch)?;

        info!(
            "output finished for request {} with status {final_status}",
            task.request_id
        );

        let mut data = serde_json::Map::new();
        data.insert("status".into(), serde_json::json!(final_status.as_str()));
        ctx.publish(Event::new(
            task.request_id.clone(),
            EventType::OutputCompleted,
            data,
        ));

        Ok(())
    }
}
