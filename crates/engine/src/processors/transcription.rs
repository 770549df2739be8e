//! Transcription stage: turn the audio artifact into a transcript file

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info};

use video_digest_common::{Event, EventType, PipelineError, Result, Stage, StatePatch, Task};

use crate::context::EngineContext;
use crate::dispatcher::StageProcessor;

pub struct TranscriptionProcessor;

#[async_trait]
impl StageProcessor for TranscriptionProcessor {
    fn stage(&self) -> Stage {
        Stage::Transcription
    }

    async fn process(&self, task: &Task, ctx: &EngineContext) -> Result<()> {
        info!("processing transcription for request {}", task.request_id);

        if ctx.is_finished(&task.request_id) {
            debug!("request {} already terminal, skipping", task.request_id);
            return Ok(());
        }

        let audio_path = match task.data_str("audio_path") {
            Some(path) => PathBuf::from(path),
            None => match ctx.store.get(&task.request_id)?.audio_path {
                Some(path) => path,
                None => {
                    let err = PipelineError::InvalidInput(
                        "transcription task has no audio path".to_string(),
                    );
                    ctx.fail_request(&task.request_id, err.to_string());
                    return Err(err);
                }
            },
        };

        let transcript_path = match ctx.transcriber.transcribe(&audio_path).await {
            Ok(path) => path,
            Err(err) => {
                ctx.fail_request(&task.request_id, format!("failed to transcribe audio: {err}"));
                return Err(err);
            }
        };

        ctx.store.update(
            &task.request_id,
            StatePatch::new().with_transcript_path(transcript_path.clone()),
        )?;

        let mut data = serde_json::Map::new();
        data.insert(
            "transcript_path".into(),
            serde_json::json!(transcript_path.to_string_lossy()),
        );
        ctx.publish(Event::new(
            task.request_id.clone(),
            EventType::TranscriptionCompleted,
            data,
        ));

        Ok(())
    }
}
