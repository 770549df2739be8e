//! Summarization stage: summarize the transcript under the request's prompt
//!
//! Prompt resolution: an `id` prompt is looked up in the catalog and falls
//! back to the raw identifier as literal text when unknown; a `text` prompt
//! is used verbatim; an empty value falls back to [`DEFAULT_PROMPT`].

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use video_digest_common::{
    Event, EventType, PipelineError, PromptKind, Result, Stage, StatePatch, Task,
};

use crate::context::EngineContext;
use crate::dispatcher::StageProcessor;

/// System prompt used when the submission carried an empty prompt value.
pub const DEFAULT_PROMPT: &str = "Summarize the following transcript.";

pub struct SummarizationProcessor;

#[async_trait]
impl StageProcessor for SummarizationProcessor {
    fn stage(&self) -> Stage {
        Stage::Summarization
    }

    async fn process(&self, task: &Task, ctx: &EngineContext) -> Result<()> {
        info!("processing summarization for request {}", task.request_id);

        if ctx.is_finished(&task.request_id) {
            debug!("request {} already terminal, skipping", task.request_id);
            return Ok(());
        }

        let state = ctx.store.get(&task.request_id)?;

        let transcript_path = match task.data_str("transcript_path") {
            Some(path) => PathBuf::from(path),
            None => match state.transcript_path.clone() {
                Some(path) => path,
                None => {
                    let err = PipelineError::InvalidInput(
                        "summarization task has no transcript path".to_string(),
                    );
                    ctx.fail_request(&task.request_id, err.to_string());
                    return Err(err);
                }
            },
        };

        let transcript = match tokio::fs::read_to_string(&transcript_path).await {
            Ok(text) => text,
            Err(err) => {
                ctx.fail_request(
                    &task.request_id,
                    format!("failed to read transcript file: {err}"),
                );
                return Err(err.into());
            }
        };

        let prompt_text = match state.prompt.kind {
            PromptKind::Id => match ctx.prompts.resolve(&state.prompt.value) {
                Some(content) => content,
                None => {
                    if !state.prompt.value.is_empty() {
                        warn!(
                            "prompt id '{}' not found, using it as literal prompt text",
                            state.prompt.value
                        );
                    }
                    state.prompt.value.clone()
                }
            },
            PromptKind::Text => state.prompt.value.clone(),
        };
        let prompt_text = if prompt_text.is_empty() {
            DEFAULT_PROMPT.to_string()
        } else {
            prompt_text
        };

        let summary_path = match ctx
            .summarizer
            .summarize(&transcript, &prompt_text, state.max_tokens)
            .await
        {
            Ok(path) => path,
            Err(err) => {
                ctx.fail_request(&task.request_id, format!("failed to summarize text: {err}"));
                return Err(err);
            }
        };

        ctx.store.update(
            &task.request_id,
            StatePatch::new().with_summary_path(summary_path.clone()),
        )?;

        let mut data = serde_json::Map::new();
        data.insert(
            "summary_path".into(),
            serde_json::json!(summary_path.to_string_lossy()),
        );
        ctx.publish(Event::new(
            task.request_id.clone(),
            EventType::SummarizationCompleted,
            data,
        ));

        Ok(())
    }
}
