//! Audio download stage: produce a local audio artifact for the URL

use async_trait::async_trait;
use tracing::{debug, info};

use video_digest_common::{Event, EventType, Result, Stage, StatePatch, Task};

use crate::context::EngineContext;
use crate::dispatcher::StageProcessor;

pub struct AudioDownloadProcessor;

#[async_trait]
impl StageProcessor for AudioDownloadProcessor {
    fn stage(&self) -> Stage {
        Stage::AudioDownload
    }

    async fn process(&self, task: &Task, ctx: &EngineContext) -> Result<()> {
        info!("processing audio_download for request {}", task.request_id);

        if ctx.is_finished(&task.request_id) {
            debug!("request {} already terminal, skipping", task.request_id);
            return Ok(());
        }

        let url = match task.data_str("url") {
            Some(url) => url.to_string(),
            None => ctx.store.get(&task.request_id)?.url,
        };

        let audio_path = match ctx.fetcher.extract_audio(&url).await {
            Ok(path) => path,
            Err(err) => {
                ctx.fail_request(&task.request_id, format!("failed to download audio: {err}"));
                return Err(err);
            }
        };

        ctx.store.update(
            &task.request_id,
            StatePatch::new().with_audio_path(audio_path.clone()),
        )?;

        let mut data = serde_json::Map::new();
        data.insert(
            "audio_path".into(),
            serde_json::json!(audio_path.to_string_lossy()),
        );
        ctx.publish(Event::new(
            task.request_id.clone(),
            EventType::AudioDownloaded,
            data,
        ));

        Ok(())
    }
}
