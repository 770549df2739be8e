//! Video info stage: fetch metadata for the submitted URL

use async_trait::async_trait;
use tracing::{debug, info};

use video_digest_common::{Event, EventType, Result, Stage, StatePatch, Task};

use crate::context::EngineContext;
use crate::dispatcher::StageProcessor;

pub struct VideoInfoProcessor;

#[async_trait]
impl StageProcessor for VideoInfoProcessor {
    fn stage(&self) -> Stage {
        Stage::VideoInfo
    }

    async fn process(&self, task: &Task, ctx: &EngineContext) -> Result<()> {
        info!("processing video_info for request {}", task.request_id);

        if ctx.is_finished(&task.request_id) {
            debug!("request {} already terminal, skipping", task.request_id);
            return Ok(());
        }

        let url = match task.data_str("url") {
            Some(url) => url.to_string(),
            None => ctx.store.get(&task.request_id)?.url,
        };

        let info = match ctx.fetcher.fetch_metadata(&url).await {
            Ok(info) => info,
            Err(err) => {
                ctx.fail_request(&task.request_id, format!("failed to fetch video info: {err}"));
                return Err(err);
            }
        };

        ctx.store
            .update(&task.request_id, StatePatch::new().with_video_info(info.clone()))?;

        let data = match serde_json::to_value(&info)? {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        ctx.publish(Event::new(
            task.request_id.clone(),
            EventType::VideoInfoFetched,
            data,
        ));

        Ok(())
    }
}
