//! Summarization collaborators
//!
//! Two [`Summarizer`] implementations selected by configuration:
//!
//! - [`ChatSummarizer`] — calls an OpenAI-compatible chat-completions API
//!   with the resolved prompt as the system message.
//! - [`TextSummarizer`] — offline heuristic extractive summarizer, useful
//!   when no API is available.
//!
//! Both write the summary to a file under the configured temp directory and
//! return its path; the cleanup stage owns deletion.

mod chat;
mod text;

use std::path::PathBuf;
use std::sync::Arc;

use video_digest_common::{PipelineError, Result, Summarizer};

pub use chat::{ChatSummarizer, ChatSummarizerConfig};
pub use text::TextSummarizer;

/// Which summarizer implementation to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarizerProvider {
    /// OpenAI-compatible chat API
    Ai,
    /// Offline heuristic summarizer
    Text,
}

impl std::str::FromStr for SummarizerProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ai" => Ok(Self::Ai),
            "text" => Ok(Self::Text),
            other => Err(format!("unknown summarizer provider: {other}")),
        }
    }
}

/// Build the configured summarizer.
pub fn summarizer_from_config(
    provider: SummarizerProvider,
    api_key: Option<&str>,
    api_base: &str,
    model: &str,
    tmp_dir: PathBuf,
) -> Result<Arc<dyn Summarizer>> {
    match provider {
        SummarizerProvider::Ai => {
            let api_key = api_key.filter(|k| !k.is_empty()).ok_or_else(|| {
                PipelineError::Config("api_key is required for the ai summarizer".to_string())
            })?;
            let summarizer = ChatSummarizer::new(ChatSummarizerConfig {
                api_key: api_key.to_string(),
                api_base: api_base.to_string(),
                model: model.to_string(),
                tmp_dir,
            })?;
            Ok(Arc::new(summarizer))
        }
        SummarizerProvider::Text => Ok(Arc::new(TextSummarizer::new(tmp_dir))),
    }
}

pub(crate) async fn write_summary_file(tmp_dir: &std::path::Path, summary: &str) -> Result<PathBuf> {
    let path = tmp_dir.join(format!("summary-{}.txt", uuid::Uuid::new_v4()));
    tokio::fs::write(&path, summary).await?;
    Ok(path)
}
