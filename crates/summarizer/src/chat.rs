//! OpenAI-compatible chat-completions summarizer

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use video_digest_common::{PipelineError, Result, Summarizer};

use crate::write_summary_file;

/// Chat API request
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

/// Chat API response
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Configuration for [`ChatSummarizer`]
#[derive(Debug, Clone)]
pub struct ChatSummarizerConfig {
    pub api_key: String,
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub api_base: String,
    pub model: String,
    pub tmp_dir: PathBuf,
}

/// Summarizer backed by an OpenAI-compatible chat-completions endpoint
pub struct ChatSummarizer {
    config: ChatSummarizerConfig,
    http_client: reqwest::Client,
}

impl ChatSummarizer {
    pub fn new(config: ChatSummarizerConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| {
                PipelineError::Summarization(format!("failed to create HTTP client: {err}"))
            })?;

        info!("chat summarizer using model {}", config.model);
        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    async fn summarize(&self, text: &str, prompt: &str, max_tokens: u32) -> Result<PathBuf> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: prompt.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: text.to_string(),
                },
            ],
            max_tokens,
            temperature: 0.4,
        };

        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));
        debug!("requesting completion from {url} with model {}", request.model);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| PipelineError::Summarization(format!("API request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Summarization(format!(
                "API returned {status}: {}",
                body.trim()
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|err| {
            PipelineError::Summarization(format!("failed to parse API response: {err}"))
        })?;

        let summary = parsed
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .map(str::trim)
            .unwrap_or_default();
        if summary.is_empty() {
            return Err(PipelineError::Summarization(
                "API response contained no summary content".to_string(),
            ));
        }

        write_summary_file(&self.config.tmp_dir, summary).await
    }
}
