//! Capability traits for the pipeline's external collaborators
//!
//! The engine and its stage processors only ever see these traits; concrete
//! implementations (yt-dlp, whisper.cpp, chat-completion APIs, object
//! stores) live in their own crates and are wired in by the service binary.
//! Tests substitute stubs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::state::{PromptSpec, VideoInfo};
use crate::Result;

/// Resolves URLs to metadata and local audio artifacts
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch descriptive metadata for the resource at `url`.
    async fn fetch_metadata(&self, url: &str) -> Result<VideoInfo>;

    /// Produce a local audio file for the resource at `url` and return its
    /// path. The caller owns the file and is responsible for deleting it.
    async fn extract_audio(&self, url: &str) -> Result<PathBuf>;

    /// Cheap syntactic check that this fetcher can handle `url`.
    fn supports_url(&self, url: &str) -> bool;
}

/// Turns a local audio file into a local transcript file
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio_path` and return the path of the produced
    /// transcript text file. The caller owns the file.
    async fn transcribe(&self, audio_path: &Path) -> Result<PathBuf>;
}

/// Turns transcript text into a local summary file
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `text` under `prompt`, capped at `max_tokens`, and return
    /// the path of the produced summary file. The caller owns the file.
    async fn summarize(&self, text: &str, prompt: &str, max_tokens: u32) -> Result<PathBuf>;
}

impl std::fmt::Debug for dyn Summarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Summarizer")
    }
}

/// Uploads result artifacts under a `category/user` hierarchy
///
/// Implementations may delete the local file after a successful upload;
/// cleanup tolerates the missing file either way.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Upload the summary file; returns the remote location.
    async fn upload_summary(
        &self,
        request_id: &str,
        info: &VideoInfo,
        path: &Path,
        category: &str,
        user: &str,
    ) -> Result<String>;

    /// Upload the transcript file; returns the remote location.
    async fn upload_transcript(
        &self,
        request_id: &str,
        info: &VideoInfo,
        path: &Path,
        category: &str,
        user: &str,
    ) -> Result<String>;
}

/// Resolves prompt identifiers to prompt text
pub trait PromptResolver: Send + Sync {
    /// Resolve `input` to prompt content, or `None` when it is not a known
    /// identifier (callers fall back to treating `input` as literal text).
    fn resolve(&self, input: &str) -> Option<String>;
}

/// A submission entering the pipeline, from the HTTP facade or a poller
#[derive(Debug, Clone)]
pub struct Submission {
    pub url: String,
    pub prompt: PromptSpec,
    pub source_type: String,
    pub category: Option<String>,
    pub user: Option<String>,
    pub max_tokens: Option<u32>,
}

impl Submission {
    /// Submission with defaults for everything but the URL and prompt.
    #[must_use]
    pub fn new(url: impl Into<String>, prompt: PromptSpec) -> Self {
        Self {
            url: url.into(),
            prompt,
            source_type: "video".to_string(),
            category: None,
            user: None,
            max_tokens: None,
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Outcome of a submission
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub request_id: String,
    /// True when an equivalent non-failed request already existed and its
    /// id was returned instead of starting a new pipeline.
    pub deduplicated: bool,
}

/// The single entry point submissions flow through
///
/// Implemented by the processing engine; consumed by the HTTP facade and
/// the background pollers so both share one code path.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, submission: Submission) -> Result<SubmissionOutcome>;
}

impl std::fmt::Debug for dyn Submitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Submitter")
    }
}
