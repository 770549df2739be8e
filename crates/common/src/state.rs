//! Request state model
//!
//! One `ProcessingState` record exists per accepted request. Records are
//! mutated only through [`StatePatch`], which keeps every field write typed
//! and lets the store enforce the terminal-state guard in one place.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a processing request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Accepted but not yet picked up by the first stage
    Pending,
    /// At least one stage has run or is running
    Running,
    /// All stages finished and outputs were published
    Completed,
    /// A stage or upload failed; `error` holds the reason
    Failed,
    /// Cancelled by the caller before completion
    Cancelled,
}

impl RequestStatus {
    /// Terminal statuses permit no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the submitted prompt value should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    /// Value names an entry in the prompt catalog
    Id,
    /// Value is the prompt text itself
    Text,
}

/// Prompt carried by a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSpec {
    pub kind: PromptKind,
    pub value: String,
}

impl PromptSpec {
    #[must_use]
    pub fn id(value: impl Into<String>) -> Self {
        Self {
            kind: PromptKind::Id,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: PromptKind::Text,
            value: value.into(),
        }
    }
}

/// Metadata returned by the media fetcher
///
/// The named fields cover what the pipeline itself consumes (publishing uses
/// `title`); everything else the fetcher reports is preserved in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,

    /// Duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webpage_url: Option<String>,

    /// Remaining fetcher-specific metadata
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Canonical deduplication key: `(resource url, prompt value, model)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[must_use]
    pub fn new(url: &str, prompt_value: &str, model: &str) -> Self {
        Self(format!("{url}|{prompt_value}|{model}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Complete state of one processing request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingState {
    pub request_id: String,
    pub status: RequestStatus,

    /// Kind of resource being processed (currently always `"video"`)
    pub source_type: String,
    pub url: String,
    pub prompt: PromptSpec,
    pub max_tokens: u32,

    /// Output folder addressing used by the publisher
    pub category: String,
    pub user: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_info: Option<VideoInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_path: Option<PathBuf>,
    /// Remote location of the published summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingState {
    /// Create a fresh `Pending` record for an accepted submission.
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        url: impl Into<String>,
        prompt: PromptSpec,
        source_type: impl Into<String>,
        category: impl Into<String>,
        user: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            request_id: request_id.into(),
            status: RequestStatus::Pending,
            source_type: source_type.into(),
            url: url.into(),
            prompt,
            max_tokens,
            category: category.into(),
            user: user.into(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            video_info: None,
            audio_path: None,
            transcript_path: None,
            summary_path: None,
            output_path: None,
            error: None,
        }
    }
}

/// Typed partial update applied to a [`ProcessingState`]
///
/// Built with the `with_*` methods and merged atomically by the state store.
/// A patch against a terminal record is rejected unless it touches only
/// `completed_at`.
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub status: Option<RequestStatus>,
    pub video_info: Option<VideoInfo>,
    pub audio_path: Option<PathBuf>,
    pub transcript_path: Option<PathBuf>,
    pub summary_path: Option<PathBuf>,
    pub output_path: Option<String>,
    pub error: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StatePatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_status(mut self, status: RequestStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_video_info(mut self, info: VideoInfo) -> Self {
        self.video_info = Some(info);
        self
    }

    #[must_use]
    pub fn with_audio_path(mut self, path: PathBuf) -> Self {
        self.audio_path = Some(path);
        self
    }

    #[must_use]
    pub fn with_transcript_path(mut self, path: PathBuf) -> Self {
        self.transcript_path = Some(path);
        self
    }

    #[must_use]
    pub fn with_summary_path(mut self, path: PathBuf) -> Self {
        self.summary_path = Some(path);
        self
    }

    #[must_use]
    pub fn with_output_path(mut self, path: impl Into<String>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    #[must_use]
    pub fn with_completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    /// True when the patch writes nothing beyond `completed_at`.
    #[must_use]
    pub fn only_touches_completed_at(&self) -> bool {
        self.status.is_none()
            && self.video_info.is_none()
            && self.audio_path.is_none()
            && self.transcript_path.is_none()
            && self.summary_path.is_none()
            && self.output_path.is_none()
            && self.error.is_none()
    }

    /// Merge this patch into a state record. Does not touch `updated_at`;
    /// the store owns that clock.
    pub fn apply(self, state: &mut ProcessingState) {
        if let Some(status) = self.status {
            state.status = status;
        }
        if let Some(info) = self.video_info {
            state.video_info = Some(info);
        }
        if let Some(path) = self.audio_path {
            state.audio_path = Some(path);
        }
        if let Some(path) = self.transcript_path {
            state.transcript_path = Some(path);
        }
        if let Some(path) = self.summary_path {
            state.summary_path = Some(path);
        }
        if let Some(path) = self.output_path {
            state.output_path = Some(path);
        }
        if let Some(error) = self.error {
            state.error = Some(error);
        }
        if let Some(at) = self.completed_at {
            state.completed_at = Some(at);
        }
    }
}

/// Histogram of request counts keyed by status name
pub type StatusCounts = HashMap<String, usize>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(!RequestStatus::Running.is_terminal());
        assert!(RequestStatus::Completed.is_terminal());
        assert!(RequestStatus::Failed.is_terminal());
        assert!(RequestStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&RequestStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
    }

    #[test]
    fn test_fingerprint_canonical_form() {
        let fp = Fingerprint::new("https://example.com/v", "general", "gpt-4o");
        assert_eq!(fp.as_str(), "https://example.com/v|general|gpt-4o");

        let same = Fingerprint::new("https://example.com/v", "general", "gpt-4o");
        assert_eq!(fp, same);

        let other = Fingerprint::new("https://example.com/v", "key_points", "gpt-4o");
        assert_ne!(fp, other);
    }

    #[test]
    fn test_patch_only_touches_completed_at() {
        let patch = StatePatch::new().with_completed_at(Utc::now());
        assert!(patch.only_touches_completed_at());

        let patch = StatePatch::new()
            .with_completed_at(Utc::now())
            .with_status(RequestStatus::Completed);
        assert!(!patch.only_touches_completed_at());
    }

    #[test]
    fn test_patch_apply_merges_fields() {
        let mut state = ProcessingState::new(
            "req-1",
            "https://example.com/v",
            PromptSpec::id("general"),
            "video",
            "general",
            "admin",
            10_000,
        );

        StatePatch::new()
            .with_status(RequestStatus::Running)
            .with_audio_path(PathBuf::from("/tmp/a.mp3"))
            .apply(&mut state);

        assert_eq!(state.status, RequestStatus::Running);
        assert_eq!(state.audio_path, Some(PathBuf::from("/tmp/a.mp3")));
        // Untouched fields stay put
        assert!(state.transcript_path.is_none());
        assert!(state.error.is_none());
    }

    #[test]
    fn test_video_info_extra_roundtrip() {
        let json = r#"{"title":"Talk","channel":"Conf","duration":61.5,"view_count":1000}"#;
        let info: VideoInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.title.as_deref(), Some("Talk"));
        assert_eq!(info.duration, Some(61.5));
        assert_eq!(
            info.extra.get("view_count"),
            Some(&serde_json::json!(1000))
        );
    }
}
