//! Pipeline stages and queued tasks

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The six pipeline stages, each served by its own worker set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    VideoInfo,
    AudioDownload,
    Transcription,
    Summarization,
    Output,
    Cleanup,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 6] = [
        Stage::VideoInfo,
        Stage::AudioDownload,
        Stage::Transcription,
        Stage::Summarization,
        Stage::Output,
        Stage::Cleanup,
    ];

    /// Stable name, also used as the concurrency config key.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VideoInfo => "video_info",
            Self::AudioDownload => "audio_download",
            Self::Transcription => "transcription",
            Self::Summarization => "summarization",
            Self::Output => "output",
            Self::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video_info" => Ok(Self::VideoInfo),
            "audio_download" => Ok(Self::AudioDownload),
            "transcription" => Ok(Self::Transcription),
            "summarization" => Ok(Self::Summarization),
            "output" => Ok(Self::Output),
            "cleanup" => Ok(Self::Cleanup),
            other => Err(format!("unknown stage: {other}")),
        }
    }
}

/// One unit of queued work for a stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub stage: Stage,
    pub request_id: String,
    pub data: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    #[must_use]
    pub fn new(
        stage: Stage,
        request_id: impl Into<String>,
        data: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: format!("task-{}", Uuid::new_v4()),
            stage,
            request_id: request_id.into(),
            data,
            created_at: Utc::now(),
        }
    }

    /// Fetch a string field from the payload.
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_name_roundtrip() {
        for stage in Stage::ALL {
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
        }
    }

    #[test]
    fn test_unknown_stage_rejected() {
        assert!("resample".parse::<Stage>().is_err());
    }

    #[test]
    fn test_task_data_str() {
        let mut data = serde_json::Map::new();
        data.insert("url".into(), serde_json::json!("https://example.com/v"));
        let task = Task::new(Stage::VideoInfo, "req-1", data);
        assert_eq!(task.data_str("url"), Some("https://example.com/v"));
    }
}
