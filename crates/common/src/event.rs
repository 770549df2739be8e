//! Pipeline events
//!
//! Events drive the stage chain: each completed stage publishes one, and the
//! engine's subscriptions turn it into the next stage's task. Events are also
//! appended to the per-request log held by the state store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event topics published on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RequestAccepted,
    VideoInfoFetched,
    AudioDownloaded,
    TranscriptionCompleted,
    SummarizationCompleted,
    OutputCompleted,
    ProcessingCompleted,
    RequestCancelled,
}

impl EventType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequestAccepted => "request_accepted",
            Self::VideoInfoFetched => "video_info_fetched",
            Self::AudioDownloaded => "audio_downloaded",
            Self::TranscriptionCompleted => "transcription_completed",
            Self::SummarizationCompleted => "summarization_completed",
            Self::OutputCompleted => "output_completed",
            Self::ProcessingCompleted => "processing_completed",
            Self::RequestCancelled => "request_cancelled",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub request_id: String,
    pub event_type: EventType,
    pub data: serde_json::Map<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create an event with a generated id and current timestamp.
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        event_type: EventType,
        data: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let request_id = request_id.into();
        Self {
            id: format!("evt-{}", Uuid::new_v4()),
            request_id,
            event_type,
            data,
            timestamp: Utc::now(),
        }
    }

    /// Convenience for events carrying no payload.
    #[must_use]
    pub fn empty(request_id: impl Into<String>, event_type: EventType) -> Self {
        Self::new(request_id, event_type, serde_json::Map::new())
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
    fn test_event_ids_are_unique() {
        let a = Event::empty("req-1", EventType::RequestAccepted);
        let b = Event::empty("req-1", EventType::RequestAccepted);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_event_data_str() {
        let mut data = serde_json::Map::new();
        data.insert("url".into(), serde_json::json!("https://example.com/v"));
        data.insert("count".into(), serde_json::json!(3));

        let event = Event::new("req-1", EventType::RequestAccepted, data);
        assert_eq!(event.data_str("url"), Some("https://example.com/v"));
        assert_eq!(event.data_str("count"), None);
        assert_eq!(event.data_str("missing"), None);
    }

    #[test]
    fn test_event_type_snake_case_serialization() {
        let json = serde_json::to_string(&EventType::VideoInfoFetched).unwrap();
        assert_eq!(json, "\"video_info_fetched\"");
    }
}
