//! API request and response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use video_digest_common::{ProcessingState, PromptSpec, StatusCounts, VideoInfo};

/// Body of `POST /api/submit`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub url: String,
    pub prompt: PromptSpec,
    /// Output folder category; defaults to `general`
    #[serde(default)]
    pub category: Option<String>,
}

/// Response of `POST /api/submit`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub request_id: String,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
}

/// Query parameters carrying a request id
#[derive(Debug, Deserialize)]
pub struct RequestIdQuery {
    pub request_id: String,
}

/// Response of `GET /api/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub request_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_info: Option<VideoInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
}

impl From<ProcessingState> for StatusResponse {
    fn from(state: ProcessingState) -> Self {
        Self {
            request_id: state.request_id,
            status: state.status.as_str().to_string(),
            created_at: state.created_at,
            updated_at: state.updated_at,
            completed_at: state.completed_at,
            error: state.error,
            video_info: state.video_info,
            transcript_path: state
                .transcript_path
                .map(|p| p.to_string_lossy().into_owned()),
            summary_path: state.summary_path.map(|p| p.to_string_lossy().into_owned()),
            output_path: state.output_path,
        }
    }
}

/// Response of `POST /api/cancel`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub status: String,
}

/// Response of `GET /api/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub request_counts: StatusCounts,
    pub enabled_sources: Vec<String>,
}

/// One entry of `GET /api/prompts`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
}

/// Response of `GET /api/prompts`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsResponse {
    pub prompts: Vec<PromptInfo>,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use video_digest_common::{PromptKind, RequestStatus};

    use super::*;

    #[test]
    fn test_submit_request_deserialization() {
        let json = r#"{
            "url": "https://example.com/v",
            "prompt": {"kind": "id", "value": "general"},
            "category": "finance"
        }"#;
        let request: SubmitRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.url, "https://example.com/v");
        assert_eq!(request.prompt.kind, PromptKind::Id);
        assert_eq!(request.prompt.value, "general");
        assert_eq!(request.category.as_deref(), Some("finance"));
    }

    #[test]
    fn test_submit_request_category_is_optional() {
        let json = r#"{"url": "u", "prompt": {"kind": "text", "value": "summarize"}}"#;
        let request: SubmitRequest = serde_json::from_str(json).unwrap();
        assert!(request.category.is_none());
    }

    #[test]
    fn test_status_response_from_state() {
        let mut state = ProcessingState::new(
            "req-1",
            "https://example.com/v",
            PromptSpec::id("general"),
            "video",
            "general",
            "admin",
            10_000,
        );
        state.status = RequestStatus::Failed;
        state.error = Some("boom".to_string());
        state.transcript_path = Some("/tmp/t.txt".into());

        let response = StatusResponse::from(state);
        assert_eq!(response.status, "failed");
        assert_eq!(response.error.as_deref(), Some("boom"));
        assert_eq!(response.transcript_path.as_deref(), Some("/tmp/t.txt"));
        assert!(response.summary_path.is_none());

        // Optional empties are omitted from the wire form.
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("summary_path"));
        assert!(json.contains("transcript_path"));
    }
}
