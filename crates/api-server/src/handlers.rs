//! HTTP request handlers

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use tracing::{error, info};

use video_digest_common::{PipelineError, Submission, Submitter};

use crate::types::{
    CancelResponse, HealthResponse, PromptInfo, PromptsResponse, RequestIdQuery, StatusResponse,
    SubmitRequest, SubmitResponse,
};
use crate::AppState;

/// `POST /api/submit`
pub async fn submit(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if request.url.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "url is required".to_string()));
    }

    let mut submission = Submission::new(request.url, request.prompt);
    submission.category = request.category;

    let outcome = state.engine.submit(submission).await.map_err(|err| match err {
        PipelineError::InvalidInput(message) => (StatusCode::BAD_REQUEST, message),
        other => {
            error!("submission failed: {other}");
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    })?;

    info!(
        "submission accepted as {} (deduplicated: {})",
        outcome.request_id, outcome.deduplicated
    );

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            request_id: outcome.request_id,
            status: "submitted".to_string(),
            submitted_at: Utc::now(),
        }),
    ))
}

/// `GET /api/status?request_id=…`
pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<RequestIdQuery>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    match state.engine.state(&query.request_id) {
        Ok(record) => Ok(Json(StatusResponse::from(record))),
        Err(PipelineError::RequestNotFound(id)) => {
            Err((StatusCode::NOT_FOUND, format!("request not found: {id}")))
        }
        Err(other) => Err((StatusCode::INTERNAL_SERVER_ERROR, other.to_string())),
    }
}

/// `POST /api/cancel?request_id=…`
pub async fn cancel(
    State(state): State<AppState>,
    Query(query): Query<RequestIdQuery>,
) -> Result<Json<CancelResponse>, (StatusCode, String)> {
    match state.engine.cancel(&query.request_id) {
        Ok(()) => Ok(Json(CancelResponse {
            status: "cancelled".to_string(),
        })),
        Err(PipelineError::RequestNotFound(id)) => {
            Err((StatusCode::NOT_FOUND, format!("request not found: {id}")))
        }
        Err(err @ PipelineError::TerminalState { .. }) => {
            Err((StatusCode::CONFLICT, err.to_string()))
        }
        Err(other) => Err((StatusCode::INTERNAL_SERVER_ERROR, other.to_string())),
    }
}

/// `GET /api/health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        request_counts: state.engine.counts_by_status(),
        enabled_sources: state.sources.enabled_names(),
    })
}

/// `GET /api/prompts`
pub async fn prompts(State(state): State<AppState>) -> Json<PromptsResponse> {
    let prompts: Vec<PromptInfo> = state
        .prompts
        .all()
        .into_iter()
        .map(|prompt| PromptInfo {
            id: prompt.id.clone(),
            name: prompt.name.clone(),
            description: prompt.description.clone(),
            category: prompt.category.clone(),
        })
        .collect();
    let count = prompts.len();
    Json(PromptsResponse { prompts, count })
}
