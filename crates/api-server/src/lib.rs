//! HTTP facade for the video-digest service
//!
//! Exposes submission, status, cancellation, health, and prompt listing on
//! top of the processing engine. The binary in `main.rs` wires the engine,
//! collaborators, and background sources together and serves this router.

pub mod handlers;
pub mod types;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use video_digest_config::PromptCatalog;
use video_digest_engine::ProcessingEngine;
use video_digest_sources::SourceManager;

pub use types::*;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ProcessingEngine>,
    pub prompts: Arc<PromptCatalog>,
    pub sources: Arc<SourceManager>,
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/submit", post(handlers::submit))
        .route("/api/status", get(handlers::status))
        .route("/api/cancel", post(handlers::cancel))
        .route("/api/health", get(handlers::health))
        .route("/api/prompts", get(handlers::prompts))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve the API until `shutdown` resolves.
pub async fn serve(
    addr: &str,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
