//! Common types and traits for the video-digest pipeline
//!
//! Everything shared between the processing engine, the collaborator
//! implementations, and the HTTP facade lives here: the request state
//! model, events, tasks, the pipeline error type, and the capability
//! traits the engine consumes.

use thiserror::Error;

pub mod collaborators;
pub mod event;
pub mod state;
pub mod task;

pub use collaborators::{
    MediaFetcher, PromptResolver, Publisher, Submission, SubmissionOutcome, Submitter, Summarizer,
    Transcriber,
};
pub use event::{Event, EventType};
pub use state::{
    Fingerprint, ProcessingState, PromptKind, PromptSpec, RequestStatus, StatePatch, StatusCounts,
    VideoInfo,
};
pub use task::{Stage, Task};

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("request not found: {0}")]
    RequestNotFound(String),

    #[error("request {request_id} is already in terminal state: {status}")]
    TerminalState {
        request_id: String,
        status: RequestStatus,
    },

    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("transcription error: {0}")]
    Transcription(String),

    #[error("summarization error: {0}")]
    Summarization(String),

    #[error("publish error: {0}")]
    Publish(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
