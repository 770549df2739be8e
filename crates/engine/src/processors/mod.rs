//! The six pipeline stage processors
//!
//! All processors follow the same contract (see
//! [`StageProcessor`](crate::dispatcher::StageProcessor)): terminal-status
//! guard first, collaborator call, state patch plus completion event on
//! success, persisted failure otherwise. Processors never call each other;
//! the engine's event subscriptions do the chaining.

mod audio_download;
mod cleanup;
mod output;
mod summarization;
mod transcription;
mod video_info;

pub use audio_download::AudioDownloadProcessor;
pub use cleanup::CleanupProcessor;
pub use output::OutputProcessor;
pub use summarization::SummarizationProcessor;
pub use transcription::TranscriptionProcessor;
pub use video_info::VideoInfoProcessor;
