//! Speech-to-text via the `whisper.cpp` CLI
//!
//! Implements the [`Transcriber`] collaborator by invoking a configured
//! whisper binary with `-otxt`, producing a plain-text transcript file that
//! downstream stages read and the cleanup stage deletes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use video_digest_common::{PipelineError, Result, Transcriber};

/// `whisper.cpp` CLI-backed transcriber
pub struct WhisperCliTranscriber {
    binary: PathBuf,
    model: PathBuf,
    tmp_dir: PathBuf,
}

impl WhisperCliTranscriber {
    #[must_use]
    pub fn new(
        binary: impl Into<PathBuf>,
        model: impl Into<PathBuf>,
        tmp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            binary: binary.into(),
            model: model.into(),
            tmp_dir: tmp_dir.into(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperCliTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<PathBuf> {
        // whisper.cpp takes an output *base* path and appends ".txt".
        let out_base = self.tmp_dir.join(format!("transcript-{}", Uuid::new_v4()));
        let transcript_path = out_base.with_extension("txt");

        let args: Vec<String> = vec![
            "-m".to_string(),
            self.model.to_string_lossy().into_owned(),
            "-f".to_string(),
            audio_path.to_string_lossy().into_owned(),
            "-otxt".to_string(),
            "-of".to_string(),
            out_base.to_string_lossy().into_owned(),
        ];

        info!(
            "running {} {} for {}",
            self.binary.display(),
            args.join(" "),
            audio_path.display()
        );

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .map_err(|err| {
                PipelineError::Transcription(format!(
                    "failed to run {}: {err}",
                    self.binary.display()
                ))
            })?;

        if !output.status.success() {
            let _ = tokio::fs::remove_file(&transcript_path).await;
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Transcription(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                stderr.trim()
            )));
        }

        match tokio::fs::metadata(&transcript_path).await {
            Ok(meta) => {
                debug!(
                    "transcript {} is {} bytes",
                    transcript_path.display(),
                    meta.len()
                );
                if meta.len() == 0 {
                    warn!(
                        "transcript {} is empty; whisper output: {}",
                        transcript_path.display(),
                        String::from_utf8_lossy(&output.stdout).trim()
                    );
                }
            }
            Err(err) => {
                return Err(PipelineError::Transcription(format!(
                    "transcript file {} missing after run: {err}",
                    transcript_path.display()
                )));
            }
        }

        Ok(transcript_path)
    }
}
