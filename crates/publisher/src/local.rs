//! Local directory publisher
//!
//! Mirrors the object-store layout on local disk. Unlike the object-store
//! publisher it copies rather than moves, leaving the source file for the
//! cleanup stage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use video_digest_common::{Publisher, Result, VideoInfo};

use crate::output_filename;

/// Publisher that writes into `<root>/<category>/<user>/<filename>`
pub struct LocalDirPublisher {
    root: PathBuf,
}

impl LocalDirPublisher {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn copy_into_tree(
        &self,
        request_id: &str,
        info: &VideoInfo,
        path: &Path,
        category: &str,
        user: &str,
        suffix: &str,
    ) -> Result<String> {
        let dir = self.root.join(category).join(user);
        tokio::fs::create_dir_all(&dir).await?;

        let filename = output_filename(info.title.as_deref(), request_id, suffix);
        let dest = dir.join(filename);
        tokio::fs::copy(path, &dest).await?;

        info!("published {} for request {request_id}", dest.display());
        Ok(dest.to_string_lossy().into_owned())
    }
}

#[async_trait]
impl Publisher for LocalDirPublisher {
    async fn upload_summary(
        &self,
        request_id: &str,
        info: &VideoInfo,
        path: &Path,
        category: &str,
        user: &str,
    ) -> Result<String> {
        self.copy_into_tree(request_id, info, path, category, user, "summary.txt")
            .await
    }

    async fn upload_transcript(
        &self,
        request_id: &str,
        info: &VideoInfo,
        path: &Path,
        category: &str,
        user: &str,
    ) -> Result<String> {
        self.copy_into_tree(request_id, info, path, category, user, "transcript.txt")
            .await
    }
}
