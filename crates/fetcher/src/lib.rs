//! Media fetching via the `yt-dlp` CLI
//!
//! Implements the [`MediaFetcher`] collaborator by shelling out to a
//! configured `yt-dlp` binary: metadata through `--dump-json`, audio
//! through `-x --audio-format mp3`. Also provides the search and channel
//! lookups used by background discovery sources.

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use video_digest_common::{MediaFetcher, PipelineError, Result, VideoInfo};

/// `yt-dlp`-backed media fetcher
pub struct YtDlpFetcher {
    binary: PathBuf,
    tmp_dir: PathBuf,
}

impl YtDlpFetcher {
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>, tmp_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            tmp_dir: tmp_dir.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<Output> {
        debug!("running {} {}", self.binary.display(), args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|err| {
                PipelineError::Fetch(format!(
                    "failed to run {}: {err}",
                    self.binary.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Fetch(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                stderr.trim()
            )));
        }
        Ok(output)
    }

    /// Search for videos matching `query`, returning up to `limit` watch
    /// URLs. Uses `yt-dlp "ytsearchN:<query>" --get-id`.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let search_arg = format!("ytsearch{limit}:{query}");
        let output = self
            .run(&[search_arg.as_str(), "--get-id", "--no-playlist"])
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let urls: Vec<String> = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .take(limit)
            .map(video_url_for_id)
            .collect();

        info!("search '{query}' found {} video(s)", urls.len());
        Ok(urls)
    }

    /// Look up the channel id and name of a video URL.
    pub async fn channel_of(&self, url: &str) -> Result<ChannelRef> {
        let output = self
            .run(&[url, "--print", "channel_id", "--print", "channel", "--no-playlist"])
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut lines = stdout.lines().map(str::trim);
        let id = lines.next().unwrap_or_default().to_string();
        let name = lines.next().unwrap_or_default().to_string();
        if id.is_empty() && name.is_empty() {
            return Err(PipelineError::Fetch(format!(
                "no channel information for {url}"
            )));
        }
        Ok(ChannelRef { id, name })
    }
}

/// Channel identity of a discovered video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRef {
    pub id: String,
    pub name: String,
}

impl ChannelRef {
    /// Whether this channel matches an allow-list entry, by exact id or
    /// case-insensitive name.
    #[must_use]
    pub fn matches(&self, allowed: &str) -> bool {
        let allowed = allowed.trim();
        self.id == allowed || self.name.eq_ignore_ascii_case(allowed)
    }
}

fn video_url_for_id(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch_metadata(&self, url: &str) -> Result<VideoInfo> {
        let output = self.run(&["--dump-json", "--no-playlist", url]).await?;

        let info: VideoInfo = serde_json::from_slice(&output.stdout).map_err(|err| {
            PipelineError::Fetch(format!("failed to parse metadata for {url}: {err}"))
        })?;

        debug!(
            "fetched metadata for {url}: title={:?} duration={:?}",
            info.title, info.duration
        );
        Ok(info)
    }

    async fn extract_audio(&self, url: &str) -> Result<PathBuf> {
        let out_path = self.tmp_dir.join(format!("audio-{}.mp3", Uuid::new_v4()));
        let out_str = out_path.to_string_lossy().into_owned();

        self.run(&["-x", "--audio-format", "mp3", "-o", out_str.as_str(), url])
            .await?;

        if !out_path.exists() {
            return Err(PipelineError::Fetch(format!(
                "audio extraction produced no file at {}",
                out_path.display()
            )));
        }
        info!("extracted audio for {url} to {}", out_path.display());
        Ok(out_path)
    }

    fn supports_url(&self, url: &str) -> bool {
        url.starts_with("http://") || url.starts_with("https://")
    }
}

/// Best-effort probe that the configured binary exists and is executable.
/// Logs a warning rather than failing startup, so dev setups without the
/// tool can still exercise everything up to the first fetch.
pub fn check_binary(binary: &Path) {
    if !binary.exists() {
        warn!("yt-dlp binary not found at {}", binary.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_http_urls_only() {
        let fetcher = YtDlpFetcher::new("/usr/bin/yt-dlp", "/tmp");
        assert!(fetcher.supports_url("https://www.youtube.com/watch?v=abc"));
        assert!(fetcher.supports_url("http://example.com/video.mp4"));
        assert!(!fetcher.supports_url("ftp://example.com/video.mp4"));
        assert!(!fetcher.supports_url("file:///tmp/video.mp4"));
        assert!(!fetcher.supports_url(""));
    }

    #[test]
    fn test_video_url_for_id() {
        assert_eq!(
            video_url_for_id("dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_channel_ref_matching() {
        let channel = ChannelRef {
            id: "UC123".to_string(),
            name: "Tech Weekly".to_string(),
        };
        assert!(channel.matches("UC123"));
        assert!(channel.matches("tech weekly"));
        assert!(channel.matches(" Tech Weekly "));
        assert!(!channel.matches("UC999"));
        assert!(!channel.matches("Other Channel"));
    }

    #[test]
    fn test_metadata_parses_dump_json_shape() {
        // Trimmed-down yt-dlp --dump-json output.
        let raw = r#"{
            "id": "abc123",
            "title": "A Conference Talk",
            "channel": "ConfTube",
            "channel_id": "UCconf",
            "duration": 1830.0,
            "upload_date": "20250214",
            "webpage_url": "https://www.youtube.com/watch?v=abc123",
            "view_count": 4242,
            "like_count": 99
        }"#;

        let info: VideoInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(info.title.as_deref(), Some("A Conference Talk"));
        assert_eq!(info.channel.as_deref(), Some("ConfTube"));
        assert_eq!(info.channel_id.as_deref(), Some("UCconf"));
        assert_eq!(info.duration, Some(1830.0));
        assert_eq!(info.upload_date.as_deref(), Some("20250214"));
        // Unmodeled fields survive in the extension map.
        assert_eq!(info.extra.get("view_count"), Some(&serde_json::json!(4242)));
    }
}
