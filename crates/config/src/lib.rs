//! Configuration loading for the video-digest service
//!
//! Three YAML files drive the service:
//!
//! - `service.yaml` — HTTP server address and paths to the other files
//! - `config.yaml` — engine/collaborator settings ([`AppConfig`])
//! - `sources.yaml` — background poller definitions ([`SourcesConfig`])
//!
//! Every `AppConfig` option can be overridden by a `VD_*` environment
//! variable; missing values fall back to documented defaults.

pub mod prompts;

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use prompts::{PromptCatalog, PromptDefinition};

/// Engine and collaborator configuration (`config.yaml`)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// `ai` (chat API) or `text` (offline heuristic)
    #[serde(default)]
    pub summarizer_provider: Option<String>,

    /// Chat API settings
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Tool paths
    #[serde(default)]
    pub yt_dlp_path: Option<String>,
    #[serde(default)]
    pub whisper_path: Option<String>,
    #[serde(default)]
    pub whisper_model_path: Option<String>,

    /// Directories
    #[serde(default)]
    pub tmp_dir: Option<String>,
    #[serde(default)]
    pub prompts_dir: Option<String>,

    /// `object_store` or `local`
    #[serde(default)]
    pub output_provider: Option<String>,
    #[serde(default)]
    pub s3: Option<S3Section>,
    #[serde(default)]
    pub local_output_dir: Option<String>,

    /// Per-stage worker counts, keyed by stage name; missing stages run
    /// one worker.
    #[serde(default)]
    pub concurrency: HashMap<String, usize>,

    /// Terminal records older than this many hours are purged.
    #[serde(default)]
    pub request_ttl_hours: Option<u64>,
}

/// S3/MinIO settings inside `config.yaml`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct S3Section {
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
}

impl AppConfig {
    /// Load from a YAML file, apply `VD_*` env overrides, fill defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.apply_env_overrides();
        config.set_defaults();
        Ok(config)
    }

    /// Defaults-only config (used when no file is given).
    #[must_use]
    pub fn default_with_env() -> Self {
        let mut config = AppConfig::default();
        config.apply_env_overrides();
        config.set_defaults();
        config
    }

    fn apply_env_overrides(&mut self) {
        override_str(&mut self.summarizer_provider, "VD_SUMMARIZER_PROVIDER");
        override_str(&mut self.api_key, "VD_API_KEY");
        override_str(&mut self.api_base, "VD_API_BASE");
        override_str(&mut self.model, "VD_MODEL");
        override_parse(&mut self.max_tokens, "VD_MAX_TOKENS");
        override_str(&mut self.yt_dlp_path, "VD_YT_DLP_PATH");
        override_str(&mut self.whisper_path, "VD_WHISPER_PATH");
        override_str(&mut self.whisper_model_path, "VD_WHISPER_MODEL_PATH");
        override_str(&mut self.tmp_dir, "VD_TMP_DIR");
        override_str(&mut self.prompts_dir, "VD_PROMPTS_DIR");
        override_str(&mut self.output_provider, "VD_OUTPUT_PROVIDER");
        override_str(&mut self.local_output_dir, "VD_LOCAL_OUTPUT_DIR");
        override_parse(&mut self.request_ttl_hours, "VD_REQUEST_TTL_HOURS");

        for stage in [
            "video_info",
            "audio_download",
            "transcription",
            "summarization",
            "output",
            "cleanup",
        ] {
            let var = format!("VD_CONCURRENCY_{}", stage.to_uppercase());
            if let Ok(value) = std::env::var(&var) {
                if let Ok(parsed) = value.parse::<usize>() {
                    self.concurrency.insert(stage.to_string(), parsed);
                }
            }
        }
    }

    fn set_defaults(&mut self) {
        default_str(&mut self.summarizer_provider, "ai");
        default_str(&mut self.api_base, "https://api.openai.com/v1");
        default_str(&mut self.model, "gpt-4o");
        if self.max_tokens.is_none() {
            self.max_tokens = Some(10_000);
        }
        default_str(&mut self.yt_dlp_path, "/usr/local/bin/yt-dlp");
        default_str(&mut self.whisper_path, "/usr/local/bin/whisper");
        default_str(&mut self.whisper_model_path, "/var/lib/video-digest/models/ggml-base.en.bin");
        default_str(&mut self.tmp_dir, "/tmp");
        default_str(&mut self.prompts_dir, "prompts");
        default_str(&mut self.output_provider, "object_store");
        default_str(&mut self.local_output_dir, "digests");
        if self.request_ttl_hours.is_none() {
            self.request_ttl_hours = Some(24);
        }
        if self.concurrency.is_empty() {
            self.concurrency = HashMap::from([
                ("video_info".to_string(), 1),
                ("audio_download".to_string(), 1),
                ("transcription".to_string(), 2),
                ("summarization".to_string(), 3),
                ("output".to_string(), 1),
                ("cleanup".to_string(), 1),
            ]);
        }
    }
}

/// Service-level configuration (`service.yaml`)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub engine_config_path: Option<String>,
    #[serde(default)]
    pub prompts_dir: Option<String>,
    #[serde(default)]
    pub sources_config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
        }
    }
}

impl ServiceConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read service config {}", path.display()))?;
        let mut config: ServiceConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse service config {}", path.display()))?;
        config.apply_env_overrides();
        config.set_defaults();
        Ok(config)
    }

    #[must_use]
    pub fn default_with_env() -> Self {
        let mut config = ServiceConfig::default();
        config.apply_env_overrides();
        config.set_defaults();
        config
    }

    fn apply_env_overrides(&mut self) {
        override_str(&mut self.server.host, "VD_SERVER_HOST");
        override_parse(&mut self.server.port, "VD_SERVER_PORT");
        override_str(&mut self.engine_config_path, "VD_ENGINE_CONFIG_PATH");
        override_str(&mut self.prompts_dir, "VD_PROMPTS_DIR");
        override_str(&mut self.sources_config_path, "VD_SOURCES_CONFIG_PATH");
    }

    fn set_defaults(&mut self) {
        default_str(&mut self.server.host, "0.0.0.0");
        if self.server.port.is_none() {
            self.server.port = Some(8080);
        }
        default_str(&mut self.engine_config_path, "config.yaml");
        default_str(&mut self.prompts_dir, "prompts");
        default_str(&mut self.sources_config_path, "sources.yaml");
    }

    /// `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!(
            "{}:{}",
            self.server.host.as_deref().unwrap_or("0.0.0.0"),
            self.server.port.unwrap_or(8080)
        )
    }
}

/// Background poller definitions (`sources.yaml`)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourcesConfig {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl SourcesConfig {
    /// Load from a YAML file. A missing file means "no sources".
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read sources config {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse sources config {}", path.display()))
    }
}

/// One background poller definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    /// `search` or `static_list`
    pub kind: String,
    #[serde(default)]
    pub enabled: bool,
    /// Tick interval, e.g. `30m`, `1h`, `45s`, `10ms`
    pub interval: String,
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Kind-specific settings (queries, urls, channels, ...)
    #[serde(default)]
    pub config: serde_yaml::Mapping,
}

impl SourceConfig {
    pub fn interval_duration(&self) -> Result<Duration> {
        parse_interval(&self.interval)
            .with_context(|| format!("invalid interval '{}' for source {}", self.interval, self.name))
    }

    /// String-list entry from the kind-specific config block.
    #[must_use]
    pub fn string_list(&self, key: &str) -> Vec<String> {
        self.config
            .get(key)
            .and_then(|v| v.as_sequence())
            .map(|seq| {
                seq.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Integer entry from the kind-specific config block.
    #[must_use]
    pub fn integer(&self, key: &str, default: usize) -> usize {
        self.config
            .get(key)
            .and_then(serde_yaml::Value::as_u64)
            .map_or(default, |v| v as usize)
    }
}

/// Parse interval notation: `<number><unit>` with unit one of
/// `ms`, `s`, `m`, `h`.
pub fn parse_interval(input: &str) -> Result<Duration> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| anyhow::anyhow!("interval '{input}' has no unit"))?;
    let (digits, unit) = input.split_at(split);
    let value: u64 = digits
        .parse()
        .with_context(|| format!("interval '{input}' has no numeric value"))?;

    let duration = match unit {
        "ms" => Duration::from_millis(value),
        "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value * 60),
        "h" => Duration::from_secs(value * 60 * 60),
        other => anyhow::bail!("interval '{input}' has unknown unit '{other}'"),
    };
    Ok(duration)
}

fn override_str(slot: &mut Option<String>, var: &str) {
    if let Ok(value) = std::env::var(var) {
        if !value.is_empty() {
            *slot = Some(value);
        }
    }
}

fn override_parse<T: std::str::FromStr>(slot: &mut Option<T>, var: &str) {
    if let Ok(value) = std::env::var(var) {
        if let Ok(parsed) = value.parse::<T>() {
            *slot = Some(parsed);
        }
    }
}

fn default_str(slot: &mut Option<String>, default: &str) {
    if slot.as_deref().map_or(true, str::is_empty) {
        *slot = Some(default.to_string());
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_parse_interval_units() {
        assert_eq!(parse_interval("10ms").unwrap(), Duration::from_millis(10));
        assert_eq!(parse_interval("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_interval("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_interval("1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_interval("30").is_err());
        assert!(parse_interval("m").is_err());
        assert!(parse_interval("5d").is_err());
        assert!(parse_interval("").is_err());
    }

    #[test]
    fn test_app_config_defaults() {
        let config = AppConfig::default_with_env();
        assert_eq!(config.model.as_deref(), Some("gpt-4o"));
        assert_eq!(config.max_tokens, Some(10_000));
        assert_eq!(config.tmp_dir.as_deref(), Some("/tmp"));
        assert_eq!(config.concurrency.get("summarization"), Some(&3));
        assert_eq!(config.concurrency.get("transcription"), Some(&2));
        assert_eq!(config.request_ttl_hours, Some(24));
    }

    #[test]
    fn test_app_config_yaml_parse() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
summarizer_provider: text
model: local-model
tmp_dir: /var/tmp/digest
output_provider: local
concurrency:
  transcription: 4
s3:
  bucket: digests
  endpoint: http://localhost:9000
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.summarizer_provider.as_deref(), Some("text"));
        assert_eq!(config.model.as_deref(), Some("local-model"));
        assert_eq!(config.tmp_dir.as_deref(), Some("/var/tmp/digest"));
        assert_eq!(config.output_provider.as_deref(), Some("local"));
        assert_eq!(config.concurrency.get("transcription"), Some(&4));
        // Unlisted stages keep no entry; the engine defaults them to 1.
        assert_eq!(config.concurrency.get("output"), None);
        let s3 = config.s3.unwrap();
        assert_eq!(s3.bucket.as_deref(), Some("digests"));
        assert_eq!(s3.endpoint.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        assert!(AppConfig::load(Path::new("/nonexistent/config.yaml")).is_err());
    }

    #[test]
    fn test_service_config_defaults_and_bind_addr() {
        let config = ServiceConfig::default_with_env();
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.engine_config_path.as_deref(), Some("config.yaml"));
    }

    #[test]
    fn test_sources_config_parse() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
sources:
  - name: tech-news
    kind: search
    enabled: true
    interval: 30m
    prompt_id: key_points
    category: tech
    config:
      queries: ["rust conference talk"]
      channels: ["UCtech", "Tech Weekly"]
      max_videos_per_run: 3
  - name: fixed
    kind: static_list
    enabled: false
    interval: 1h
    config:
      urls: ["https://example.com/a"]
"#
        )
        .unwrap();

        let config = SourcesConfig::load(file.path()).unwrap();
        assert_eq!(config.sources.len(), 2);

        let search = &config.sources[0];
        assert!(search.enabled);
        assert_eq!(search.interval_duration().unwrap(), Duration::from_secs(1800));
        assert_eq!(search.string_list("queries"), vec!["rust conference talk"]);
        assert_eq!(search.string_list("channels").len(), 2);
        assert_eq!(search.integer("max_videos_per_run", 1), 3);
        assert_eq!(search.integer("missing_key", 7), 7);

        let fixed = &config.sources[1];
        assert!(!fixed.enabled);
        assert_eq!(fixed.string_list("urls"), vec!["https://example.com/a"]);
    }

    #[test]
    fn test_missing_sources_file_means_no_sources() {
        let config = SourcesConfig::load(Path::new("/nonexistent/sources.yaml")).unwrap();
        assert!(config.sources.is_empty());
    }
}
