//! video-digest service entry point
//!
//! Loads configuration, builds the collaborators and the processing
//! engine, starts background sources, and serves the HTTP API until a
//! termination signal arrives. Initialization failures exit non-zero.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use video_digest_api_server::{serve, AppState};
use video_digest_common::{PromptResolver, Stage, Submitter};
use video_digest_config::{AppConfig, PromptCatalog, ServiceConfig, SourcesConfig};
use video_digest_engine::{EngineConfig, ProcessingEngine};
use video_digest_fetcher::YtDlpFetcher;
use video_digest_publisher::{publisher_from_config, ObjectStoreConfig, OutputProvider};
use video_digest_sources::{poller_from_config, SourceManager};
use video_digest_summarizer::{summarizer_from_config, SummarizerProvider};
use video_digest_transcriber::WhisperCliTranscriber;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "video_digest=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Service config comes from VD_SERVICE_CONFIG or ./service.yaml.
    let service_config_path =
        std::env::var("VD_SERVICE_CONFIG").unwrap_or_else(|_| "service.yaml".to_string());
    let service_config = if Path::new(&service_config_path).exists() {
        ServiceConfig::load(Path::new(&service_config_path))?
    } else {
        warn!("service config {service_config_path} not found, using defaults");
        ServiceConfig::default_with_env()
    };

    let app_config_path = service_config
        .engine_config_path
        .clone()
        .unwrap_or_else(|| "config.yaml".to_string());
    let app_config = if Path::new(&app_config_path).exists() {
        AppConfig::load(Path::new(&app_config_path))?
    } else {
        warn!("engine config {app_config_path} not found, using defaults");
        AppConfig::default_with_env()
    };

    let prompts_dir = service_config
        .prompts_dir
        .clone()
        .or_else(|| app_config.prompts_dir.clone())
        .unwrap_or_else(|| "prompts".to_string());
    let prompts = Arc::new(
        PromptCatalog::load(Path::new(&prompts_dir))
            .with_context(|| format!("failed to load prompts from {prompts_dir}"))?,
    );

    let tmp_dir = PathBuf::from(app_config.tmp_dir.clone().unwrap_or_else(|| "/tmp".into()));
    tokio::fs::create_dir_all(&tmp_dir)
        .await
        .with_context(|| format!("failed to create tmp dir {}", tmp_dir.display()))?;

    // Collaborators.
    let fetcher = Arc::new(YtDlpFetcher::new(
        app_config.yt_dlp_path.clone().unwrap_or_default(),
        tmp_dir.clone(),
    ));
    video_digest_fetcher::check_binary(Path::new(
        app_config.yt_dlp_path.as_deref().unwrap_or_default(),
    ));

    let transcriber = Arc::new(WhisperCliTranscriber::new(
        app_config.whisper_path.clone().unwrap_or_default(),
        app_config.whisper_model_path.clone().unwrap_or_default(),
        tmp_dir.clone(),
    ));

    let summarizer_provider: SummarizerProvider = app_config
        .summarizer_provider
        .as_deref()
        .unwrap_or("ai")
        .parse()
        .map_err(|err: String| anyhow::anyhow!(err))?;
    let summarizer = summarizer_from_config(
        summarizer_provider,
        app_config.api_key.as_deref(),
        app_config.api_base.as_deref().unwrap_or_default(),
        app_config.model.as_deref().unwrap_or_default(),
        tmp_dir.clone(),
    )
    .context("failed to build summarizer")?;

    let output_provider: OutputProvider = app_config
        .output_provider
        .as_deref()
        .unwrap_or("object_store")
        .parse()
        .map_err(|err: String| anyhow::anyhow!(err))?;
    let object_store = object_store_config(&app_config);
    let publisher = publisher_from_config(
        output_provider,
        object_store,
        PathBuf::from(
            app_config
                .local_output_dir
                .clone()
                .unwrap_or_else(|| "digests".into()),
        ),
    )
    .await
    .context("failed to build publisher")?;

    // Engine.
    let engine_config = EngineConfig {
        model: app_config.model.clone().unwrap_or_else(|| "gpt-4o".into()),
        max_tokens: app_config.max_tokens.unwrap_or(10_000),
        concurrency: stage_concurrency(&app_config.concurrency),
        request_ttl: Duration::from_secs(app_config.request_ttl_hours.unwrap_or(24) * 3600),
        ..EngineConfig::default()
    };
    let engine = ProcessingEngine::new(
        engine_config,
        fetcher.clone(),
        transcriber,
        summarizer,
        Some(publisher),
        Arc::clone(&prompts) as Arc<dyn PromptResolver>,
    );
    engine.start();

    // Background sources.
    let sources_path = service_config
        .sources_config_path
        .clone()
        .unwrap_or_else(|| "sources.yaml".to_string());
    let sources_config = SourcesConfig::load(Path::new(&sources_path))?;
    let sources = Arc::new(SourceManager::new());
    for source in &sources_config.sources {
        match poller_from_config(
            source,
            Arc::clone(&fetcher),
            Arc::clone(&engine) as Arc<dyn Submitter>,
        ) {
            Ok(poller) => {
                info!(
                    "registered source {} (kind: {}, interval: {}, enabled: {})",
                    source.name, source.kind, source.interval, source.enabled
                );
                sources.add(poller, source.enabled);
            }
            Err(err) => warn!("skipping source {}: {err}", source.name),
        }
    }
    sources.start_enabled();

    // Serve until SIGINT/SIGTERM.
    let state = AppState {
        engine: Arc::clone(&engine),
        prompts,
        sources: Arc::clone(&sources),
    };
    let addr = service_config.bind_addr();
    serve(&addr, state, shutdown_signal())
        .await
        .with_context(|| format!("HTTP server failed on {addr}"))?;

    info!("shutting down");
    sources.stop_all().await;
    engine.shutdown().await;
    info!("shutdown complete");
    Ok(())
}

fn object_store_config(app_config: &AppConfig) -> ObjectStoreConfig {
    let defaults = ObjectStoreConfig::default();
    let Some(s3) = &app_config.s3 else {
        return defaults;
    };
    ObjectStoreConfig {
        bucket: s3.bucket.clone().unwrap_or(defaults.bucket),
        region: s3.region.clone().unwrap_or(defaults.region),
        endpoint: s3.endpoint.clone().or(defaults.endpoint),
        access_key_id: s3.access_key_id.clone().unwrap_or(defaults.access_key_id),
        secret_access_key: s3
            .secret_access_key
            .clone()
            .unwrap_or(defaults.secret_access_key),
        prefix: s3.prefix.clone().unwrap_or(defaults.prefix),
    }
}

fn stage_concurrency(config: &HashMap<String, usize>) -> HashMap<Stage, usize> {
    let mut limits = HashMap::new();
    for (name, count) in config {
        match name.parse::<Stage>() {
            Ok(stage) => {
                limits.insert(stage, *count);
            }
            Err(_) => warn!("ignoring concurrency entry for unknown stage '{name}'"),
        }
    }
    limits
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("termination signal received");
}
