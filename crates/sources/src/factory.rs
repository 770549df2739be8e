//! Build pollers from configuration

use std::sync::Arc;

use video_digest_common::{PipelineError, Result, Submitter};
use video_digest_config::SourceConfig;
use video_digest_fetcher::YtDlpFetcher;

use crate::discovery::{Discovery, SearchDiscovery, StaticListDiscovery};
use crate::poller::Poller;

/// Construct a poller for one source definition.
///
/// Supported kinds: `search` (query-based discovery through the fetcher)
/// and `static_list` (fixed URL list).
pub fn poller_from_config(
    source: &SourceConfig,
    fetcher: Arc<YtDlpFetcher>,
    submitter: Arc<dyn Submitter>,
) -> Result<Arc<Poller>> {
    let interval = source
        .interval_duration()
        .map_err(|err| PipelineError::Config(err.to_string()))?;

    let discovery: Arc<dyn Discovery> = match source.kind.as_str() {
        "search" => {
            let queries = source.string_list("queries");
            if queries.is_empty() {
                return Err(PipelineError::Config(format!(
                    "search source '{}' has no queries",
                    source.name
                )));
            }
            Arc::new(SearchDiscovery::new(
                fetcher,
                queries,
                source.string_list("channels"),
                source.integer("max_videos_per_run", 1),
            ))
        }
        "static_list" => {
            let urls = source.string_list("urls");
            if urls.is_empty() {
                return Err(PipelineError::Config(format!(
                    "static_list source '{}' has no urls",
                    source.name
                )));
            }
            Arc::new(StaticListDiscovery::new(urls))
        }
        other => {
            return Err(PipelineError::Config(format!(
                "unsupported source kind '{other}' for source '{}'",
                source.name
            )));
        }
    };

    Ok(Arc::new(Poller::new(
        &source.name,
        interval,
        source.prompt_id.clone().unwrap_or_else(|| "general".to_string()),
        source.category.clone(),
        discovery,
        submitter,
    )))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use video_digest_common::{Submission, SubmissionOutcome};

    use super::*;

    struct NullSubmitter;

    #[async_trait]
    impl Submitter for NullSubmitter {
        async fn submit(&self, _submission: Submission) -> Result<SubmissionOutcome> {
            Ok(SubmissionOutcome {
                request_id: "req-x".to_string(),
                deduplicated: false,
            })
        }
    }

    fn source_yaml(yaml: &str) -> SourceConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn deps() -> (Arc<YtDlpFetcher>, Arc<dyn Submitter>) {
        (
            Arc::new(YtDlpFetcher::new("/usr/local/bin/yt-dlp", "/tmp")),
            Arc::new(NullSubmitter),
        )
    }

    #[test]
    fn test_static_list_source_builds() {
        let source = source_yaml(
            r#"
name: fixed
kind: static_list
enabled: true
interval: 1h
category: tech
config:
  urls: ["https://example.com/a"]
"#,
        );
        let (fetcher, submitter) = deps();
        let poller = poller_from_config(&source, fetcher, submitter).unwrap();
        assert_eq!(poller.name(), "fixed");
    }

    #[test]
    fn test_search_source_requires_queries() {
        let source = source_yaml(
            r#"
name: empty-search
kind: search
enabled: true
interval: 30m
config: {}
"#,
        );
        let (fetcher, submitter) = deps();
        let err = poller_from_config(&source, fetcher, submitter).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let source = source_yaml(
            r#"
name: feed
kind: rss_feed
enabled: true
interval: 30m
config: {}
"#,
        );
        let (fetcher, submitter) = deps();
        let err = poller_from_config(&source, fetcher, submitter).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_bad_interval_is_rejected() {
        let source = source_yaml(
            r#"
name: fixed
kind: static_list
enabled: true
interval: nonsense
config:
  urls: ["https://example.com/a"]
"#,
        );
        let (fetcher, submitter) = deps();
        assert!(poller_from_config(&source, fetcher, submitter).is_err());
    }
}
