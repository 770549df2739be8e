//! Discovery operations run by pollers

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use video_digest_common::Result;
use video_digest_fetcher::YtDlpFetcher;

/// One discovery cycle: produce candidate URLs for submission
#[async_trait]
pub trait Discovery: Send + Sync {
    async fn discover(&self) -> Result<Vec<String>>;
}

impl std::fmt::Debug for dyn Discovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Discovery")
    }
}

/// Search-based discovery via the fetcher's search capability
///
/// Searches with 2x headroom so a channel filter still has enough
/// candidates, then caps the result at `max_results`.
pub struct SearchDiscovery {
    fetcher: Arc<YtDlpFetcher>,
    queries: Vec<String>,
    /// Allow-list of channel ids or names; empty means no filter.
    channels: Vec<String>,
    max_results: usize,
}

impl SearchDiscovery {
    #[must_use]
    pub fn new(
        fetcher: Arc<YtDlpFetcher>,
        queries: Vec<String>,
        channels: Vec<String>,
        max_results: usize,
    ) -> Self {
        Self {
            fetcher,
            queries,
            channels,
            max_results: max_results.max(1),
        }
    }

    async fn channel_allowed(&self, url: &str) -> bool {
        if self.channels.is_empty() {
            return true;
        }
        match self.fetcher.channel_of(url).await {
            Ok(channel) => self.channels.iter().any(|allowed| channel.matches(allowed)),
            Err(err) => {
                warn!("could not resolve channel for {url}: {err}");
                false
            }
        }
    }
}

#[async_trait]
impl Discovery for SearchDiscovery {
    async fn discover(&self) -> Result<Vec<String>> {
        let mut urls = Vec::new();

        for query in &self.queries {
            let candidates = match self.fetcher.search(query, self.max_results * 2).await {
                Ok(candidates) => candidates,
                Err(err) => {
                    warn!("search '{query}' failed: {err}");
                    continue;
                }
            };

            for url in candidates {
                if urls.len() >= self.max_results {
                    break;
                }
                if self.channel_allowed(&url).await {
                    urls.push(url);
                }
            }

            debug!("query '{query}': {} url(s) collected so far", urls.len());
            if urls.len() >= self.max_results {
                break;
            }
        }

        Ok(urls)
    }
}

/// Fixed-list discovery: always returns the configured URLs
///
/// Deduplication downstream keeps repeat ticks from re-running completed
/// pipelines.
pub struct StaticListDiscovery {
    urls: Vec<String>,
}

impl StaticListDiscovery {
    #[must_use]
    pub fn new(urls: Vec<String>) -> Self {
        Self { urls }
    }
}

#[async_trait]
impl Discovery for StaticListDiscovery {
    async fn discover(&self) -> Result<Vec<String>> {
        Ok(self.urls.clone())
    }
}
