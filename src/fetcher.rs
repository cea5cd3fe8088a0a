//! Document retrieval by URL or local path
//!
//! Network locations go through the HTTP client and the retry policy; local
//! paths are read with `tokio::fs`. Every successful load is memoized for the
//! rest of the run.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use url::Url;

use crate::cache::{CacheConfig, CacheStats, DocumentCache};
use crate::document::is_network_location;
use crate::error::{Result, ValidationError};
use crate::http_client::{AsyncHttpClient, HttpClientConfig};
use crate::retry::RetryPolicy;

/// Counters describing how documents were obtained during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Documents actually read from disk or the network
    pub loads: u64,
    /// Requests answered from the cache
    pub cache_hits: u64,
}

impl From<CacheStats> for FetchStats {
    fn from(stats: CacheStats) -> Self {
        Self {
            loads: stats.loads,
            cache_hits: stats.hits(),
        }
    }
}

pub struct Fetcher {
    http: AsyncHttpClient,
    retry: RetryPolicy,
    cache: DocumentCache,
}

impl Fetcher {
    pub fn new(
        http_config: HttpClientConfig,
        retry: RetryPolicy,
        cache_config: &CacheConfig,
    ) -> Result<Self> {
        Ok(Self {
            http: AsyncHttpClient::new(http_config)?,
            retry,
            cache: DocumentCache::new(cache_config),
        })
    }

    /// Fetch and parse the document at `location`, reusing earlier loads
    pub async fn fetch(&self, location: &str) -> Result<Arc<Value>> {
        if self.cache.contains(location) {
            tracing::debug!(location = %location, "Document cache hit");
        }

        self.cache
            .get_or_load(location, || self.load(location))
            .await
    }

    async fn load(&self, location: &str) -> Result<Value> {
        if is_network_location(location) {
            tracing::debug!(url = %location, "Fetching remote document");
            return self
                .retry
                .run(location, || self.http.get_json(location))
                .await;
        }

        let path = local_path(location)?;
        tracing::debug!(path = %path.display(), "Reading local document");

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ValidationError::from_io(location, &e))?;

        serde_json::from_slice(&bytes).map_err(|e| ValidationError::Parse {
            location: location.to_string(),
            details: e.to_string(),
        })
    }

    pub async fn stats(&self) -> FetchStats {
        self.cache.stats().await.into()
    }
}

fn local_path(location: &str) -> Result<PathBuf> {
    if location.starts_with("file:") {
        let url = Url::parse(location).map_err(|e| ValidationError::Parse {
            location: location.to_string(),
            details: e.to_string(),
        })?;
        return url.to_file_path().map_err(|_| ValidationError::Io {
            location: location.to_string(),
            details: "file URL does not name a local path".to_string(),
        });
    }

    Ok(PathBuf::from(location))
}
