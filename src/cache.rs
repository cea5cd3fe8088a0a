use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use jsonschema::Validator;
use moka::future::Cache;
use serde_json::Value;

use crate::error::{Result, ValidationError};

/// Cache configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of parsed documents kept per run
    pub max_entries: u64,
    /// Maximum number of compiled schemas kept per run
    pub max_compiled_schemas: u64,
    /// Optional time-to-live for cached documents
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            max_compiled_schemas: 100,
            ttl: None,
        }
    }
}

/// Snapshot of cache activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served, cached or not
    pub requests: u64,
    /// Lookups that had to run the loader
    pub loads: u64,
    /// Entries currently held
    pub entry_count: u64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.requests.saturating_sub(self.loads)
    }
}

/// Bounded in-memory memoization of parsed documents, keyed by input location.
///
/// Backed by `moka`, so concurrent requests for the same key wait for a single
/// loader instead of each fetching the document. Failed loads are not cached.
pub struct DocumentCache {
    cache: Cache<String, Arc<Value>>,
    requests: AtomicU64,
    loads: Arc<AtomicU64>,
}

impl DocumentCache {
    pub fn new(config: &CacheConfig) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_entries);
        if let Some(ttl) = config.ttl {
            builder = builder.time_to_live(ttl);
        }

        Self {
            cache: builder.build(),
            requests: AtomicU64::new(0),
            loads: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get a document from the cache, or load it if missing.
    ///
    /// The `loader` future is only executed if the key is missing.
    pub async fn get_or_load<F, Fut>(&self, key: &str, loader: F) -> Result<Arc<Value>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let loads = Arc::clone(&self.loads);
        let load = loader();

        self.cache
            .try_get_with(key.to_string(), async move {
                loads.fetch_add(1, Ordering::Relaxed);
                load.await.map(Arc::new)
            })
            .await
            .map_err(|e: Arc<ValidationError>| (*e).clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    pub async fn stats(&self) -> CacheStats {
        // Run sync to ensure all pending operations are complete
        self.cache.run_pending_tasks().await;

        CacheStats {
            requests: self.requests.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            entry_count: self.cache.entry_count(),
        }
    }
}

/// In-memory cache for compiled JSON Schema validators
///
/// Compiling a schema resolves every `$ref` it contains, so each schema is
/// compiled once per run even if many documents request it simultaneously.
pub struct CompiledSchemaCache {
    cache: Cache<String, Arc<Validator>>,
}

impl CompiledSchemaCache {
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder().max_capacity(max_capacity).build();

        Self { cache }
    }

    /// Get a compiled schema from the cache, or compile it if missing.
    pub async fn get_or_compile<Fut>(&self, key: String, compile: Fut) -> Result<Arc<Validator>>
    where
        Fut: Future<Output = Result<Arc<Validator>>>,
    {
        self.cache
            .try_get_with(key, compile)
            .await
            .map_err(|e: Arc<ValidationError>| (*e).clone())
    }

    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}
