//! Adapter around the `jsonschema` evaluator
//!
//! Schemas are looked up in the offline [`SchemaStore`] first and fetched
//! otherwise. Each schema is compiled once per run; compilation and
//! evaluation are CPU-bound and run on the blocking pool.

use std::path::Path;
use std::sync::Arc;

use jsonschema::{Retrieve, Uri, Validator};
use serde_json::{Value, json};
use tokio::runtime::Handle;
use url::Url;

use crate::cache::CompiledSchemaCache;
use crate::document::is_network_location;
use crate::error::{Result, ValidationError};
use crate::fetcher::Fetcher;
use crate::schema_store::SchemaStore;

/// How a schema is altered before compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaPatch {
    /// Compile the schema exactly as published
    AsPublished,
    /// Replace `allOf` with `[{}]`, as needed for legacy 0.7.0 item schemas
    IgnoreAllOf,
}

impl SchemaPatch {
    fn cache_key(&self, address: &str) -> String {
        match self {
            SchemaPatch::AsPublished => address.to_string(),
            SchemaPatch::IgnoreAllOf => format!("{}#ignore-allOf", address),
        }
    }

    fn apply(&self, schema: &Value) -> Value {
        let mut schema = schema.clone();
        if let (SchemaPatch::IgnoreAllOf, Some(object)) = (self, schema.as_object_mut()) {
            object.insert("allOf".to_string(), json!([{}]));
        }
        schema
    }
}

pub struct SchemaEngine {
    store: Arc<SchemaStore>,
    fetcher: Arc<Fetcher>,
    compiled: CompiledSchemaCache,
}

impl SchemaEngine {
    pub fn new(store: Arc<SchemaStore>, fetcher: Arc<Fetcher>, max_compiled: u64) -> Self {
        Self {
            store,
            fetcher,
            compiled: CompiledSchemaCache::new(max_compiled),
        }
    }

    /// Raw schema document at `address`
    pub async fn load_schema(&self, address: &str) -> Result<Arc<Value>> {
        if let Some(schema) = self.store.get(address) {
            tracing::debug!(schema = %address, "Schema served from bundle");
            return Ok(schema);
        }
        self.fetcher.fetch(address).await
    }

    /// Compiled validator for `address`, built on first use
    pub async fn compiled(&self, address: &str, patch: SchemaPatch) -> Result<Arc<Validator>> {
        let key = patch.cache_key(address);
        self.compiled
            .get_or_compile(key, self.compile(address, patch))
            .await
    }

    async fn compile(&self, address: &str, patch: SchemaPatch) -> Result<Arc<Validator>> {
        let schema = patch.apply(&*self.load_schema(address).await?);
        let retriever = BundleRetriever {
            store: Arc::clone(&self.store),
            fetcher: Arc::clone(&self.fetcher),
            runtime: Handle::current(),
        };
        let base_uri = base_uri(address);
        let url = address.to_string();

        tracing::debug!(schema = %address, ?patch, "Compiling schema");
        tokio::task::spawn_blocking(move || {
            let mut options = jsonschema::options().with_retriever(retriever);
            if let Some(base_uri) = base_uri {
                options = options.with_base_uri(base_uri);
            }
            options
                .build(&schema)
                .map(Arc::new)
                .map_err(|e| ValidationError::InvalidSchema {
                    url,
                    details: e.to_string(),
                })
        })
        .await
        .map_err(|e| ValidationError::Concurrency {
            details: format!("Schema compilation task failed: {}", e),
        })?
    }

    /// Validate `document` against the schema at `address`
    pub async fn validate(&self, document: Arc<Value>, address: &str) -> Result<()> {
        self.validate_with(document, address, SchemaPatch::AsPublished)
            .await
    }

    /// Validate against the schema at `address` with its `allOf` neutralized
    pub async fn validate_patched(&self, document: Arc<Value>, address: &str) -> Result<()> {
        self.validate_with(document, address, SchemaPatch::IgnoreAllOf)
            .await
    }

    async fn validate_with(
        &self,
        document: Arc<Value>,
        address: &str,
        patch: SchemaPatch,
    ) -> Result<()> {
        let validator = self.compiled(address, patch).await?;

        tokio::task::spawn_blocking(move || {
            validator
                .validate(&document)
                .map_err(|error| ValidationError::SchemaValidation {
                    path: pointer_segments(&error.instance_path().to_string()),
                    message: error.to_string(),
                })
        })
        .await
        .map_err(|e| ValidationError::Concurrency {
            details: format!("Validation task failed: {}", e),
        })?
    }

    pub async fn compiled_count(&self) -> u64 {
        self.compiled.entry_count().await
    }
}

/// Resolves remote `$ref`s from the bundle, falling back to the fetcher.
///
/// `jsonschema` calls this synchronously from the blocking pool, so the async
/// fetch is driven with the runtime handle captured at construction.
struct BundleRetriever {
    store: Arc<SchemaStore>,
    fetcher: Arc<Fetcher>,
    runtime: Handle,
}

impl Retrieve for BundleRetriever {
    fn retrieve(
        &self,
        uri: &Uri<String>,
    ) -> std::result::Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let address = uri.as_str();
        if let Some(schema) = self.store.get(address) {
            return Ok((*schema).clone());
        }

        tracing::debug!(schema = %address, "Retrieving referenced schema");
        let schema = self.runtime.block_on(self.fetcher.fetch(address))?;
        Ok((*schema).clone())
    }
}

/// Base URI used to resolve relative `$ref`s of a schema loaded from `address`
fn base_uri(address: &str) -> Option<String> {
    if is_network_location(address) || address.starts_with("file:") {
        return Some(address.to_string());
    }

    let absolute = std::path::absolute(Path::new(address)).ok()?;
    Url::from_file_path(absolute).ok().map(String::from)
}

/// Split a JSON pointer into its unescaped reference tokens
fn pointer_segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
        .collect()
}
