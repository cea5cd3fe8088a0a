use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use ignore::WalkBuilder;
use serde_json::Value;

use crate::error::{Result, ValidationError};

/// Offline lookup table of schema documents keyed by their `$id`.
///
/// Consulted before any schema (or `$ref` target) is requested over the
/// network, so a bundle of schema files on disk can stand in for the remote
/// hosts entirely.
#[derive(Debug, Clone, Default)]
pub struct SchemaStore {
    schemas: HashMap<String, Arc<Value>>,
}

impl SchemaStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every `*.json` file below `dir` that declares an `$id`.
    ///
    /// The walk and the reads run on the blocking pool.
    pub async fn from_dir(dir: &Path) -> Result<Self> {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || Self::scan_dir(&dir))
            .await
            .map_err(|e| ValidationError::Concurrency {
                details: format!("Schema bundle loading task failed: {}", e),
            })?
    }

    fn scan_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(ValidationError::Config(format!(
                "Schema directory does not exist: {}",
                dir.display()
            )));
        }

        let mut store = Self::empty();
        let walker = WalkBuilder::new(dir)
            .standard_filters(false)
            .follow_links(true)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable schema directory entry");
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }

            let location = path.to_string_lossy();
            let bytes = std::fs::read(path).map_err(|e| ValidationError::from_io(&location, &e))?;
            let schema: Value =
                serde_json::from_slice(&bytes).map_err(|e| ValidationError::Parse {
                    location: location.to_string(),
                    details: e.to_string(),
                })?;

            if !store.insert(schema) {
                tracing::warn!(path = %location, "Schema file has no $id, skipping");
            }
        }

        tracing::info!(dir = %dir.display(), schemas = store.len(), "Loaded schema bundle");
        Ok(store)
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.insert(schema);
        self
    }

    /// Add a schema under its `$id`; returns false when it has none
    pub fn insert(&mut self, schema: Value) -> bool {
        let Some(id) = schema.get("$id").and_then(Value::as_str) else {
            return false;
        };
        let key = normalize_id(id).to_string();
        self.schemas.insert(key, Arc::new(schema));
        true
    }

    pub fn get(&self, address: &str) -> Option<Arc<Value>> {
        self.schemas.get(normalize_id(address)).cloned()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.schemas.contains_key(normalize_id(address))
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// `https://host/x.json#` and `https://host/x.json` name the same schema
fn normalize_id(id: &str) -> &str {
    id.trim_end_matches('#')
}
