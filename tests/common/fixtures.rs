use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;

use stac_validate::cache::CacheConfig;
use stac_validate::fetcher::Fetcher;
use stac_validate::http_client::HttpClientConfig;
use stac_validate::retry::RetryPolicy;
use stac_validate::schema_engine::SchemaEngine;
use stac_validate::schema_store::SchemaStore;
use stac_validate::validator::{ValidationConfig, ValidationEngine};

pub const CATALOG_1_0_0: &str =
    "https://schemas.stacspec.org/v1.0.0/catalog-spec/json-schema/catalog.json";
pub const COLLECTION_1_0_0: &str =
    "https://schemas.stacspec.org/v1.0.0/collection-spec/json-schema/collection.json";
pub const ITEM_1_0_0: &str = "https://schemas.stacspec.org/v1.0.0/item-spec/json-schema/item.json";
pub const CATALOG_0_7_0: &str = "https://cdn.staclint.com/v0.7.0/catalog.json";
pub const ITEM_0_7_0: &str = "https://cdn.staclint.com/v0.7.0/item.json";
pub const ITEM_BETA_2: &str =
    "https://schemas.stacspec.org/v1.0.0-beta.2/item-spec/json-schema/item.json";
pub const PROJECTION_BETA_1: &str =
    "https://cdn.staclint.com/v1.0.0-beta.1/extension/projection.json";

/// Stand-ins for the published schemas, keyed by the addresses the resolver derives
pub fn schema_store() -> SchemaStore {
    let catalog = |id: &str| {
        json!({
            "$id": id,
            "type": "object",
            "required": ["id", "links"]
        })
    };
    let item = |id: &str| {
        json!({
            "$id": id,
            "type": "object",
            "required": ["id", "properties"],
            "properties": {
                "properties": {"type": "object", "required": ["datetime"]}
            }
        })
    };

    SchemaStore::empty()
        .with_schema(catalog(CATALOG_1_0_0))
        .with_schema(json!({
            "$id": COLLECTION_1_0_0,
            "type": "object",
            "required": ["id", "extent", "license"]
        }))
        .with_schema(item(ITEM_1_0_0))
        .with_schema(catalog(CATALOG_0_7_0))
        .with_schema(json!({
            "$id": ITEM_0_7_0,
            "type": "object",
            "required": ["id"],
            // unsatisfiable unless the legacy patch replaces it
            "allOf": [{"required": ["never-present"]}]
        }))
        .with_schema(item(ITEM_BETA_2))
        .with_schema(json!({
            "$id": PROJECTION_BETA_1,
            "type": "object",
            "properties": {
                "properties": {"type": "object", "required": ["proj:epsg"]}
            }
        }))
}

/// Retry policy tuned for tests: quick delays, few attempts
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        multiplier: 2,
        max_elapsed: Duration::from_secs(5),
        max_retries: Some(3),
    }
}

pub fn fetcher(retry: RetryPolicy, timeout_seconds: u64) -> Arc<Fetcher> {
    Arc::new(
        Fetcher::new(
            HttpClientConfig {
                timeout_seconds,
                ..Default::default()
            },
            retry,
            &CacheConfig::default(),
        )
        .unwrap(),
    )
}

pub fn engine_with(config: ValidationConfig, fetcher: Arc<Fetcher>) -> ValidationEngine {
    let schemas = Arc::new(SchemaEngine::new(
        Arc::new(schema_store()),
        fetcher.clone(),
        64,
    ));
    ValidationEngine::new(fetcher, schemas, config)
}

pub fn engine(config: ValidationConfig) -> ValidationEngine {
    engine_with(config, fetcher(fast_retry(), 5))
}

pub fn catalog(id: &str, version: &str, links: Value) -> Value {
    json!({
        "type": "Catalog",
        "id": id,
        "stac_version": version,
        "description": "test catalog",
        "links": links
    })
}

pub fn item(id: &str, version: &str) -> Value {
    json!({
        "type": "Feature",
        "id": id,
        "stac_version": version,
        "geometry": null,
        "properties": {"datetime": "2020-01-01T00:00:00Z"},
        "links": [],
        "assets": {}
    })
}

pub fn link(rel: &str, href: &str) -> Value {
    json!({"rel": rel, "href": href})
}

/// Write `value` as `name` below `dir`, creating parent directories
pub fn write_json(dir: &Path, name: &str, value: &Value) -> String {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path.to_string_lossy().into_owned()
}

/// Chain of catalogs root -> level1 -> level2 -> level3, each in its own directory
pub fn catalog_chain(dir: &TempDir) -> String {
    write_json(
        dir.path(),
        "level1/level2/level3/catalog.json",
        &catalog("level3", "1.0.0", json!([])),
    );
    write_json(
        dir.path(),
        "level1/level2/catalog.json",
        &catalog("level2", "1.0.0", json!([link("child", "./level3/catalog.json")])),
    );
    write_json(
        dir.path(),
        "level1/catalog.json",
        &catalog("level1", "1.0.0", json!([link("child", "level2/catalog.json")])),
    );
    write_json(
        dir.path(),
        "catalog.json",
        &catalog(
            "root",
            "1.0.0",
            json!([link("self", "./catalog.json"), link("child", "./level1/catalog.json")]),
        ),
    )
}
