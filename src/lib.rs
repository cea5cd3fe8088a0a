//! # stac-validate Library
//!
//! Async validation of STAC catalogs, collections and items against their
//! versioned core and extension schemas, optionally walking the whole link
//! tree with bounded concurrency, retrying network fetches and memoizing
//! every document and schema for the duration of a run.

pub mod cache;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod fetcher;
pub mod http_client;
pub mod output;
pub mod report;
pub mod resolver;
pub mod retry;
pub mod schema_engine;
pub mod schema_store;
pub mod stac_validator;
pub mod validator;

pub use cache::{CacheConfig, CacheStats, CompiledSchemaCache, DocumentCache};
pub use config::{Config, ConfigError, ConfigManager};
pub use document::{AssetType, Link, LinkRel, StacDocument, classify};
pub use error::ValidationError;
pub use fetcher::{FetchStats, Fetcher};
pub use http_client::{AsyncHttpClient, HttpClientConfig};
pub use output::Output;
pub use report::{ReportSink, ValidationMethod, ValidationRecord, ValidationReport};
pub use resolver::{resolve_core_schema, resolve_extension_schema};
pub use retry::RetryPolicy;
pub use schema_engine::SchemaEngine;
pub use schema_store::SchemaStore;
pub use stac_validator::{StacSchemaValidator, ValidationOutcome};
pub use validator::{
    ItemProgress, TraversalContext, ValidationConfig, ValidationEngine, ValidationMode,
};
