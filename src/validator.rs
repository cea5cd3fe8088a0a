//! Recursive STAC validation engine
//!
//! This module drives a validation run:
//! - **Async I/O**: documents and schemas are fetched concurrently and memoized
//! - **Blocking CPU work**: schema compilation and evaluation run on the blocking pool
//! - **Bounded concurrency**: a semaphore limits how many linked documents are
//!   loaded and validated at once
//! - **Branch-local failures**: a failing document is recorded and its subtree
//!   skipped, while its siblings carry on
//!
//! Per-node data travels in an explicit [`TraversalContext`]; the only shared
//! state is the report sink, the item counter and the caches. Every linked
//! document is walked in its own task, and a `child` link back to an ancestor
//! is recorded as a cycle instead of being followed.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::Semaphore;

use crate::document::{
    AssetType, LinkRel, StacDocument, classify, normalize_location, resolve_href,
};
use crate::error::ValidationError;
use crate::fetcher::Fetcher;
use crate::report::{ReportSink, ValidationMethod, ValidationRecord, ValidationReport};
use crate::schema_engine::SchemaEngine;
use crate::stac_validator::{StacSchemaValidator, ValidationOutcome};

/// Version whose item schemas need their `allOf` neutralized
const LEGACY_ITEM_VERSION: &str = "0.7.0";

/// Validation configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationConfig {
    /// Number of linked documents loaded and validated at once
    pub max_concurrent_fetches: usize,
    /// Deepest level whose links are still followed (root is 0); `None` is unbounded
    pub max_depth: Option<u32>,
    /// Print an items/second progress line to stderr
    pub show_progress: bool,
    /// Echo every record to stderr as it is produced
    pub verbose: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: num_cpus::get(),
            max_depth: None,
            show_progress: false,
            verbose: false,
        }
    }
}

/// What a run checks
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Core schema, plus extension schemas for items
    #[default]
    Default,
    /// Core schema only
    Core,
    /// Extension schemas only (core schema for catalogs and collections)
    Extensions,
    /// Default validation of the root and everything reachable from it
    Recursive,
    /// A user-supplied schema URL or path
    Custom(String),
}

impl ValidationMode {
    pub fn method(&self) -> ValidationMethod {
        match self {
            ValidationMode::Default => ValidationMethod::Default,
            ValidationMode::Core => ValidationMethod::Core,
            ValidationMode::Extensions => ValidationMethod::Extensions,
            ValidationMode::Recursive => ValidationMethod::Recursive,
            ValidationMode::Custom(_) => ValidationMethod::Custom,
        }
    }
}

/// Where a node sits in the traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalContext {
    /// Location the node was loaded from; relative links resolve against it
    pub location: String,
    /// Effective STAC version of the node
    pub version: String,
    /// Distance from the root (root is 0)
    pub depth: u32,
    /// Normalized locations of the nodes between the root and this one, root first
    pub ancestors: Vec<String>,
}

impl TraversalContext {
    pub fn root(location: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            version: version.into(),
            depth: 0,
            ancestors: Vec::new(),
        }
    }

    /// Context for a document linked from this node
    pub fn child(&self, location: impl Into<String>) -> Self {
        let mut ancestors = self.ancestors.clone();
        ancestors.push(normalize_location(&self.location));
        Self {
            location: location.into(),
            version: self.version.clone(),
            depth: self.depth + 1,
            ancestors,
        }
    }

    /// Whether links of this node are beyond the depth bound
    pub fn at_depth_limit(&self, max_depth: Option<u32>) -> bool {
        max_depth.is_some_and(|max_depth| self.depth >= max_depth)
    }

    /// Whether this node is already being walked further up its own branch
    pub fn revisits_ancestor(&self) -> bool {
        let location = normalize_location(&self.location);
        self.ancestors.iter().any(|ancestor| *ancestor == location)
    }
}

/// Items-validated counter with throughput
#[derive(Debug)]
pub struct ItemProgress {
    items_validated: AtomicU64,
    start_time: Instant,
    show: bool,
}

impl ItemProgress {
    pub fn new(show: bool) -> Self {
        Self {
            items_validated: AtomicU64::new(0),
            start_time: Instant::now(),
            show,
        }
    }

    /// Count one more item and return the new total
    pub fn record_item(&self) -> u64 {
        let done = self.items_validated.fetch_add(1, Ordering::Relaxed) + 1;
        let rate = self.items_per_second();
        tracing::debug!(items_validated = done, items_per_second = rate, "Item validated");

        if self.show {
            let mut stderr = std::io::stderr().lock();
            let _ = write!(
                stderr,
                "\rValidated {} items at {:.2} items/second",
                done, rate
            );
            let _ = stderr.flush();
        }
        done
    }

    pub fn items_validated(&self) -> u64 {
        self.items_validated.load(Ordering::Relaxed)
    }

    pub fn items_per_second(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.items_validated() as f64 / elapsed
        } else {
            0.0
        }
    }

    fn finish(&self) {
        if self.show && self.items_validated() > 0 {
            eprintln!();
        }
    }
}

/// State shared by every branch of one run
struct RunState {
    sink: ReportSink,
    progress: ItemProgress,
    permits: Semaphore,
    method: ValidationMethod,
}

/// A node that loaded and classified successfully
struct LoadedNode {
    document: StacDocument,
    asset_type: AssetType,
    version: String,
}

/// Drives validation of a single document or a whole STAC tree
pub struct ValidationEngine {
    fetcher: Arc<Fetcher>,
    validator: StacSchemaValidator,
    config: ValidationConfig,
}

impl ValidationEngine {
    pub fn new(fetcher: Arc<Fetcher>, schemas: Arc<SchemaEngine>, config: ValidationConfig) -> Self {
        Self {
            fetcher,
            validator: StacSchemaValidator::new(schemas),
            config,
        }
    }

    /// Validate `target` (a URL or local path) in the given mode.
    ///
    /// Every failure becomes a record; the run itself always produces a report.
    pub async fn run(&self, target: &str, mode: &ValidationMode) -> ValidationReport {
        let started = Instant::now();
        let walker = Walker {
            fetcher: Arc::clone(&self.fetcher),
            validator: self.validator.clone(),
            max_depth: self.config.max_depth,
            verbose: self.config.verbose,
            run: Arc::new(RunState {
                sink: ReportSink::new(),
                progress: ItemProgress::new(self.config.show_progress),
                permits: Semaphore::new(self.config.max_concurrent_fetches.max(1)),
                method: mode.method(),
            }),
        };

        tracing::info!(
            location = %target,
            method = ?walker.run.method,
            max_depth = ?self.config.max_depth,
            concurrency = self.config.max_concurrent_fetches,
            "Starting validation run"
        );

        match walker.load(target, None).await {
            Ok(root) => walker.validate_root(root, mode).await,
            Err((error, asset_type)) => {
                // the root could not be loaded: nothing else to visit
                walker.emit(ValidationRecord::failure(
                    target,
                    "",
                    asset_type,
                    walker.run.method,
                    &error,
                ));
            }
        }

        walker.run.progress.finish();
        let report = ValidationReport::aggregate(walker.run.sink.snapshot(), started.elapsed())
            .with_items_validated(walker.run.progress.items_validated())
            .with_fetch_stats(self.fetcher.stats().await);

        tracing::info!(
            records = report.total,
            invalid = report.invalid_count,
            valid = report.valid,
            duration_ms = report.duration.as_millis() as u64,
            "Validation run finished"
        );
        report
    }
}

/// Handles for one run, cloned into every spawned branch.
///
/// Each linked document is walked in its own task, so the stack does not grow
/// with the depth of the tree.
#[derive(Clone)]
struct Walker {
    fetcher: Arc<Fetcher>,
    validator: StacSchemaValidator,
    max_depth: Option<u32>,
    verbose: bool,
    run: Arc<RunState>,
}

impl Walker {
    async fn validate_root(&self, root: LoadedNode, mode: &ValidationMode) {
        let LoadedNode {
            document,
            asset_type,
            version,
        } = root;

        let outcome = match mode {
            ValidationMode::Core => {
                self.validator
                    .validate_core(&document, &version, asset_type)
                    .await
            }
            ValidationMode::Extensions => {
                self.validator
                    .validate_extensions(&document, &version, asset_type)
                    .await
            }
            ValidationMode::Custom(schema) => {
                self.validator.validate_custom(&document, schema).await
            }
            ValidationMode::Default | ValidationMode::Recursive => {
                self.validator
                    .validate_default(&document, &version, asset_type)
                    .await
            }
        };

        let valid = outcome.is_valid();
        self.emit_outcome(&document.location, &version, asset_type, outcome);

        if valid && *mode == ValidationMode::Recursive {
            let context = TraversalContext::root(document.location.clone(), version);
            self.descend(document, context).await;
        }
    }

    /// Spawn a task for every `child` and `item` link of `document` and wait for all of them
    fn descend(&self, document: StacDocument, context: TraversalContext) -> BoxFuture<'static, ()> {
        let walker = self.clone();
        async move {
            if context.at_depth_limit(walker.max_depth) {
                tracing::debug!(
                    location = %context.location,
                    depth = context.depth,
                    "Depth limit reached, not following links"
                );
                return;
            }

            let links = document.traversable_links();
            drop(document);

            let branches: Vec<_> = links
                .into_iter()
                .map(|link| {
                    let child = context.child(resolve_href(&context.location, &link.href));
                    let location = child.location.clone();
                    let branch = walker.clone();
                    let task = tokio::spawn(async move {
                        match link.rel {
                            LinkRel::Child => branch.visit_child(child).await,
                            LinkRel::Item => branch.visit_item(child).await,
                        }
                    });
                    (location, task)
                })
                .collect();

            for (location, task) in branches {
                if let Err(e) = task.await {
                    let error = ValidationError::Concurrency {
                        details: format!("Validation task failed: {}", e),
                    };
                    walker.emit(ValidationRecord::failure(
                        location,
                        &context.version,
                        None,
                        walker.run.method,
                        &error,
                    ));
                }
            }
        }
        .boxed()
    }

    /// Load, validate and recurse into a `child` link
    async fn visit_child(self, context: TraversalContext) {
        if context.revisits_ancestor() {
            let error = ValidationError::LinkCycle {
                location: context.location.clone(),
            };
            tracing::warn!(location = %context.location, depth = context.depth, "Child link cycle");
            self.emit(ValidationRecord::failure(
                &context.location,
                &context.version,
                None,
                self.run.method,
                &error,
            ));
            return;
        }

        let Some(node) = self.checked_visit(&context, false).await else {
            return;
        };

        let context = TraversalContext {
            version: node.version,
            ..context
        };
        self.descend(node.document, context).await;
    }

    /// Load and validate an `item` link; items are leaves
    async fn visit_item(self, context: TraversalContext) {
        self.checked_visit(&context, true).await;
        self.run.progress.record_item();
    }

    /// Validate a linked node while holding a concurrency permit.
    ///
    /// Returns the node only when it is valid and its links may be followed.
    async fn checked_visit(
        &self,
        context: &TraversalContext,
        is_item_link: bool,
    ) -> Option<LoadedNode> {
        let _permit = match self.run.permits.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                let error = ValidationError::Concurrency {
                    details: format!("Failed to acquire fetch permit: {}", e),
                };
                self.emit(ValidationRecord::failure(
                    &context.location,
                    &context.version,
                    None,
                    self.run.method,
                    &error,
                ));
                return None;
            }
        };

        let node = match self.load(&context.location, Some(&context.version)).await {
            Ok(node) => node,
            Err((error, asset_type)) => {
                tracing::warn!(location = %context.location, error = %error, "Skipping branch");
                self.emit(ValidationRecord::failure(
                    &context.location,
                    &context.version,
                    asset_type,
                    self.run.method,
                    &error,
                ));
                return None;
            }
        };

        let outcome = if is_item_link && node.version == LEGACY_ITEM_VERSION {
            self.validator
                .validate_legacy_item(&node.document, &node.version)
                .await
        } else {
            self.validator
                .validate_default(&node.document, &node.version, node.asset_type)
                .await
        };

        let valid = outcome.is_valid();
        self.emit_outcome(
            &node.document.location,
            &node.version,
            node.asset_type,
            outcome,
        );
        valid.then_some(node)
    }

    /// Fetch and classify a document.
    ///
    /// A linked document without `stac_version` inherits its parent's; the
    /// root must declare one. On failure the classified type is returned
    /// alongside the error when it is known.
    async fn load(
        &self,
        location: &str,
        inherited_version: Option<&str>,
    ) -> std::result::Result<LoadedNode, (ValidationError, Option<AssetType>)> {
        let content = self.fetcher.fetch(location).await.map_err(|e| (e, None))?;
        let document = StacDocument::new(location, content);
        let asset_type = classify(&document.content).map_err(|e| (e, None))?;

        let version = match (document.version(), inherited_version) {
            (Some(version), _) => version.to_string(),
            (None, Some(inherited)) => inherited.to_string(),
            (None, None) => document
                .require_version()
                .map_err(|e| (e, Some(asset_type)))?,
        };

        Ok(LoadedNode {
            document,
            asset_type,
            version,
        })
    }

    fn emit_outcome(
        &self,
        location: &str,
        version: &str,
        asset_type: AssetType,
        outcome: ValidationOutcome,
    ) {
        self.emit(ValidationRecord::from_outcome(
            location,
            version,
            asset_type,
            self.run.method,
            outcome,
        ));
    }

    fn emit(&self, record: ValidationRecord) {
        tracing::info!(
            path = %record.path,
            version = %record.version,
            valid = record.valid_stac,
            error_type = record.error_type.as_deref().unwrap_or(""),
            "Validated document"
        );

        if self.verbose {
            match serde_json::to_string_pretty(&record) {
                Ok(json) => eprintln!("{}", json),
                Err(e) => tracing::warn!(error = %e, "Failed to serialize record"),
            }
        }
        self.run.sink.push(record);
    }
}
