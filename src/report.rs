use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::AssetType;
use crate::error::ValidationError;
use crate::fetcher::FetchStats;
use crate::stac_validator::ValidationOutcome;

/// Which kind of validation produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMethod {
    Core,
    Extensions,
    Default,
    Recursive,
    Custom,
}

/// Outcome for one validated document, serialized with the public record keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub version: String,
    pub path: String,
    pub schema: Vec<String>,
    pub valid_stac: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub asset_type: Option<AssetType>,
    pub validation_method: ValidationMethod,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_message: Option<String>,
}

impl ValidationRecord {
    /// Record for a document that was loaded, classified and checked
    pub fn from_outcome(
        path: impl Into<String>,
        version: impl Into<String>,
        asset_type: AssetType,
        method: ValidationMethod,
        outcome: ValidationOutcome,
    ) -> Self {
        let mut record = Self {
            version: version.into(),
            path: path.into(),
            schema: outcome.schemas,
            valid_stac: true,
            asset_type: Some(asset_type),
            validation_method: method,
            error_type: None,
            error_message: None,
        };
        if let Err(error) = outcome.result {
            record.set_error(&error);
        }
        record
    }

    /// Record for a document that failed before any schema was consulted
    pub fn failure(
        path: impl Into<String>,
        version: impl Into<String>,
        asset_type: Option<AssetType>,
        method: ValidationMethod,
        error: &ValidationError,
    ) -> Self {
        let mut record = Self {
            version: version.into(),
            path: path.into(),
            schema: Vec::new(),
            valid_stac: true,
            asset_type,
            validation_method: method,
            error_type: None,
            error_message: None,
        };
        record.set_error(error);
        record
    }

    fn set_error(&mut self, error: &ValidationError) {
        self.valid_stac = false;
        self.error_type = Some(error.error_type().to_string());
        self.error_message = Some(error.to_string());
    }
}

/// Append-only collection point shared by every branch of a traversal
#[derive(Debug, Clone, Default)]
pub struct ReportSink {
    records: Arc<Mutex<Vec<ValidationRecord>>>,
}

impl ReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: ValidationRecord) {
        // a poisoned lock still holds every record appended before the panic
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        records.push(record);
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<ValidationRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Aggregated results of one validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Unique identifier of the run
    pub run_id: Uuid,
    /// When the report was produced
    pub generated_at: DateTime<Utc>,
    /// Overall verdict: at least one record, and every record valid
    pub valid: bool,
    /// Number of records
    pub total: usize,
    /// Number of valid records
    pub valid_count: usize,
    /// Number of invalid records
    pub invalid_count: usize,
    /// Items validated through `item` links
    pub items_validated: u64,
    /// Wall-clock duration of the run
    pub duration: Duration,
    /// Documents loaded vs. served from cache
    #[serde(skip)]
    pub fetch_stats: FetchStats,
    /// Individual document records, in completion order
    pub records: Vec<ValidationRecord>,
}

impl ValidationReport {
    /// Aggregate individual records into a summary
    pub fn aggregate(records: Vec<ValidationRecord>, duration: Duration) -> Self {
        let total = records.len();
        let valid_count = records.iter().filter(|r| r.valid_stac).count();

        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            valid: total > 0 && valid_count == total,
            total,
            valid_count,
            invalid_count: total - valid_count,
            items_validated: 0,
            duration,
            fetch_stats: FetchStats::default(),
            records,
        }
    }

    pub fn with_items_validated(mut self, items_validated: u64) -> Self {
        self.items_validated = items_validated;
        self
    }

    pub fn with_fetch_stats(mut self, fetch_stats: FetchStats) -> Self {
        self.fetch_stats = fetch_stats;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Get success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.valid_count as f64 / self.total as f64) * 100.0
        }
    }

    /// Items per second over the whole run
    pub fn throughput(&self) -> f64 {
        let seconds = self.duration.as_secs_f64();
        if seconds > 0.0 {
            self.items_validated as f64 / seconds
        } else {
            0.0
        }
    }

    /// Records that failed, in order
    pub fn failures(&self) -> impl Iterator<Item = &ValidationRecord> {
        self.records.iter().filter(|r| !r.valid_stac)
    }
}
