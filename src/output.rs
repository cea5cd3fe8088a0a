//! Output and reporting
//!
//! Records go to stdout (and optionally a log file) as a pretty JSON array;
//! the human summary goes to stderr, colorized when stderr is a terminal.

use std::path::Path;
use std::time::Duration;

use serde_json::json;

use crate::report::{ValidationRecord, ValidationReport};

/// Formatter for validation records and run summaries
pub struct Output {
    verbose: bool,
    show_colors: bool,
}

impl Output {
    /// Formatter for text written to stderr
    pub fn new(verbose: bool) -> Self {
        Self::with_colors(verbose, atty::is(atty::Stream::Stderr))
    }

    pub fn with_colors(verbose: bool, show_colors: bool) -> Self {
        Self {
            verbose,
            show_colors,
        }
    }

    /// Formatter that never emits color codes
    pub fn plain(verbose: bool) -> Self {
        Self::with_colors(verbose, false)
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    /// The records as a pretty-printed JSON array
    pub fn format_records(&self, records: &[ValidationRecord]) -> serde_json::Result<String> {
        serde_json::to_string_pretty(records)
    }

    pub fn format_record(&self, record: &ValidationRecord) -> String {
        let asset_type = record
            .asset_type
            .map(|t| t.as_str().to_uppercase())
            .unwrap_or_else(|| "UNKNOWN".to_string());

        if record.valid_stac {
            format!(
                "{}  {} {} (v{})",
                self.colorize("✓ VALID", "32"),
                asset_type,
                record.path,
                record.version
            )
        } else {
            format!(
                "{}  {} {} (v{}) - {}: {}",
                self.colorize("✗ INVALID", "31"),
                asset_type,
                record.path,
                record.version,
                record.error_type.as_deref().unwrap_or("Exception"),
                record.error_message.as_deref().unwrap_or("")
            )
        }
    }

    pub fn format_summary(&self, report: &ValidationReport) -> String {
        let mut output = String::new();
        output.push_str("Validation Summary:\n");
        output.push_str(&format!("  Documents: {}\n", report.total));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Valid:", "32"),
            report.valid_count
        ));

        if report.invalid_count > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Invalid:", "31"),
                report.invalid_count
            ));
        }

        output.push_str(&format!("  Success rate: {:.1}%\n", report.success_rate()));
        output.push_str(&format!("  Duration: {}\n", format_duration(report.duration)));

        if report.items_validated > 0 {
            output.push_str(&format!(
                "  Items: {} ({:.1} items/sec)\n",
                report.items_validated,
                report.throughput()
            ));
        }

        if self.verbose {
            output.push_str(&format!(
                "  Documents loaded: {} (cache hits: {})\n",
                report.fetch_stats.loads, report.fetch_stats.cache_hits
            ));
            for record in report.failures() {
                output.push_str(&format!("\n  {}", self.format_record(record)));
            }
            if report.invalid_count > 0 {
                output.push('\n');
            }
        }

        output
    }

    /// Write the records array to `path`
    pub async fn write_log_file(
        &self,
        path: &Path,
        records: &[ValidationRecord],
    ) -> std::io::Result<()> {
        let json = self.format_records(records)?;
        tokio::fs::write(path, json).await
    }
}

/// Name, version and description of this tool as JSON
pub fn info_json() -> serde_json::Value {
    json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
    })
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{:.0}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}
