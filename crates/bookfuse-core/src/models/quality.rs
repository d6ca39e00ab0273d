use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::source::SourceManifest;

/// Aggregate data-quality metrics for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub input_record_count: usize,
    /// Landing rows skipped by the readers, summed over sources.
    #[serde(default)]
    pub rejected_row_count: usize,
    pub record_count: usize,
    pub duplicate_count: usize,
    pub pct_valid_isbn13: f64,
    pub pct_title: f64,
    pub pct_publication_date: f64,
    pub pct_language: f64,
    pub pct_price_currency: f64,
    /// Percentage of canonical records where each field is absent.
    pub null_rate: BTreeMap<String, f64>,
    pub rows_per_source: BTreeMap<String, usize>,
    #[serde(default)]
    pub checks: Vec<QualityCheck>,
    #[serde(default)]
    pub sources: Vec<SourceManifest>,
}

impl QualityReport {
    pub fn failed_blocking_checks(&self) -> impl Iterator<Item = &QualityCheck> {
        self.checks.iter().filter(|check| check.blocking && !check.passed)
    }
}

/// One named assertion evaluated over the run output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityCheck {
    pub name: String,
    pub passed: bool,
    /// A failing blocking check invalidates the run.
    pub blocking: bool,
    pub detail: String,
}

impl QualityCheck {
    pub fn new(name: impl Into<String>, passed: bool, blocking: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            blocking,
            detail: detail.into(),
        }
    }
}
