//! Uniform in-memory representation of coverage data, independent of any
//! specific format. Parsers produce a `CoverageReport` which is then diffed,
//! rendered, or inserted into the SQLite history store.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{CovtrendError, Result};

/// Prefix of every generated report id.
pub const ID_PREFIX: &str = "cov-";

/// Number of hex digits of the content hash kept in a report id.
const ID_HEX_LEN: usize = 12;

/// Compute a coverage percentage in `[0, 100]`, returning 0.0 when the total
/// is zero.
#[must_use]
pub fn pct(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered.min(total) as f64 * 100.0 / total as f64
    }
}

/// Supported coverage formats. Also recorded as the `source` of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Lcov,
    Cobertura,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Lcov => "lcov",
            Format::Cobertura => "cobertura",
        }
    }
}

impl FromStr for Format {
    type Err = CovtrendError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lcov" => Ok(Format::Lcov),
            "cobertura" => Ok(Format::Cobertura),
            _ => Err(CovtrendError::Parse(format!(
                "Unknown format: '{}'. Supported: cobertura, lcov",
                s
            ))),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional VCS metadata attached to a report. Empty strings mean "unset".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub branch: String,
    pub commit_sha: String,
    pub tag: String,
}

/// Line and branch counters for a single source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileCoverage {
    pub filename: String,
    pub total_lines: u64,
    pub covered_lines: u64,
    pub total_branches: u64,
    pub covered_branches: u64,
}

impl FileCoverage {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn line_pct(&self) -> f64 {
        pct(self.covered_lines, self.total_lines)
    }

    #[must_use]
    pub fn branch_pct(&self) -> f64 {
        pct(self.covered_branches, self.total_branches)
    }

    /// Add another file's counters into this one.
    pub fn merge(&mut self, other: &FileCoverage) {
        self.total_lines = self.total_lines.saturating_add(other.total_lines);
        self.covered_lines = self.covered_lines.saturating_add(other.covered_lines);
        self.total_branches = self.total_branches.saturating_add(other.total_branches);
        self.covered_branches = self.covered_branches.saturating_add(other.covered_branches);
    }

    fn clamp(&mut self) {
        self.covered_lines = self.covered_lines.min(self.total_lines);
        self.covered_branches = self.covered_branches.min(self.total_branches);
    }
}

/// A complete, immutable coverage report.
///
/// Aggregate counters are always summed from `files` on access; nothing is
/// stored next to the files that could drift out of sync with them.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageReport {
    id: String,
    timestamp: DateTime<Utc>,
    source: Format,
    metadata: Metadata,
    files: Vec<FileCoverage>,
}

impl CoverageReport {
    /// Build a freshly parsed report. Files sharing a filename are merged by
    /// summing their counters, and the id is derived from the content and
    /// `timestamp`.
    pub fn new(source: Format, files: Vec<FileCoverage>, timestamp: DateTime<Utc>) -> Self {
        let files = normalize_files(files);
        let id = report_id(source, &timestamp, &files);
        Self {
            id,
            timestamp,
            source,
            metadata: Metadata::default(),
            files,
        }
    }

    /// Rebuild a report that was previously persisted under `id`.
    pub fn from_parts(
        id: String,
        timestamp: DateTime<Utc>,
        source: Format,
        metadata: Metadata,
        files: Vec<FileCoverage>,
    ) -> Self {
        Self {
            id,
            timestamp,
            source,
            metadata,
            files: normalize_files(files),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn source(&self) -> Format {
        self.source
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Files in the order they were first seen in the input.
    pub fn files(&self) -> &[FileCoverage] {
        &self.files
    }

    pub fn file(&self, filename: &str) -> Option<&FileCoverage> {
        self.files.iter().find(|f| f.filename == filename)
    }

    pub fn total_lines(&self) -> u64 {
        sum_saturating(self.files.iter().map(|f| f.total_lines))
    }

    pub fn covered_lines(&self) -> u64 {
        sum_saturating(self.files.iter().map(|f| f.covered_lines))
    }

    pub fn total_branches(&self) -> u64 {
        sum_saturating(self.files.iter().map(|f| f.total_branches))
    }

    pub fn covered_branches(&self) -> u64 {
        sum_saturating(self.files.iter().map(|f| f.covered_branches))
    }

    /// Overall line coverage percentage.
    #[must_use]
    pub fn overall_pct(&self) -> f64 {
        pct(self.covered_lines(), self.total_lines())
    }

    #[must_use]
    pub fn branch_pct(&self) -> f64 {
        pct(self.covered_branches(), self.total_branches())
    }
}

fn sum_saturating(values: impl Iterator<Item = u64>) -> u64 {
    values.fold(0, u64::saturating_add)
}

fn normalize_files(files: Vec<FileCoverage>) -> Vec<FileCoverage> {
    let mut merged: Vec<FileCoverage> = Vec::with_capacity(files.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    for file in files {
        match index.get(&file.filename) {
            Some(&idx) => merged[idx].merge(&file),
            None => {
                index.insert(file.filename.clone(), merged.len());
                merged.push(file);
            }
        }
    }
    for file in &mut merged {
        file.clamp();
    }
    merged
}

/// Derive a report id from the canonical serialization of its content:
/// source, timestamp, then every file's counters in filename order.
pub fn report_id(source: Format, timestamp: &DateTime<Utc>, files: &[FileCoverage]) -> String {
    let mut sorted: Vec<&FileCoverage> = files.iter().collect();
    sorted.sort_by(|a, b| a.filename.cmp(&b.filename));

    let mut hasher = Sha256::new();
    hasher.update(source.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(format_timestamp(timestamp).as_bytes());
    for file in sorted {
        hasher.update([0u8]);
        hasher.update(file.filename.as_bytes());
        hasher.update([0u8]);
        for count in [
            file.total_lines,
            file.covered_lines,
            file.total_branches,
            file.covered_branches,
        ] {
            hasher.update(count.to_le_bytes());
        }
    }

    let digest = hex::encode(hasher.finalize());
    format!("{}{}", ID_PREFIX, &digest[..ID_HEX_LEN])
}

/// RFC 3339 with nanoseconds, so stored timestamps round-trip exactly and
/// sort lexicographically.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CovtrendError::Parse(format!("Invalid timestamp '{}': {}", s, e)))
}

/// One row of the report history listing.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source: Format,
    #[serde(flatten)]
    pub metadata: Metadata,
    pub total_files: u64,
    pub total_lines: u64,
    pub covered_lines: u64,
    pub total_branches: u64,
    pub covered_branches: u64,
}

impl ReportSummary {
    #[must_use]
    pub fn overall_pct(&self) -> f64 {
        pct(self.covered_lines, self.total_lines)
    }

    #[must_use]
    pub fn branch_pct(&self) -> f64 {
        pct(self.covered_branches, self.total_branches)
    }
}

/// A single point of a coverage trend line.
#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub pct: f64,
    pub branch: String,
}

/// Aggregate statistics over the whole history.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryStats {
    pub total_reports: u64,
    pub latest_pct: Option<f64>,
    pub latest_timestamp: Option<DateTime<Utc>>,
    pub average_pct: Option<f64>,
}
