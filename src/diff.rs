//! Compare two coverage reports.
//!
//! Files are joined by exact filename. Files present on both sides are
//! classified by their line coverage percentage; files present on one side
//! only are reported as added or removed. Neither input is modified.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::model::{CoverageReport, FileCoverage};

/// Percentage differences at or below this are treated as "unchanged".
pub const EPSILON: f64 = 1e-9;

/// How a single file changed between two reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Improved,
    Regressed,
    Unchanged,
    Added,
    Removed,
}

/// Per-file line and branch percentages on both sides of a diff. A side is
/// `None` when the file does not exist in that report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileDelta {
    pub filename: String,
    pub status: FileStatus,
    pub old_line_pct: Option<f64>,
    pub new_line_pct: Option<f64>,
    pub old_branch_pct: Option<f64>,
    pub new_branch_pct: Option<f64>,
}

impl FileDelta {
    fn new(
        filename: &str,
        status: FileStatus,
        old: Option<&FileCoverage>,
        new: Option<&FileCoverage>,
    ) -> Self {
        Self {
            filename: filename.to_string(),
            status,
            old_line_pct: old.map(FileCoverage::line_pct),
            new_line_pct: new.map(FileCoverage::line_pct),
            old_branch_pct: old.map(FileCoverage::branch_pct),
            new_branch_pct: new.map(FileCoverage::branch_pct),
        }
    }

    /// Change in line coverage, for files present in both reports.
    #[must_use]
    pub fn line_delta(&self) -> Option<f64> {
        Some(self.new_line_pct? - self.old_line_pct?)
    }

    /// Change in branch coverage, for files present in both reports.
    #[must_use]
    pub fn branch_delta(&self) -> Option<f64> {
        Some(self.new_branch_pct? - self.old_branch_pct?)
    }
}

/// The result of comparing an old report against a new one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageDiff {
    pub old_id: String,
    pub new_id: String,
    pub old_pct: f64,
    pub new_pct: f64,
    /// `new_pct - old_pct`, unrounded.
    pub pct_delta: f64,
    pub improved: BTreeSet<String>,
    pub regressed: BTreeSet<String>,
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    /// One entry per filename in either report, sorted by filename.
    pub files: Vec<FileDelta>,
    pub summary: String,
}

impl CoverageDiff {
    /// True when the overall percentage dropped or any file regressed.
    #[must_use]
    pub fn has_regressions(&self) -> bool {
        self.pct_delta < -EPSILON || !self.regressed.is_empty()
    }
}

/// Compute the difference between two reports.
pub fn diff(old: &CoverageReport, new: &CoverageReport) -> CoverageDiff {
    let old_files: BTreeMap<&str, &FileCoverage> = old
        .files()
        .iter()
        .map(|f| (f.filename.as_str(), f))
        .collect();
    let new_files: BTreeMap<&str, &FileCoverage> = new
        .files()
        .iter()
        .map(|f| (f.filename.as_str(), f))
        .collect();
    let filenames: BTreeSet<&str> = old_files.keys().chain(new_files.keys()).copied().collect();

    let mut improved = BTreeSet::new();
    let mut regressed = BTreeSet::new();
    let mut added = BTreeSet::new();
    let mut removed = BTreeSet::new();
    let mut files = Vec::with_capacity(filenames.len());

    for name in filenames {
        let old_file = old_files.get(name).copied();
        let new_file = new_files.get(name).copied();
        let status = match (old_file, new_file) {
            (Some(o), Some(n)) => classify(o.line_pct(), n.line_pct()),
            (None, Some(_)) => FileStatus::Added,
            (Some(_), None) => FileStatus::Removed,
            (None, None) => continue,
        };
        let bucket = match status {
            FileStatus::Improved => Some(&mut improved),
            FileStatus::Regressed => Some(&mut regressed),
            FileStatus::Added => Some(&mut added),
            FileStatus::Removed => Some(&mut removed),
            FileStatus::Unchanged => None,
        };
        if let Some(set) = bucket {
            set.insert(name.to_string());
        }
        files.push(FileDelta::new(name, status, old_file, new_file));
    }

    let old_pct = old.overall_pct();
    let new_pct = new.overall_pct();
    let pct_delta = new_pct - old_pct;
    let summary = format!(
        "Coverage changed from {:.1}% to {:.1}% ({}%). {} files improved, {} regressed, {} new, {} removed.",
        old_pct,
        new_pct,
        format_signed_delta(pct_delta),
        improved.len(),
        regressed.len(),
        added.len(),
        removed.len(),
    );

    CoverageDiff {
        old_id: old.id().to_string(),
        new_id: new.id().to_string(),
        old_pct,
        new_pct,
        pct_delta,
        improved,
        regressed,
        added,
        removed,
        files,
        summary,
    }
}

fn classify(old_pct: f64, new_pct: f64) -> FileStatus {
    if new_pct - old_pct > EPSILON {
        FileStatus::Improved
    } else if old_pct - new_pct > EPSILON {
        FileStatus::Regressed
    } else {
        FileStatus::Unchanged
    }
}

/// Render a percentage delta rounded to two places with an explicit sign:
/// `+1.25`, `+0.00`, `-3.10`.
#[must_use]
pub fn format_signed_delta(delta: f64) -> String {
    let rounded = (delta * 100.0).round() / 100.0;
    if rounded < 0.0 {
        format!("{:.2}", rounded)
    } else {
        // abs() folds a rounded -0.0 into +0.00
        format!("+{:.2}", rounded.abs())
    }
}
