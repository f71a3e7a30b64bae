use std::path::Path;

use rusqlite::Connection;
use tracing::{info, warn};

use crate::db;
use crate::detect::{detect_format, Format};
use crate::error::{CovtrendError, Result};
use crate::model::{CoverageReport, Metadata};
use crate::parsers::parser_for;

/// Read a coverage file, auto-detect its format (or use the override),
/// parse it, and insert the report into the database.
pub fn ingest(
    conn: &mut Connection,
    file_path: &Path,
    format_override: Option<&str>,
    metadata: Metadata,
) -> Result<CoverageReport> {
    let report = parse_file(file_path, format_override)?.with_metadata(metadata);

    if report.files().is_empty() {
        warn!(
            "{} contains no coverage records; storing an empty report",
            file_path.display()
        );
    }

    db::insert_report(conn, &report)?;
    info!(
        id = report.id(),
        source = %report.source(),
        files = report.files().len(),
        "ingested {}",
        file_path.display()
    );
    Ok(report)
}

/// Read and parse a coverage file without storing it.
pub fn parse_file(file_path: &Path, format_override: Option<&str>) -> Result<CoverageReport> {
    let content = std::fs::read(file_path)?;

    let format = match format_override {
        Some(fmt_str) => fmt_str.parse::<Format>()?,
        None => detect_format(file_path, &content).ok_or(CovtrendError::UnknownFormat)?,
    };

    parser_for(format).parse(&content)
}
