use rusqlite::types::Type;
use rusqlite::{params, Connection, Row, Transaction};
use std::path::Path;

use crate::error::{CovtrendError, Result};
use crate::model::{
    format_timestamp, parse_timestamp, CoverageReport, FileCoverage, Format, HistoryStats,
    Metadata, ReportSummary, TrendPoint,
};

pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA: &str = include_str!("../schema.sql");

/// Open (or create) the covtrend database at the given path.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
    Ok(conn)
}

/// Ensure the schema is initialized. Safe to call on an already-initialized DB.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: u32 = conn.query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))?;
    if count == 0 {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;
        return Ok(());
    }

    let version: u32 = conn.query_row(
        "SELECT version FROM schema_version LIMIT 1",
        [],
        |row| row.get(0),
    )?;
    if version > SCHEMA_VERSION {
        return Err(CovtrendError::Other(format!(
            "Database schema version {} is newer than this binary supports ({}). \
             Please upgrade covtrend.",
            version, SCHEMA_VERSION
        )));
    }
    Ok(())
}

/// Persist a report and its files in one transaction.
pub fn insert_report(conn: &mut Connection, report: &CoverageReport) -> Result<()> {
    let tx = conn.transaction()?;
    insert_report_tx(&tx, report)?;
    tx.commit()?;
    Ok(())
}

fn insert_report_tx(tx: &Transaction, report: &CoverageReport) -> Result<()> {
    let meta = report.metadata();
    tx.execute(
        "INSERT INTO coverage_history (id, timestamp, source, overall_pct, total_lines, covered_lines, \
         total_branches, covered_branches, commit_sha, branch, tag) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            report.id(),
            format_timestamp(&report.timestamp()),
            report.source().as_str(),
            report.overall_pct(),
            report.total_lines(),
            report.covered_lines(),
            report.total_branches(),
            report.covered_branches(),
            meta.commit_sha,
            meta.branch,
            meta.tag,
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(ref err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            CovtrendError::Other(format!("Report '{}' already exists.", report.id()))
        }
        other => CovtrendError::Sqlite(other),
    })?;

    let mut stmt = tx.prepare_cached(
        "INSERT INTO file_coverage (report_id, position, filename, total_lines, covered_lines, \
         total_branches, covered_branches) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for (position, file) in report.files().iter().enumerate() {
        stmt.execute(params![
            report.id(),
            position as i64,
            file.filename,
            file.total_lines,
            file.covered_lines,
            file.total_branches,
            file.covered_branches,
        ])?;
    }

    Ok(())
}

/// Load a full report by id.
pub fn get_report(conn: &Connection, id: &str) -> Result<CoverageReport> {
    let header = conn.query_row(
        "SELECT timestamp, source, commit_sha, branch, tag FROM coverage_history WHERE id = ?1",
        params![id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                Metadata {
                    commit_sha: row.get(2)?,
                    branch: row.get(3)?,
                    tag: row.get(4)?,
                },
            ))
        },
    );
    let (timestamp, source, metadata) = match header {
        Ok(h) => h,
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            return Err(CovtrendError::ReportNotFound(id.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let mut stmt = conn.prepare(
        "SELECT filename, total_lines, covered_lines, total_branches, covered_branches \
         FROM file_coverage WHERE report_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map(params![id], |row| {
        Ok(FileCoverage {
            filename: row.get(0)?,
            total_lines: row.get(1)?,
            covered_lines: row.get(2)?,
            total_branches: row.get(3)?,
            covered_branches: row.get(4)?,
        })
    })?;

    let mut files = Vec::new();
    for row in rows {
        files.push(row?);
    }

    Ok(CoverageReport::from_parts(
        id.to_string(),
        parse_timestamp(&timestamp)?,
        source.parse::<Format>()?,
        metadata,
        files,
    ))
}

/// List report summaries, newest first, optionally restricted to one branch.
pub fn list_reports(
    conn: &Connection,
    branch: Option<&str>,
    limit: usize,
) -> Result<Vec<ReportSummary>> {
    let mut stmt = conn.prepare(
        "SELECT h.id, h.timestamp, h.source, h.commit_sha, h.branch, h.tag,
                (SELECT COUNT(*) FROM file_coverage f WHERE f.report_id = h.id),
                h.total_lines, h.covered_lines, h.total_branches, h.covered_branches
         FROM coverage_history h
         WHERE (?1 IS NULL OR h.branch = ?1)
         ORDER BY h.timestamp DESC, h.rowid DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![branch, limit as i64], row_to_summary)?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row?);
    }
    Ok(result)
}

fn row_to_summary(row: &Row) -> rusqlite::Result<ReportSummary> {
    let timestamp: String = row.get(1)?;
    let source: String = row.get(2)?;
    Ok(ReportSummary {
        id: row.get(0)?,
        timestamp: parse_timestamp(&timestamp).map_err(|e| conversion_error(1, e))?,
        source: source.parse::<Format>().map_err(|e| conversion_error(2, e))?,
        metadata: Metadata {
            commit_sha: row.get(3)?,
            branch: row.get(4)?,
            tag: row.get(5)?,
        },
        total_files: row.get(6)?,
        total_lines: row.get(7)?,
        covered_lines: row.get(8)?,
        total_branches: row.get(9)?,
        covered_branches: row.get(10)?,
    })
}

fn conversion_error(column: usize, e: CovtrendError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e))
}

/// Ids of the `n` most recent reports, newest first.
pub fn latest_report_ids(conn: &Connection, branch: Option<&str>, n: usize) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM coverage_history
         WHERE (?1 IS NULL OR branch = ?1)
         ORDER BY timestamp DESC, rowid DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![branch, n as i64], |row| row.get::<_, String>(0))?;
    let mut result = Vec::new();
    for row in rows {
        result.push(row?);
    }
    Ok(result)
}

/// The most recent `limit` coverage percentages, oldest first.
pub fn get_trend(conn: &Connection, branch: Option<&str>, limit: usize) -> Result<Vec<TrendPoint>> {
    let mut stmt = conn.prepare(
        "SELECT id, timestamp, overall_pct, branch FROM coverage_history
         WHERE (?1 IS NULL OR branch = ?1)
         ORDER BY timestamp DESC, rowid DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![branch, limit as i64], |row| {
        let timestamp: String = row.get(1)?;
        Ok(TrendPoint {
            id: row.get(0)?,
            timestamp: parse_timestamp(&timestamp).map_err(|e| conversion_error(1, e))?,
            pct: row.get(2)?,
            branch: row.get(3)?,
        })
    })?;

    let mut points = Vec::new();
    for row in rows {
        points.push(row?);
    }
    points.reverse();
    Ok(points)
}

/// Aggregate statistics over every stored report.
pub fn get_stats(conn: &Connection) -> Result<HistoryStats> {
    let (total_reports, average): (u64, Option<f64>) = conn.query_row(
        "SELECT COUNT(*), AVG(overall_pct) FROM coverage_history",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let latest = conn.query_row(
        "SELECT overall_pct, timestamp FROM coverage_history
         ORDER BY timestamp DESC, rowid DESC LIMIT 1",
        [],
        |row| Ok((row.get::<_, f64>(0)?, row.get::<_, String>(1)?)),
    );
    let (latest_pct, latest_timestamp) = match latest {
        Ok((pct, ts)) => (Some(pct), Some(parse_timestamp(&ts)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => (None, None),
        Err(e) => return Err(e.into()),
    };

    Ok(HistoryStats {
        total_reports,
        latest_pct,
        latest_timestamp,
        average_pct: average.map(|avg| (avg * 100.0).round() / 100.0),
    })
}

/// Delete a report. File rows are removed via ON DELETE CASCADE.
pub fn delete_report(conn: &mut Connection, id: &str) -> Result<()> {
    let tx = conn.transaction()?;
    let deleted = tx.execute("DELETE FROM coverage_history WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(CovtrendError::ReportNotFound(id.to_string()));
    }
    tx.commit()?;
    Ok(())
}
