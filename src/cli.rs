//! Command handler functions for the covtrend CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::fmt::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use rusqlite::Connection;

use crate::badge::badge;
use crate::diff::diff;
use crate::model::{format_timestamp, Metadata};
use crate::report::{HtmlFormatter, MarkdownFormatter, ReportFormatter, TextFormatter};
use crate::{db, ingest};

/// Output style for the `show` and `diff` commands.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum Style {
    #[default]
    Text,
    Markdown,
    Html,
}

impl Style {
    fn formatter(self) -> Box<dyn ReportFormatter> {
        match self {
            Style::Text => Box::new(TextFormatter),
            Style::Markdown => Box::new(MarkdownFormatter),
            Style::Html => Box::new(HtmlFormatter),
        }
    }
}

/// Resolve an optional report id, falling back to the most recent report.
pub fn resolve_report_id(conn: &Connection, id: Option<&str>) -> Result<String> {
    match id {
        Some(id) => Ok(id.to_string()),
        None => db::latest_report_ids(conn, None, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No reports found in database")),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    let mut out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    out.push('\n');
    Ok(out)
}

pub fn cmd_ingest(
    conn: &mut Connection,
    file: &Path,
    format: Option<&str>,
    metadata: Metadata,
) -> Result<String> {
    let report = ingest::ingest(conn, file, format, metadata)
        .with_context(|| format!("Failed to ingest {}", file.display()))?;
    Ok(format!(
        "Ingested {} as format '{}' → report {} ({:.1}% of {} lines, {} files)\n",
        file.display(),
        report.source(),
        report.id(),
        report.overall_pct(),
        report.total_lines(),
        report.files().len(),
    ))
}

pub fn cmd_show(conn: &Connection, id: Option<&str>, style: Style) -> Result<String> {
    let id = resolve_report_id(conn, id)?;
    let report = db::get_report(conn, &id)?;
    Ok(style.formatter().format_report(&report))
}

pub fn cmd_reports(conn: &Connection, branch: Option<&str>, limit: usize) -> Result<String> {
    let reports = db::list_reports(conn, branch, limit)?;
    if reports.is_empty() {
        return Ok("No reports in database.\n".to_string());
    }
    let mut out = String::new();
    writeln!(
        out,
        "{:<17} {:<10} {:<20} {:>6} {:>8}  CREATED",
        "ID", "FORMAT", "BRANCH", "FILES", "COVERAGE"
    )
    .unwrap();
    writeln!(out, "{}", "-".repeat(96)).unwrap();
    for r in &reports {
        writeln!(
            out,
            "{:<17} {:<10} {:<20} {:>6} {:>7.1}%  {}",
            r.id,
            r.source,
            r.metadata.branch,
            r.total_files,
            r.overall_pct(),
            format_timestamp(&r.timestamp),
        )
        .unwrap();
    }
    Ok(out)
}

/// Compare two reports. Without ids, the two most recent reports (optionally
/// restricted to `branch`) are compared; with only `old`, it is compared
/// against the most recent one.
pub fn cmd_diff(
    conn: &Connection,
    old: Option<&str>,
    new: Option<&str>,
    branch: Option<&str>,
    style: Style,
    json: bool,
) -> Result<String> {
    let (old_id, new_id) = match (old, new) {
        (Some(old), Some(new)) => (old.to_string(), new.to_string()),
        (Some(old), None) => {
            let latest = db::latest_report_ids(conn, branch, 1)?
                .into_iter()
                .next()
                .ok_or_else(|| anyhow::anyhow!("No reports found in database"))?;
            (old.to_string(), latest)
        }
        (None, Some(new)) => {
            bail!("Report '{}' given as the newer report without an older one", new)
        }
        (None, None) => {
            let ids = db::latest_report_ids(conn, branch, 2)?;
            if ids.len() < 2 {
                bail!("Need at least two reports to diff (found {})", ids.len());
            }
            (ids[1].clone(), ids[0].clone())
        }
    };

    let old_report = db::get_report(conn, &old_id)?;
    let new_report = db::get_report(conn, &new_id)?;
    let result = diff(&old_report, &new_report);

    if json {
        to_json(&result)
    } else {
        Ok(style.formatter().format_diff(&result))
    }
}

pub fn cmd_html(conn: &Connection, id: Option<&str>) -> Result<String> {
    cmd_show(conn, id, Style::Html)
}

pub fn cmd_trend(
    conn: &Connection,
    branch: Option<&str>,
    limit: usize,
    json: bool,
) -> Result<String> {
    let points = db::get_trend(conn, branch, limit)?;
    if json {
        return to_json(&points);
    }
    if points.is_empty() {
        return Ok("No reports in database.\n".to_string());
    }

    let mut out = String::new();
    writeln!(out, "{:<32} {:>8}  {:<20} ID", "TIMESTAMP", "COVERAGE", "TREND").unwrap();
    for p in &points {
        let bar = "#".repeat((p.pct / 5.0).round().clamp(0.0, 20.0) as usize);
        writeln!(
            out,
            "{:<32} {:>7.1}%  {:<20} {}",
            format_timestamp(&p.timestamp),
            p.pct,
            bar,
            p.id
        )
        .unwrap();
    }
    Ok(out)
}

/// Badge for an explicit percentage, or for a stored report (the latest one
/// when neither is given).
pub fn cmd_badge(
    conn: &Connection,
    pct: Option<f64>,
    report: Option<&str>,
    json: bool,
) -> Result<String> {
    let pct = match pct {
        Some(p) => p,
        None => {
            let id = resolve_report_id(conn, report)?;
            db::get_report(conn, &id)?.overall_pct()
        }
    };
    let b = badge(pct);
    if json {
        to_json(&b)
    } else {
        Ok(format!("{}\n", b.markdown))
    }
}

pub fn cmd_stats(conn: &Connection, json: bool) -> Result<String> {
    let stats = db::get_stats(conn)?;
    if json {
        return to_json(&stats);
    }

    let mut out = String::new();
    writeln!(out, "Reports:    {}", stats.total_reports).unwrap();
    match (stats.latest_pct, stats.latest_timestamp) {
        (Some(pct), Some(ts)) => {
            writeln!(out, "Latest:     {:.1}% ({})", pct, format_timestamp(&ts)).unwrap()
        }
        _ => writeln!(out, "Latest:     -").unwrap(),
    }
    match stats.average_pct {
        Some(avg) => writeln!(out, "Average:    {:.2}%", avg).unwrap(),
        None => writeln!(out, "Average:    -").unwrap(),
    }
    Ok(out)
}

pub fn cmd_delete(conn: &mut Connection, id: &str) -> Result<String> {
    db::delete_report(conn, id)?;
    Ok(format!("Deleted report '{}'.\n", id))
}
