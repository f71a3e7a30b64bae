//! Output formatting for coverage reports and diffs.

use std::fmt::Write;

use crate::badge::badge;
use crate::diff::{format_signed_delta, CoverageDiff, FileDelta, FileStatus};
use crate::model::{format_timestamp, CoverageReport, FileCoverage};

/// Trait for rendering reports and diffs.
pub trait ReportFormatter {
    /// Format a single report to a string.
    fn format_report(&self, report: &CoverageReport) -> String;

    /// Format a diff between two reports to a string.
    fn format_diff(&self, diff: &CoverageDiff) -> String;
}

/// Files sorted worst-covered first.
fn files_by_coverage(report: &CoverageReport) -> Vec<&FileCoverage> {
    let mut files: Vec<&FileCoverage> = report.files().iter().collect();
    files.sort_by(|a, b| {
        a.line_pct()
            .total_cmp(&b.line_pct())
            .then_with(|| a.filename.cmp(&b.filename))
    });
    files
}

/// Entries of a diff that actually changed.
fn changed_files(diff: &CoverageDiff) -> impl Iterator<Item = &FileDelta> {
    diff.files
        .iter()
        .filter(|f| f.status != FileStatus::Unchanged)
}

fn status_label(status: FileStatus) -> &'static str {
    match status {
        FileStatus::Improved => "improved",
        FileStatus::Regressed => "regressed",
        FileStatus::Unchanged => "unchanged",
        FileStatus::Added => "new",
        FileStatus::Removed => "removed",
    }
}

fn pct_or_dash(pct: Option<f64>) -> String {
    match pct {
        Some(p) => format!("{p:.1}%"),
        None => "-".to_string(),
    }
}

/// Plain text formatter.
pub struct TextFormatter;

impl ReportFormatter for TextFormatter {
    fn format_report(&self, report: &CoverageReport) -> String {
        let mut out = String::new();
        let meta = report.metadata();

        writeln!(out, "Report:     {}", report.id()).unwrap();
        writeln!(out, "Source:     {}", report.source()).unwrap();
        writeln!(out, "Created:    {}", format_timestamp(&report.timestamp())).unwrap();
        for (label, value) in [
            ("Branch:", &meta.branch),
            ("Commit:", &meta.commit_sha),
            ("Tag:", &meta.tag),
        ] {
            if !value.is_empty() {
                writeln!(out, "{label:<11} {value}").unwrap();
            }
        }
        writeln!(out, "Files:      {}", report.files().len()).unwrap();
        writeln!(
            out,
            "Lines:      {}/{} ({:.1}%)",
            report.covered_lines(),
            report.total_lines(),
            report.overall_pct()
        )
        .unwrap();
        if report.total_branches() > 0 {
            writeln!(
                out,
                "Branches:   {}/{} ({:.1}%)",
                report.covered_branches(),
                report.total_branches(),
                report.branch_pct()
            )
            .unwrap();
        }

        if report.files().is_empty() {
            return out;
        }

        out.push('\n');
        writeln!(
            out,
            "{:<60} {:>8} {:>8} {:>8}",
            "FILE", "LINES", "COVERED", "RATE"
        )
        .unwrap();
        writeln!(out, "{}", "-".repeat(87)).unwrap();
        for f in files_by_coverage(report) {
            writeln!(
                out,
                "{:<60} {:>8} {:>8} {:>7.1}%",
                f.filename,
                f.total_lines,
                f.covered_lines,
                f.line_pct()
            )
            .unwrap();
        }

        out
    }

    fn format_diff(&self, diff: &CoverageDiff) -> String {
        let mut out = String::new();
        writeln!(out, "{}", diff.summary).unwrap();

        let changed: Vec<&FileDelta> = changed_files(diff).collect();
        if changed.is_empty() {
            return out;
        }

        out.push('\n');
        for f in changed {
            let status = status_label(f.status);
            let path = &f.filename;
            match f.line_delta() {
                Some(delta) => writeln!(
                    out,
                    "  {status:<10} {path}  {} -> {} ({}%)",
                    pct_or_dash(f.old_line_pct),
                    pct_or_dash(f.new_line_pct),
                    format_signed_delta(delta)
                )
                .unwrap(),
                None => {
                    let pct = pct_or_dash(f.new_line_pct.or(f.old_line_pct));
                    writeln!(out, "  {status:<10} {path}  {pct}").unwrap()
                }
            }
        }

        out
    }
}

/// Markdown formatter.
pub struct MarkdownFormatter;

impl ReportFormatter for MarkdownFormatter {
    fn format_report(&self, report: &CoverageReport) -> String {
        let mut md = String::new();
        let b = badge(report.overall_pct());

        writeln!(md, "### Coverage: {}\n", b.pct_str).unwrap();
        writeln!(md, "{}\n", b.markdown).unwrap();
        write!(
            md,
            "**{}** of **{}** lines covered",
            report.covered_lines(),
            report.total_lines()
        )
        .unwrap();
        let sha = &report.metadata().commit_sha;
        if !sha.is_empty() {
            let short_sha = sha
                .char_indices()
                .nth(7)
                .map_or(sha.as_str(), |(i, _)| &sha[..i]);
            write!(md, " ({short_sha})").unwrap();
        }
        md.push('\n');

        if !report.files().is_empty() {
            md.push_str("\n| File | Lines | Covered | Coverage |\n");
            md.push_str("|:-----|------:|--------:|---------:|\n");
            for f in files_by_coverage(report) {
                writeln!(
                    md,
                    "| `{}` | {} | {} | {:.1}% |",
                    f.filename,
                    f.total_lines,
                    f.covered_lines,
                    f.line_pct()
                )
                .unwrap();
            }
        }

        md.push_str("\n<sub>covtrend</sub>\n");
        md
    }

    fn format_diff(&self, diff: &CoverageDiff) -> String {
        let mut md = String::new();

        writeln!(
            md,
            "### Coverage: {:.1}% ({}%)\n",
            diff.new_pct,
            format_signed_delta(diff.pct_delta)
        )
        .unwrap();
        writeln!(md, "{}", diff.summary).unwrap();

        let changed: Vec<&FileDelta> = changed_files(diff).collect();
        if changed.is_empty() {
            md.push_str("\nNo per-file changes.\n");
        } else {
            md.push_str("\n| File | Status | Before | After | Delta |\n");
            md.push_str("|:-----|:-------|-------:|------:|------:|\n");
            for f in changed {
                let delta = f
                    .line_delta()
                    .map(|d| format!("{}%", format_signed_delta(d)))
                    .unwrap_or_else(|| "-".to_string());
                writeln!(
                    md,
                    "| `{}` | {} | {} | {} | {} |",
                    f.filename,
                    status_label(f.status),
                    pct_or_dash(f.old_line_pct),
                    pct_or_dash(f.new_line_pct),
                    delta
                )
                .unwrap();
            }
        }

        md.push_str("\n<sub>covtrend</sub>\n");
        md
    }
}

const HTML_STYLE: &str = "\
body{font-family:sans-serif;margin:2em;background:#f5f5f5}
.summary{background:#fff;padding:1.5em;border-radius:8px;box-shadow:0 2px 4px rgba(0,0,0,.1)}
.badge{display:inline-block;padding:.25em .6em;border-radius:4px;color:#fff;font-weight:bold;font-size:1.2em}
table{width:100%;border-collapse:collapse;margin-top:1em;background:#fff}
th,td{padding:.6em 1em;border:1px solid #ddd;text-align:left}
th{background:#333;color:#fff}
tr:nth-child(even){background:#f9f9f9}
.bar{height:14px;background:#eee;border-radius:3px}
.bar-fill{height:14px;border-radius:3px}
.delta-pos{color:green}.delta-neg{color:red}.delta-zero{color:gray}";

/// Standalone HTML page formatter.
pub struct HtmlFormatter;

impl HtmlFormatter {
    fn page(title: &str, body: &str) -> String {
        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"UTF-8\"><title>{title}</title>\n\
             <style>\n{HTML_STYLE}\n</style></head>\n<body>\n<h1>{title}</h1>\n{body}</body></html>\n"
        )
    }
}

impl ReportFormatter for HtmlFormatter {
    fn format_report(&self, report: &CoverageReport) -> String {
        let b = badge(report.overall_pct());
        let color = b.hex_color();
        let mut body = String::new();

        body.push_str("<div class=\"summary\">\n");
        writeln!(
            body,
            "<span class=\"badge\" style=\"background:{color}\">{}</span>\n&nbsp;&nbsp;<strong>Overall Coverage</strong>\n<br><br>",
            html_escape(&b.pct_str)
        )
        .unwrap();
        body.push_str("<table>\n<tr><th>File</th><th>Lines</th><th>Covered</th><th>Coverage</th><th>Bar</th></tr>\n");
        for f in files_by_coverage(report) {
            let pct = f.line_pct();
            writeln!(
                body,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{pct:.1}%</td>\
                 <td><div class=\"bar\"><div class=\"bar-fill\" style=\"width:{}%;background:{color}\"></div></div></td></tr>",
                html_escape(&f.filename),
                f.total_lines,
                f.covered_lines,
                pct as u32,
            )
            .unwrap();
        }
        body.push_str("</table>\n</div>\n");
        writeln!(
            body,
            "<p><em>Generated: {}</em></p>",
            format_timestamp(&report.timestamp())
        )
        .unwrap();

        Self::page("Coverage Report", &body)
    }

    fn format_diff(&self, diff: &CoverageDiff) -> String {
        let mut body = String::new();
        body.push_str("<div class=\"summary\">\n");
        writeln!(body, "<p>{}</p>", html_escape(&diff.summary)).unwrap();
        body.push_str("<table>\n<tr><th>File</th><th>Status</th><th>Before</th><th>After</th><th>Delta</th></tr>\n");
        for f in changed_files(diff) {
            let (class, delta) = match f.line_delta() {
                Some(d) if d > 0.0 => ("delta-pos", format!("{}%", format_signed_delta(d))),
                Some(d) if d < 0.0 => ("delta-neg", format!("{}%", format_signed_delta(d))),
                _ => ("delta-zero", "-".to_string()),
            };
            writeln!(
                body,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td class=\"{class}\">{delta}</td></tr>",
                html_escape(&f.filename),
                status_label(f.status),
                pct_or_dash(f.old_line_pct),
                pct_or_dash(f.new_line_pct),
            )
            .unwrap();
        }
        body.push_str("</table>\n</div>\n");

        Self::page("Coverage Diff", &body)
    }
}

fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
