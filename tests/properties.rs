use std::collections::BTreeSet;
use std::fmt::Write;

use chrono::{TimeZone, Utc};
use covtrend::badge::badge;
use covtrend::diff::{diff, FileStatus};
use covtrend::model::{CoverageReport, FileCoverage, Format};
use covtrend::parsers::lcov;
use proptest::prelude::*;

fn counters() -> impl Strategy<Value = FileCoverage> {
    ("[a-z]{1,6}", 0u64..50, 0u64..60, 0u64..20, 0u64..30).prop_map(
        |(name, total, covered, btotal, bcovered)| FileCoverage {
            filename: format!("src/{name}.rs"),
            total_lines: total,
            covered_lines: covered,
            total_branches: btotal,
            covered_branches: bcovered,
        },
    )
}

fn report(files: Vec<FileCoverage>, secs: i64) -> CoverageReport {
    let ts = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
    CoverageReport::new(Format::Lcov, files, ts)
}

proptest! {
    #[test]
    fn prop_lcov_one_file_per_record(hits in prop::collection::vec(prop::collection::vec(0u64..5, 0..8), 0..20)) {
        let mut input = String::new();
        for (i, lines) in hits.iter().enumerate() {
            writeln!(input, "SF:/src/file{i}.rs").unwrap();
            for (n, h) in lines.iter().enumerate() {
                writeln!(input, "DA:{},{}", n + 1, h).unwrap();
            }
            input.push_str("end_of_record\n");
        }

        let files = lcov::parse(input.as_bytes()).unwrap();
        prop_assert_eq!(files.len(), hits.len());
        for (file, lines) in files.iter().zip(&hits) {
            prop_assert_eq!(file.total_lines, lines.len() as u64);
            prop_assert_eq!(file.covered_lines, lines.iter().filter(|&&h| h > 0).count() as u64);
        }
    }

    #[test]
    fn prop_duplicate_da_counts_once(numbers in prop::collection::vec(1u32..40, 1..30), repeat in 1usize..4) {
        let mut input = String::from("SF:/src/dup.rs\n");
        for _ in 0..repeat {
            for n in &numbers {
                writeln!(input, "DA:{n},1").unwrap();
            }
        }
        input.push_str("end_of_record\n");

        let files = lcov::parse(input.as_bytes()).unwrap();
        let distinct: BTreeSet<u32> = numbers.iter().copied().collect();
        prop_assert_eq!(files[0].total_lines, distinct.len() as u64);
    }

    #[test]
    fn prop_percentages_are_bounded(files in prop::collection::vec(counters(), 0..10)) {
        let r = report(files, 0);
        for f in r.files() {
            prop_assert!(f.covered_lines <= f.total_lines);
            prop_assert!(f.covered_branches <= f.total_branches);
            prop_assert!((0.0..=100.0).contains(&f.line_pct()));
        }
        prop_assert!((0.0..=100.0).contains(&r.overall_pct()));
        prop_assert!((0.0..=100.0).contains(&r.branch_pct()));
    }

    #[test]
    fn prop_diff_with_itself_is_empty(files in prop::collection::vec(counters(), 0..10)) {
        let r = report(files, 0);
        let d = diff(&r, &r);
        prop_assert_eq!(d.pct_delta, 0.0);
        prop_assert!(d.improved.is_empty());
        prop_assert!(d.regressed.is_empty());
        prop_assert!(d.added.is_empty());
        prop_assert!(d.removed.is_empty());
        prop_assert!(d.files.iter().all(|f| f.status == FileStatus::Unchanged));
        prop_assert!(d.summary.contains("(+0.00%)"));
    }

    #[test]
    fn prop_diff_partitions_filenames(
        old in prop::collection::vec(counters(), 0..10),
        new in prop::collection::vec(counters(), 0..10),
    ) {
        let old = report(old, 0);
        let new = report(new, 1);
        let d = diff(&old, &new);

        let all: BTreeSet<String> = old
            .files()
            .iter()
            .chain(new.files())
            .map(|f| f.filename.clone())
            .collect();
        let unchanged: BTreeSet<String> = d
            .files
            .iter()
            .filter(|f| f.status == FileStatus::Unchanged)
            .map(|f| f.filename.clone())
            .collect();

        let buckets = [&d.improved, &d.regressed, &d.added, &d.removed, &unchanged];
        let total: usize = buckets.iter().map(|b| b.len()).sum();
        prop_assert_eq!(total, all.len());
        let union: BTreeSet<String> = buckets.iter().flat_map(|b| b.iter().cloned()).collect();
        prop_assert_eq!(union, all);

        for name in &d.added {
            prop_assert!(old.file(name).is_none() && new.file(name).is_some());
        }
        for name in &d.removed {
            prop_assert!(old.file(name).is_some() && new.file(name).is_none());
        }
    }

    #[test]
    fn prop_badge_color_is_monotonic(a in 0.0f64..=100.0, b in 0.0f64..=100.0) {
        let rank = |color: &str| ["red", "yellow", "yellowgreen", "green", "brightgreen"]
            .iter()
            .position(|c| *c == color)
            .unwrap();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(rank(badge(lo).color) <= rank(badge(hi).color));
    }
}
