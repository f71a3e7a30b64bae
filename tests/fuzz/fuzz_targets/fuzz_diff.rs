#![no_main]
use chrono::{TimeZone, Utc};
use covtrend::model::{CoverageReport, Format};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Split the input in two LCOV documents and diff them. Diffing must not
    // panic and must account for every filename exactly once.
    let mid = data.len() / 2;
    let (Ok(old), Ok(new)) = (
        covtrend::parsers::lcov::parse(&data[..mid]),
        covtrend::parsers::lcov::parse(&data[mid..]),
    ) else {
        return;
    };
    let ts = Utc.timestamp_opt(0, 0).unwrap();
    let old = CoverageReport::new(Format::Lcov, old, ts);
    let new = CoverageReport::new(Format::Lcov, new, ts);

    let d = covtrend::diff::diff(&old, &new);
    let mut names: Vec<&str> = old
        .files()
        .iter()
        .chain(new.files())
        .map(|f| f.filename.as_str())
        .collect();
    names.sort_unstable();
    names.dedup();
    assert_eq!(d.files.len(), names.len());
});
