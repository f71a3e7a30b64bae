#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // LCOV parser must not panic on any input, and never report more
    // covered than total.
    if let Ok(files) = covtrend::parsers::lcov::parse(data) {
        for f in &files {
            assert!(f.covered_lines <= f.total_lines);
            assert!(f.covered_branches <= f.total_branches);
        }
    }
});
