mod common;

use covtrend::model::{Format, Metadata};

/// Test the full `ingest::ingest()` pipeline: read file from disk, auto-detect format, insert.
#[test]
fn ingest_lcov_file_auto_detect() {
    let (mut conn, dir, _) = common::setup_db();

    let lcov_path = common::write_file(
        dir.path(),
        "coverage.lcov",
        b"SF:/src/lib.rs\nDA:1,3\nDA:2,0\nend_of_record\n",
    );

    let report =
        covtrend::ingest::ingest(&mut conn, &lcov_path, None, Metadata::default()).unwrap();

    assert_eq!(report.source(), Format::Lcov);
    assert!(report.id().starts_with("cov-"));

    let stored = covtrend::db::get_report(&conn, report.id()).unwrap();
    assert_eq!(stored.total_lines(), 2);
    assert_eq!(stored.covered_lines(), 1);
}

#[test]
fn ingest_cobertura_file_auto_detect() {
    let (mut conn, dir, _) = common::setup_db();

    let xml_path = common::write_file(
        dir.path(),
        "coverage.xml",
        include_bytes!("fixtures/sample_cobertura.xml"),
    );

    let report =
        covtrend::ingest::ingest(&mut conn, &xml_path, None, Metadata::default()).unwrap();

    assert_eq!(report.source(), Format::Cobertura);
    assert_eq!(report.files().len(), 2);
    assert_eq!(report.total_lines(), 10);
}

#[test]
fn ingest_content_sniffing_without_extension() {
    let (mut conn, dir, _) = common::setup_db();

    let path = common::write_file(
        dir.path(),
        "coverage.out",
        b"TN:\nSF:/src/a.rs\nDA:1,1\nend_of_record\n",
    );

    let report = covtrend::ingest::ingest(&mut conn, &path, None, Metadata::default()).unwrap();
    assert_eq!(report.source(), Format::Lcov);
}

#[test]
fn ingest_with_format_override() {
    let (mut conn, dir, _) = common::setup_db();

    // A .txt extension that would not be detected by name.
    let path = common::write_file(dir.path(), "data.txt", b"SF:/src/a.rs\nDA:1,0\nend_of_record\n");

    let report =
        covtrend::ingest::ingest(&mut conn, &path, Some("lcov"), Metadata::default()).unwrap();
    assert_eq!(report.source(), Format::Lcov);
    assert_eq!(report.covered_lines(), 0);
}

#[test]
fn ingest_with_bad_format_override_fails() {
    let (mut conn, dir, _) = common::setup_db();

    let path = common::write_file(dir.path(), "data.txt", b"SF:/src/a.rs\nend_of_record\n");

    let err = covtrend::ingest::ingest(&mut conn, &path, Some("jacoco"), Metadata::default())
        .unwrap_err();
    assert!(err.to_string().contains("jacoco"));
}

#[test]
fn ingest_records_metadata() {
    let (mut conn, dir, _) = common::setup_db();

    let path = common::write_file(dir.path(), "lcov.info", b"SF:a\nDA:1,1\nend_of_record\n");
    let metadata = Metadata {
        branch: "main".to_string(),
        commit_sha: "0123456789abcdef".to_string(),
        tag: "v1.2.0".to_string(),
    };

    let report = covtrend::ingest::ingest(&mut conn, &path, None, metadata.clone()).unwrap();

    let stored = covtrend::db::get_report(&conn, report.id()).unwrap();
    assert_eq!(stored.metadata(), &metadata);
}

#[test]
fn ingest_unknown_format_fails() {
    let (mut conn, dir, _) = common::setup_db();

    let path = common::write_file(
        dir.path(),
        "random.dat",
        b"hello world this is not coverage data",
    );

    let result = covtrend::ingest::ingest(&mut conn, &path, None, Metadata::default());
    assert!(matches!(
        result,
        Err(covtrend::error::CovtrendError::UnknownFormat)
    ));
}

#[test]
fn ingest_missing_file_fails() {
    let (mut conn, dir, _) = common::setup_db();

    let result = covtrend::ingest::ingest(
        &mut conn,
        &dir.path().join("nope.lcov"),
        None,
        Metadata::default(),
    );
    assert!(matches!(result, Err(covtrend::error::CovtrendError::Io(_))));
}

#[test]
fn ingest_malformed_xml_stores_nothing() {
    let (mut conn, dir, _) = common::setup_db();

    let path = common::write_file(
        dir.path(),
        "coverage.xml",
        b"<?xml version=\"1.0\"?><coverage><packages></coverage>",
    );

    assert!(covtrend::ingest::ingest(&mut conn, &path, None, Metadata::default()).is_err());
    assert!(covtrend::db::list_reports(&conn, None, 10).unwrap().is_empty());
}

#[test]
fn ingest_empty_coverage_file() {
    let (mut conn, dir, _) = common::setup_db();

    let lcov_path = common::write_file(dir.path(), "empty.lcov", b"TN:test\n");

    // Should succeed (with a warning) but produce a report with 0 files
    let report =
        covtrend::ingest::ingest(&mut conn, &lcov_path, None, Metadata::default()).unwrap();
    assert!(report.files().is_empty());

    let summaries = covtrend::db::list_reports(&conn, None, 10).unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].total_files, 0);
    assert_eq!(summaries[0].total_lines, 0);
    assert_eq!(summaries[0].overall_pct(), 0.0);
}
