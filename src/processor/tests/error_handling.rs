//! Error handling pipeline tests

use super::write_raw_file;
use crate::catalog::tests::test_catalog;
use crate::catalog::{DataType, VariableSchemaEntry};
use crate::config::tests::two_bin_config;
use crate::config::{FileFailurePolicy, ProcessorConfig};
use crate::error::DsdError;
use crate::models::DayOutcome;
use crate::processor::{DisdrometerProcessor, RunMode};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn config(temp_dir: &TempDir) -> ProcessorConfig {
    ProcessorConfig::default()
        .with_output_dir(temp_dir.path().join("output"))
        .without_progress()
}

#[test]
fn test_missing_mandatory_variable_fails_each_day_without_output() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_raw_file(
        temp_dir.path(),
        "a.trf",
        &["2023-01-02 00:01:00 60 10 0 0", "2023-01-03 00:01:00 60 1 0 0"],
    );
    let instrument = two_bin_config();
    let mut catalog = test_catalog();
    catalog.variables.push(VariableSchemaEntry {
        name: "hail_rate".to_string(),
        optional: false,
        dimensions: vec!["time".to_string()],
        datatype: DataType::Float32,
        missing_value: None,
        value: None,
        attributes: BTreeMap::new(),
    });

    let processor = DisdrometerProcessor::new(&instrument, &catalog).with_config(config(&temp_dir));
    let summary = processor.process(&[file], RunMode::Batch).unwrap();

    assert_eq!(summary.days_written(), 0);
    assert_eq!(summary.days_failed(), 2);
    for day in &summary.days {
        match day {
            DayOutcome::Failed { reason, .. } => assert!(reason.contains("hail_rate")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert!(!temp_dir.path().join("output").exists());
}

#[test]
fn test_skip_policy_continues_past_bad_file() {
    let temp_dir = TempDir::new().unwrap();
    let bad = write_raw_file(temp_dir.path(), "bad.trf", &["2023-01-02 00:01:00 60 ten 0 0"]);
    let good = write_raw_file(temp_dir.path(), "good.trf", &["2023-01-02 00:02:00 60 1 0 0"]);
    let instrument = two_bin_config();
    let catalog = test_catalog();

    let processor = DisdrometerProcessor::new(&instrument, &catalog).with_config(config(&temp_dir));
    let summary = processor.process(&[bad.clone(), good], RunMode::Batch).unwrap();

    assert_eq!(summary.days_written(), 1);
    let failed: Vec<_> = summary.ingest.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].path, bad);
}

#[test]
fn test_abort_policy_stops_the_run() {
    let temp_dir = TempDir::new().unwrap();
    let bad = write_raw_file(temp_dir.path(), "bad.trf", &["2023-01-02 00:01:00 60 ten 0 0"]);
    let good = write_raw_file(temp_dir.path(), "good.trf", &["2023-01-02 00:02:00 60 1 0 0"]);
    let instrument = two_bin_config();
    let catalog = test_catalog();

    let processor = DisdrometerProcessor::new(&instrument, &catalog)
        .with_config(config(&temp_dir).with_file_failure_policy(FileFailurePolicy::Abort));
    let result = processor.process(&[bad, good], RunMode::Batch);

    match result.unwrap_err() {
        DsdError::DataParse { line, .. } => assert_eq!(line, 2),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!temp_dir.path().join("output").exists());
}

#[test]
fn test_no_input_files() {
    let temp_dir = TempDir::new().unwrap();
    let instrument = two_bin_config();
    let catalog = test_catalog();

    let processor = DisdrometerProcessor::new(&instrument, &catalog).with_config(config(&temp_dir));
    assert!(matches!(
        processor.process(&[], RunMode::Batch),
        Err(DsdError::NoInputFiles)
    ));
}

#[test]
fn test_unwritable_output_aborts_the_run() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_raw_file(temp_dir.path(), "a.trf", &["2023-01-02 00:01:00 60 1 0 0"]);
    // A plain file where the output directory should be
    let blocked = temp_dir.path().join("output");
    std::fs::write(&blocked, "").unwrap();
    let instrument = two_bin_config();
    let catalog = test_catalog();

    let processor = DisdrometerProcessor::new(&instrument, &catalog).with_config(config(&temp_dir));
    let err = processor.process(&[file], RunMode::Batch).unwrap_err();
    assert!(matches!(err, DsdError::Io(_)));
    assert!(!err.is_day_scoped());
}
