//! Basic processing pipeline tests

use super::{file_names, write_raw_file};
use crate::catalog::tests::test_catalog;
use crate::config::ProcessorConfig;
use crate::config::tests::two_bin_config;
use crate::models::DayOutcome;
use crate::processor::{DisdrometerProcessor, RunMode};
use chrono::NaiveDate;
use std::f64::consts::PI;
use tempfile::TempDir;

fn config(temp_dir: &TempDir) -> ProcessorConfig {
    ProcessorConfig::default()
        .with_output_dir(temp_dir.path().join("output"))
        .without_progress()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_batch_writes_every_day_in_span() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_raw_file(
        temp_dir.path(),
        "RD80_20230102.trf",
        &[
            "2023-01-02 00:01:00 60 10 0 0,5",
            "2023-01-04 12:00:00 60 3 1 0",
        ],
    );
    let instrument = two_bin_config();
    let catalog = test_catalog();

    let processor = DisdrometerProcessor::new(&instrument, &catalog).with_config(config(&temp_dir));
    let summary = processor.process(&[file], RunMode::Batch).unwrap();

    assert_eq!(summary.days_written(), 3);
    assert_eq!(summary.days_failed(), 0);
    assert_eq!(summary.ingest.records_read, 2);
    assert_eq!(
        file_names(&temp_dir.path().join("output")),
        vec![
            "testdisdrometer.b1.20230102.000000.nc",
            "testdisdrometer.b1.20230103.000000.nc",
            "testdisdrometer.b1.20230104.000000.nc",
        ]
    );
}

#[test]
fn test_single_day_writes_only_requested_date() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_raw_file(
        temp_dir.path(),
        "a.trf",
        &[
            "2023-01-01 23:59:00 60 1 0 0",
            "2023-01-02 00:01:00 60 10 0 0",
            "2023-01-03 00:00:00 60 2 0 0",
        ],
    );
    let instrument = two_bin_config();
    let catalog = test_catalog();
    let processor = DisdrometerProcessor::new(&instrument, &catalog).with_config(config(&temp_dir));

    let summary = processor
        .process(&[file], RunMode::SingleDay(date(2023, 1, 2)))
        .unwrap();

    assert_eq!(summary.days.len(), 1);
    assert!(matches!(
        &summary.days[0],
        DayOutcome::Written { date: d, .. } if *d == date(2023, 1, 2)
    ));
    assert_eq!(
        file_names(&temp_dir.path().join("output")),
        vec!["testdisdrometer.b1.20230102.000000.nc"]
    );
}

#[test]
fn test_single_day_after_data_still_writes_empty_day() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_raw_file(temp_dir.path(), "a.trf", &["2023-01-02 00:01:00 60 10 0 0"]);
    let instrument = two_bin_config();
    let catalog = test_catalog();
    let processor = DisdrometerProcessor::new(&instrument, &catalog).with_config(config(&temp_dir));

    let summary = processor
        .process(&[file], RunMode::SingleDay(date(2023, 1, 9)))
        .unwrap();
    assert_eq!(summary.days_written(), 1);

    let path = temp_dir
        .path()
        .join("output")
        .join("testdisdrometer.b1.20230109.000000.nc");
    let nc = netcdf::open(&path).unwrap();
    let rain = nc
        .variable("rain_rate")
        .unwrap()
        .get_values::<f64, _>(..)
        .unwrap();
    assert_eq!(rain.len(), 1440);
    assert!(rain.iter().all(|v| *v == -9999.0));
}

#[test]
fn test_written_values_follow_moment_formulas() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_raw_file(
        temp_dir.path(),
        "a.trf",
        &[
            "2023-01-02 00:01:00 60 10 0 0",
            "2023-01-02 00:02:00 60 0 0 0",
        ],
    );
    let instrument = two_bin_config();
    let catalog = test_catalog();
    let processor = DisdrometerProcessor::new(&instrument, &catalog).with_config(config(&temp_dir));
    let summary = processor.process(&[file], RunMode::Batch).unwrap();

    let DayOutcome::Written { path, .. } = &summary.days[0] else {
        panic!("first day was not written");
    };
    let nc = netcdf::open(path).unwrap();

    let rain = nc
        .variable("rain_rate")
        .unwrap()
        .get_values::<f64, _>(..)
        .unwrap();
    let expected = (PI / 6.0) * 3.6e-3 * (1.0 / (0.005 * 60.0)) * 10.0;
    assert_eq!(rain[0], -9999.0);
    assert!((rain[1] - expected).abs() <= 1e-6 * expected);
    assert_eq!(rain[2], 0.0);

    let dbz = nc
        .variable("radar_reflectivity")
        .unwrap()
        .get_values::<f64, _>(..)
        .unwrap();
    assert_eq!(dbz[2], -99.0);

    let qc = nc
        .variable("qc_number_detected_particles")
        .unwrap()
        .get_values::<f64, _>(..)
        .unwrap();
    assert_eq!(&qc[..3], &[-99.0, 0.0, 0.0]);

    let base_time = nc
        .variable("base_time")
        .unwrap()
        .get_values::<f64, _>(..)
        .unwrap();
    assert_eq!(base_time, vec![1_672_617_600.0]);
}

#[test]
fn test_first_listed_file_wins_duplicate_timestamps() {
    let temp_dir = TempDir::new().unwrap();
    let first = write_raw_file(temp_dir.path(), "b.trf", &["2023-01-02 00:01:00 60 7 0 0"]);
    let second = write_raw_file(temp_dir.path(), "a.trf", &["2023-01-02 00:01:00 60 1 5 0"]);
    let instrument = two_bin_config();
    let catalog = test_catalog();
    let processor = DisdrometerProcessor::new(&instrument, &catalog).with_config(config(&temp_dir));

    let summary = processor.process(&[first, second], RunMode::Batch).unwrap();
    assert_eq!(summary.ingest.duplicates_dropped, 1);

    let DayOutcome::Written { path, .. } = &summary.days[0] else {
        panic!("day was not written");
    };
    let nc = netcdf::open(path).unwrap();
    let counts = nc
        .variable("num_drop")
        .unwrap()
        .get_values::<f64, _>(..)
        .unwrap();
    assert_eq!(&counts[2..4], &[7.0, 0.0]);
}
