//! Core data structures for disdrometer processing.
//!
//! Defines the raw record series built by ingest, the named field arrays
//! exchanged between the moment engine and the serializer, and the run
//! bookkeeping types returned to callers.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One raw disdrometer record.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub timestamp: NaiveDateTime,
    /// Sampling interval in seconds; may differ between records
    pub interval: f64,
    /// Drop counts per diameter bin
    pub counts: Vec<f64>,
    /// Values of the pass-through columns, aligned with `RawSeries::legacy_columns`
    pub legacy: Vec<f64>,
}

/// Time-ordered, de-duplicated raw records from every selected input file.
#[derive(Debug, Clone, Default)]
pub struct RawSeries {
    records: Vec<RawRecord>,
    legacy_columns: Vec<String>,
    duplicates_dropped: usize,
}

impl RawSeries {
    /// Build a series from records concatenated in caller file order.
    ///
    /// The sort is stable, so among records sharing a timestamp the one that
    /// arrived first (earlier file, then earlier line) is kept and the rest
    /// are dropped.
    pub fn new(mut records: Vec<RawRecord>, legacy_columns: Vec<String>) -> Self {
        let before = records.len();
        records.sort_by_key(|r| r.timestamp);
        records.dedup_by_key(|r| r.timestamp);
        let duplicates_dropped = before - records.len();

        Self {
            records,
            legacy_columns,
            duplicates_dropped,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    pub fn legacy_columns(&self) -> &[String] {
        &self.legacy_columns
    }

    /// Number of records discarded because an earlier record had the same timestamp
    pub fn duplicates_dropped(&self) -> usize {
        self.duplicates_dropped
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.records.first().map(|r| r.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.records.last().map(|r| r.timestamp)
    }

    /// Index of the first record at or after `timestamp`
    pub fn lower_bound(&self, timestamp: NaiveDateTime) -> usize {
        self.records.partition_point(|r| r.timestamp < timestamp)
    }
}

/// A dense array of `f64` values with an explicit shape.
///
/// Values are stored row-major; an empty shape denotes a scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldArray {
    shape: Vec<usize>,
    values: Vec<f64>,
}

impl FieldArray {
    pub fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            values: vec![value],
        }
    }

    pub fn series(values: Vec<f64>) -> Self {
        Self {
            shape: vec![values.len()],
            values,
        }
    }

    /// Row-major matrix; `values.len()` must equal `rows * cols`
    pub fn matrix(rows: usize, cols: usize, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), rows * cols);
        Self {
            shape: vec![rows, cols],
            values,
        }
    }

    /// Array of the given shape filled with one value
    pub fn filled(shape: Vec<usize>, value: f64) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            values: vec![value; len],
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

/// Name to array mapping for one day of output.
pub type FieldSet = BTreeMap<String, FieldArray>;

/// Outcome of reading one input file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileStatus {
    Succeeded { records: usize },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
}

/// Per-file ingest results, in caller file order.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub files: Vec<FileOutcome>,
    pub records_read: usize,
    pub duplicates_dropped: usize,
}

impl IngestReport {
    pub fn succeeded(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Succeeded { .. }))
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Failed { .. }))
    }
}

/// Result of one iteration of the drive loop.
#[derive(Debug, Clone, PartialEq)]
pub enum DayOutcome {
    Written { date: NaiveDate, path: PathBuf },
    Failed { date: NaiveDate, reason: String },
}

/// Processing statistics for a complete run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub ingest: IngestReport,
    pub days: Vec<DayOutcome>,
    pub processing_time_ms: u128,
}

impl RunSummary {
    pub fn days_written(&self) -> usize {
        self.days
            .iter()
            .filter(|d| matches!(d, DayOutcome::Written { .. }))
            .count()
    }

    pub fn days_failed(&self) -> usize {
        self.days.len() - self.days_written()
    }
}
