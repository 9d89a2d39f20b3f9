//! Raw disdrometer file ingest.
//!
//! Raw files are whitespace-delimited text with one header line. The first
//! two columns hold the date and the time of the record; the remaining
//! columns follow the instrument configuration. Numbers may use a comma as
//! decimal separator.
//!
//! All selected files are merged into one [`RawSeries`]. When two records
//! share a timestamp, the one from the file listed first in the caller's
//! file order wins and later copies are dropped silently, so the order of the
//! file list is significant.

use crate::config::{ColumnSchema, FileFailurePolicy};
use crate::constants::RAW_TIMESTAMP_FORMAT;
use crate::error::{DsdError, Result};
use crate::models::{FileOutcome, FileStatus, IngestReport, RawRecord, RawSeries};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Parser for single raw files; fails fast on the first malformed row.
#[derive(Debug)]
pub struct RawFileParser<'a> {
    schema: &'a ColumnSchema,
}

impl<'a> RawFileParser<'a> {
    pub fn new(schema: &'a ColumnSchema) -> Self {
        Self { schema }
    }

    /// Read and parse one raw file.
    ///
    /// Bytes that are not UTF-8 are replaced; in the header they are
    /// ignored, in a data row they surface as a parse error for that line.
    pub fn parse_file(&self, path: &Path) -> Result<Vec<RawRecord>> {
        let bytes = std::fs::read(path).map_err(|source| DsdError::ReadInput {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_str(&String::from_utf8_lossy(&bytes), path)
    }

    /// Parse raw file content; `path` is only used in diagnostics
    pub fn parse_str(&self, content: &str, path: &Path) -> Result<Vec<RawRecord>> {
        let mut records = Vec::new();

        // Line 1 is the header
        for (index, line) in content.lines().enumerate().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            records.push(self.parse_line(line, path, index + 1)?);
        }

        debug!("Parsed {} records from {}", records.len(), path.display());
        Ok(records)
    }

    fn parse_line(&self, line: &str, path: &Path, line_number: usize) -> Result<RawRecord> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let expected = self.schema.data_column_count + 2;
        if tokens.len() != expected {
            return Err(DsdError::data_parse(
                path,
                line_number,
                format!("expected {} columns, found {}", expected, tokens.len()),
            ));
        }

        let stamp = format!("{} {}", tokens[0], tokens[1]);
        let timestamp = NaiveDateTime::parse_from_str(&stamp, RAW_TIMESTAMP_FORMAT).map_err(|_| {
            DsdError::InvalidTimestamp {
                path: path.to_path_buf(),
                line: line_number,
                value: stamp.clone(),
            }
        })?;

        let data = &tokens[2..];
        let number = |index: usize| -> Result<f64> {
            parse_number(data[index], self.schema.decimal_separator).ok_or_else(|| {
                DsdError::data_parse(
                    path,
                    line_number,
                    format!("column {} is not a number: '{}'", index + 3, data[index]),
                )
            })
        };

        let interval = number(self.schema.interval_index)?;
        if interval <= 0.0 {
            return Err(DsdError::data_parse(
                path,
                line_number,
                format!("sampling interval must be positive, got {}", interval),
            ));
        }
        let counts = self
            .schema
            .drop_indices
            .iter()
            .map(|&i| number(i))
            .collect::<Result<Vec<_>>>()?;
        let legacy = self
            .schema
            .legacy_indices
            .iter()
            .map(|&i| number(i))
            .collect::<Result<Vec<_>>>()?;

        Ok(RawRecord {
            timestamp,
            interval,
            counts,
            legacy,
        })
    }
}

/// Parse a number honouring the configured decimal separator
pub fn parse_number(token: &str, decimal_separator: char) -> Option<f64> {
    if decimal_separator == '.' {
        token.parse::<f64>().ok()
    } else {
        token.replace(decimal_separator, ".").parse::<f64>().ok()
    }
}

/// Read every file in caller order and build the merged series.
///
/// With [`FileFailurePolicy::Skip`] a malformed file is recorded as failed in
/// the report and its records are discarded; with [`FileFailurePolicy::Abort`]
/// the first parse error is returned.
pub fn ingest(
    files: &[PathBuf],
    schema: &ColumnSchema,
    policy: FileFailurePolicy,
) -> Result<(RawSeries, IngestReport)> {
    if files.is_empty() {
        return Err(DsdError::NoInputFiles);
    }

    let parser = RawFileParser::new(schema);
    let mut report = IngestReport::default();
    let mut records = Vec::new();

    for path in files {
        match parser.parse_file(path) {
            Ok(file_records) => {
                report.files.push(FileOutcome {
                    path: path.clone(),
                    status: FileStatus::Succeeded {
                        records: file_records.len(),
                    },
                });
                records.extend(file_records);
            }
            Err(error) if policy == FileFailurePolicy::Skip => {
                warn!("Skipping {}: {}", path.display(), error);
                report.files.push(FileOutcome {
                    path: path.clone(),
                    status: FileStatus::Failed {
                        reason: error.to_string(),
                    },
                });
            }
            Err(error) => return Err(error),
        }
    }

    report.records_read = records.len();
    let series = RawSeries::new(records, schema.legacy_names.clone());
    report.duplicates_dropped = series.duplicates_dropped();

    if series.is_empty() {
        return Err(DsdError::EmptySeries {
            file_count: files.len(),
        });
    }

    info!(
        "Ingested {} records from {} of {} files ({} duplicate timestamps dropped)",
        series.len(),
        report.succeeded(),
        files.len(),
        report.duplicates_dropped
    );

    Ok((series, report))
}
