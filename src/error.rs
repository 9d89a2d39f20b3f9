//! Error handling for disdrometer processing operations.
//!
//! Errors fall into four groups: configuration/schema problems (fatal for the
//! day being written), raw data parse failures (reported per input file),
//! I/O and NetCDF failures (fatal for the run) and run-level conditions such
//! as an empty input selection. Numerically degenerate but valid samples are
//! never errors; the moment engine handles them by branching.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DsdError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot read input file {path}: {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    #[error("Invalid schema document {path}: {source}")]
    InvalidSchemaDocument {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Mandatory variable '{name}' has no value")]
    MissingVariable { name: String },

    #[error(
        "Dimension mismatch for variable '{variable}': dimension '{dimension}' resolves to {expected} but the array has {found}"
    )]
    DimensionMismatch {
        variable: String,
        dimension: String,
        expected: usize,
        found: usize,
    },

    #[error("Variable '{variable}' declares {expected} dimension(s) but the array has {found}")]
    RankMismatch {
        variable: String,
        expected: usize,
        found: usize,
    },

    #[error("Variable '{variable}' uses undeclared dimension '{dimension}'")]
    UnknownDimension { variable: String, dimension: String },

    #[error("Parse error in {path} at line {line}: {reason}")]
    DataParse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Invalid timestamp '{value}' in {path} at line {line}")]
    InvalidTimestamp {
        path: PathBuf,
        line: usize,
        value: String,
    },

    #[error("No input files to process")]
    NoInputFiles,

    #[error("No records were ingested from {file_count} input file(s)")]
    EmptySeries { file_count: usize },

    #[error("Invalid date '{input}' (expected dd/mm/YYYY)")]
    InvalidDate { input: String },
}

impl DsdError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a parse error for a raw data file
    pub fn data_parse(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::DataParse {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Whether the error only invalidates the day being written.
    ///
    /// Schema and dimension problems abort one artifact; the drive loop
    /// records them and moves on. Everything else ends the run.
    pub fn is_day_scoped(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. }
                | Self::MissingVariable { .. }
                | Self::DimensionMismatch { .. }
                | Self::RankMismatch { .. }
                | Self::UnknownDimension { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DsdError>;
