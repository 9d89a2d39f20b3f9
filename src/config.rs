//! Configuration management and validation.
//!
//! Provides the instrument configuration document (column layout and
//! calibration vectors), the derived immutable views handed to ingest and
//! the moment engine, and the processing options for a run.

use crate::constants::SECONDS_PER_DAY;
use crate::error::{DsdError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Instrument configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Free-form instrument name, used in log output
    #[serde(default)]
    pub instrument: String,

    /// Raw column names in file order; the first two are date and time
    pub columns: Vec<String>,

    /// Column holding the per-record sampling interval (seconds)
    #[serde(default = "default_interval_column")]
    pub interval_column: String,

    /// Drop-count columns, one per diameter bin, in bin order
    pub drop_columns: Vec<String>,

    /// Number of diameter bins
    pub bins: usize,

    /// Mean diameter of each bin (mm)
    pub drop_mean_diam: Vec<f64>,

    /// Width of each bin (mm)
    pub delta_diam: Vec<f64>,

    /// Terminal fall velocity of each bin (m/s)
    pub fall_velocity: Vec<f64>,

    /// Sensor catchment area (m²)
    pub sensor_area: f64,

    /// Nominal integration time (seconds); must divide one day
    pub integration_time: u32,

    /// Samples with fewer drops than this (but more than zero) are flagged
    pub min_drop_count: f64,

    /// Extension of raw input files, e.g. ".trf"
    #[serde(default = "default_extension")]
    pub input_file_extension: String,

    /// Decimal separator used in raw files
    #[serde(default = "default_decimal_separator")]
    pub decimal_separator: char,
}

fn default_interval_column() -> String {
    "Interval".to_string()
}

fn default_extension() -> String {
    ".trf".to_string()
}

fn default_decimal_separator() -> char {
    ','
}

/// False for zero, negatives and NaN
fn is_positive(value: f64) -> bool {
    value > 0.0
}

impl InstrumentConfig {
    /// Load and validate an instrument configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            serde_json::from_str(&content).map_err(|source| DsdError::InvalidSchemaDocument {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        debug!(
            "Loaded instrument configuration '{}' ({} bins) from {}",
            config.instrument,
            config.bins,
            path.display()
        );
        Ok(config)
    }

    /// Check internal consistency of the document
    pub fn validate(&self) -> Result<()> {
        if self.bins == 0 {
            return Err(DsdError::configuration("bin count must be positive"));
        }

        for (name, len) in [
            ("drop_columns", self.drop_columns.len()),
            ("drop_mean_diam", self.drop_mean_diam.len()),
            ("delta_diam", self.delta_diam.len()),
            ("fall_velocity", self.fall_velocity.len()),
        ] {
            if len != self.bins {
                return Err(DsdError::configuration(format!(
                    "{} has {} entries but the instrument has {} bins",
                    name, len, self.bins
                )));
            }
        }

        if !is_positive(self.sensor_area) {
            return Err(DsdError::configuration(format!(
                "sensor_area must be positive, got {}",
                self.sensor_area
            )));
        }
        if let Some(v) = self.fall_velocity.iter().find(|v| !is_positive(**v)) {
            return Err(DsdError::configuration(format!(
                "fall_velocity entries must be positive, got {}",
                v
            )));
        }
        if let Some(d) = self.delta_diam.iter().find(|d| !is_positive(**d)) {
            return Err(DsdError::configuration(format!(
                "delta_diam entries must be positive, got {}",
                d
            )));
        }

        if self.integration_time == 0 || SECONDS_PER_DAY % self.integration_time != 0 {
            return Err(DsdError::configuration(format!(
                "integration_time {}s does not divide a day",
                self.integration_time
            )));
        }

        if self.columns.len() < 3 {
            return Err(DsdError::configuration(
                "columns must list date, time and at least one data column",
            ));
        }
        let data_columns = &self.columns[2..];
        if !data_columns.contains(&self.interval_column) {
            return Err(DsdError::configuration(format!(
                "interval column '{}' is not among the data columns",
                self.interval_column
            )));
        }
        if let Some(missing) = self
            .drop_columns
            .iter()
            .find(|c| !data_columns.contains(*c))
        {
            return Err(DsdError::configuration(format!(
                "drop column '{}' is not among the data columns",
                missing
            )));
        }

        Ok(())
    }

    /// Number of slots in one daily window
    pub fn slots_per_day(&self) -> usize {
        (SECONDS_PER_DAY / self.integration_time) as usize
    }

    pub fn calibration(&self) -> CalibrationVectors {
        CalibrationVectors {
            diameter: self.drop_mean_diam.clone(),
            delta_diameter: self.delta_diam.clone(),
            fall_velocity: self.fall_velocity.clone(),
            sensor_area: self.sensor_area,
            integration_time: self.integration_time,
        }
    }

    /// Map column names onto positions among the data columns
    pub fn column_schema(&self) -> ColumnSchema {
        let data_columns = &self.columns[2..];
        let position = |name: &str| data_columns.iter().position(|c| c == name);

        let interval_index = position(&self.interval_column).unwrap_or(0);
        let drop_indices = self
            .drop_columns
            .iter()
            .filter_map(|c| position(c))
            .collect();

        let legacy: Vec<(usize, String)> = data_columns
            .iter()
            .enumerate()
            .filter(|(_, c)| **c != self.interval_column && !self.drop_columns.contains(*c))
            .map(|(i, c)| (i, c.clone()))
            .collect();

        ColumnSchema {
            data_column_count: data_columns.len(),
            interval_index,
            drop_indices,
            legacy_indices: legacy.iter().map(|(i, _)| *i).collect(),
            legacy_names: legacy.into_iter().map(|(_, c)| c).collect(),
            decimal_separator: self.decimal_separator,
        }
    }
}

/// Calibration vectors and sensor constants, immutable for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationVectors {
    /// Mean bin diameter D[i] (mm)
    pub diameter: Vec<f64>,
    /// Bin width ΔD[i] (mm)
    pub delta_diameter: Vec<f64>,
    /// Terminal fall velocity v[i] (m/s)
    pub fall_velocity: Vec<f64>,
    /// Catchment area A (m²)
    pub sensor_area: f64,
    /// Nominal integration time (s)
    pub integration_time: u32,
}

impl CalibrationVectors {
    pub fn bins(&self) -> usize {
        self.diameter.len()
    }
}

/// Positions of the interesting columns within a raw row, after the two
/// timestamp columns have been removed.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSchema {
    pub data_column_count: usize,
    pub interval_index: usize,
    pub drop_indices: Vec<usize>,
    pub legacy_indices: Vec<usize>,
    pub legacy_names: Vec<String>,
    pub decimal_separator: char,
}

/// What the ingest stage does when a raw file fails to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFailurePolicy {
    /// Record the failure in the ingest report and continue with the next file
    Skip,
    /// Stop the run on the first failing file
    Abort,
}

/// Options for one processing run
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Directory receiving the daily NetCDF files
    pub output_dir: PathBuf,

    /// Behaviour on malformed raw files
    pub file_failure_policy: FileFailurePolicy,

    /// Show a per-day progress spinner
    pub show_progress: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            file_failure_policy: FileFailurePolicy::Skip,
            show_progress: true,
        }
    }
}

impl ProcessorConfig {
    /// Set the output directory
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Set the raw file failure policy
    pub fn with_file_failure_policy(mut self, policy: FileFailurePolicy) -> Self {
        self.file_failure_policy = policy;
        self
    }

    /// Disable the progress spinner
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }
}
