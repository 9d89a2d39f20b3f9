//! Disdrometer Processor Library
//!
//! Converts raw drop-count records from an impact disdrometer into daily
//! NetCDF files carrying drop size distribution moments.
//!
//! The pipeline has four stages:
//! - Ingest: parse raw files into one time-sorted, de-duplicated series
//! - Windowing: cut the series into fixed-length calendar-day grids
//! - Microphysics: derive rain rate, reflectivity and the other moments per sample
//! - Serialization: write each day against a declarative variable catalog

pub mod catalog;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod ingest;
pub mod microphysics;
pub mod models;
pub mod processor;
pub mod selection;
pub mod serializer;
pub mod window;

// Re-export commonly used types
pub use catalog::Catalog;
pub use config::{FileFailurePolicy, InstrumentConfig, ProcessorConfig};
pub use error::{DsdError, Result};
pub use models::{DayOutcome, RawRecord, RawSeries, RunSummary};
pub use processor::{DisdrometerProcessor, RunMode};
pub use selection::Selection;
