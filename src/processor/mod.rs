//! Day-by-day processing pipeline.
//!
//! Ingest runs once over the selected files; the drive loop then assembles,
//! derives and writes one calendar day per iteration. Each day is finished
//! and its buffers dropped before the next one is assembled.

#[cfg(test)]
pub mod tests;

use crate::catalog::Catalog;
use crate::config::{InstrumentConfig, ProcessorConfig};
use crate::error::Result;
use crate::ingest::ingest;
use crate::microphysics::{MomentEngine, calibration_fields};
use crate::models::{DayOutcome, FieldSet, RawSeries, RunSummary};
use crate::serializer::writer::WrittenArtifact;
use crate::serializer::{ArtifactWriter, DayLayout};
use crate::window::{DailyWindowAssembler, DayWindow};
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Which days a run writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Every day from the first to the last record, gaps included
    Batch,
    /// Exactly this day, even when it holds no observation
    SingleDay(NaiveDate),
}

impl RunMode {
    fn start(self) -> Option<NaiveDate> {
        match self {
            Self::Batch => None,
            Self::SingleDay(date) => Some(date),
        }
    }
}

/// Main processor turning raw disdrometer files into daily NetCDF files
#[derive(Debug)]
pub struct DisdrometerProcessor<'a> {
    instrument: &'a InstrumentConfig,
    catalog: &'a Catalog,
    config: ProcessorConfig,
}

impl<'a> DisdrometerProcessor<'a> {
    pub fn new(instrument: &'a InstrumentConfig, catalog: &'a Catalog) -> Self {
        Self {
            instrument,
            catalog,
            config: ProcessorConfig::default(),
        }
    }

    /// Configure the processor
    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    /// Ingest `files` in the given order and write the days `mode` asks for
    pub fn process(&self, files: &[PathBuf], mode: RunMode) -> Result<RunSummary> {
        let start_time = Instant::now();

        let (series, ingest_report) = ingest(
            files,
            &self.instrument.column_schema(),
            self.config.file_failure_policy,
        )?;
        let days = self.process_series(&series, mode)?;

        let summary = RunSummary {
            ingest: ingest_report,
            days,
            processing_time_ms: start_time.elapsed().as_millis(),
        };
        info!(
            "Run finished: {} days written, {} days failed in {}ms",
            summary.days_written(),
            summary.days_failed(),
            summary.processing_time_ms
        );
        Ok(summary)
    }

    /// Run the drive loop over an already ingested series.
    ///
    /// Day-scoped failures (catalog or dimension problems) are recorded and
    /// the loop moves on; I/O and NetCDF failures end the run.
    pub fn process_series(&self, series: &RawSeries, mode: RunMode) -> Result<Vec<DayOutcome>> {
        let calibration = self.instrument.calibration();
        let engine = MomentEngine::new(&calibration, self.instrument.min_drop_count);
        let calibration_set = calibration_fields(&calibration);
        let writer = ArtifactWriter::new(self.catalog, &self.config.output_dir);
        let mut assembler = DailyWindowAssembler::new(
            series,
            self.instrument.integration_time,
            calibration.bins(),
            mode.start(),
        );

        let spinner = self.spinner();
        let mut outcomes = Vec::new();

        while let Some(step) = assembler.advance() {
            if step.terminal && mode == RunMode::Batch {
                break;
            }
            let date = step.window.date();
            spinner.set_message(format!("Processing {}", date));
            if step.terminal {
                warn!("{} lies after the last record; writing an empty day", date);
            }

            match self.process_day(&step.window, &engine, &calibration_set, &writer) {
                Ok(artifact) => {
                    info!("Wrote {}", artifact.path.display());
                    outcomes.push(DayOutcome::Written {
                        date,
                        path: artifact.path,
                    });
                }
                Err(e) if e.is_day_scoped() => {
                    error!("Skipping {}: {}", date, e);
                    outcomes.push(DayOutcome::Failed {
                        date,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    spinner.finish_and_clear();
                    return Err(e);
                }
            }

            if matches!(mode, RunMode::SingleDay(_)) {
                break;
            }
        }

        spinner.finish_and_clear();
        Ok(outcomes)
    }

    fn process_day(
        &self,
        window: &DayWindow<'_>,
        engine: &MomentEngine<'_>,
        calibration: &FieldSet,
        writer: &ArtifactWriter<'_>,
    ) -> Result<WrittenArtifact> {
        let mut fields = engine.derive(window);
        fields.extend(calibration.clone());
        fields.extend(window.time_fields());

        let layout = DayLayout {
            start: window.start(),
            time_len: window.len(),
            bins: window.bins(),
        };
        writer.write_day(&layout, &fields)
    }

    fn spinner(&self) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}
