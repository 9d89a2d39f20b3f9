//! Command-line interface.
//!
//! Exactly one selection mode is required: `--standard`, `--list` or
//! `--pattern`. `--date` narrows a standard or list selection to a single
//! exported day.

use crate::catalog::Catalog;
use crate::config::{FileFailurePolicy, InstrumentConfig, ProcessorConfig};
use crate::models::{DayOutcome, FileStatus, RunSummary};
use crate::processor::{DisdrometerProcessor, RunMode};
use crate::selection::{Selection, parse_cli_date, select_files};
use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use colored::*;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug, Clone)]
#[command(name = "dsd-processor")]
#[command(about = "Convert raw disdrometer records into daily NetCDF files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["standard", "list", "pattern"])
))]
pub struct Args {
    /// Process every raw file in the input directory
    #[arg(short, long)]
    pub standard: bool,

    /// Process the files named in FILE, one name per line, in listed order
    #[arg(short, long, value_name = "FILE")]
    pub list: Option<PathBuf>,

    /// Process files dated one day either side of dd/mm/YYYY and export that day
    #[arg(short, long, value_name = "DATE")]
    pub pattern: Option<String>,

    /// Export only this day (dd/mm/YYYY); needs --standard or --list
    #[arg(short, long, value_name = "DATE", conflicts_with = "pattern")]
    pub date: Option<String>,

    /// Directory holding the raw files
    #[arg(short, long, value_name = "DIR", default_value = "input/data")]
    pub input: PathBuf,

    /// Instrument configuration document
    #[arg(long, value_name = "FILE", default_value = "input/support/instrument.json")]
    pub instrument: PathBuf,

    /// Output variable catalog
    #[arg(long, value_name = "FILE", default_value = "input/support/catalog.json")]
    pub catalog: PathBuf,

    /// Directory receiving the daily NetCDF files
    #[arg(short, long, value_name = "DIR", default_value = "output/netCDF")]
    pub output: PathBuf,

    /// Stop on the first raw file that fails to parse instead of skipping it
    #[arg(long)]
    pub abort_on_bad_file: bool,

    /// Enable verbose logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn get_log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    /// Resolve the selection mode and which days to write
    pub fn plan(&self) -> crate::Result<(Selection, RunMode)> {
        if let Some(pattern) = &self.pattern {
            let date = parse_cli_date(pattern)?;
            return Ok((Selection::Pattern(date), RunMode::SingleDay(date)));
        }

        let selection = match &self.list {
            Some(list) => Selection::List(list.clone()),
            None => Selection::Standard,
        };
        let mode = match &self.date {
            Some(date) => RunMode::SingleDay(parse_cli_date(date)?),
            None => RunMode::Batch,
        };
        Ok((selection, mode))
    }

    pub fn processor_config(&self) -> ProcessorConfig {
        let policy = if self.abort_on_bad_file {
            FileFailurePolicy::Abort
        } else {
            FileFailurePolicy::Skip
        };
        let config = ProcessorConfig::default()
            .with_output_dir(&self.output)
            .with_file_failure_policy(policy);
        if self.quiet {
            config.without_progress()
        } else {
            config
        }
    }
}

/// Initialise the tracing subscriber; `RUST_LOG` overrides the flags
pub fn setup_logging(args: &Args) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dsd_processor={}", log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stderr),
        )
        .init();

    debug!("Logging initialized at level: {}", log_level);
}

/// Run the command described by `args`.
///
/// Returns `None` when the selection matched no files.
pub fn run(args: &Args) -> Result<Option<RunSummary>> {
    let (selection, mode) = args.plan()?;

    let instrument = InstrumentConfig::load(&args.instrument).with_context(|| {
        format!(
            "Failed to load instrument configuration {}",
            args.instrument.display()
        )
    })?;
    let catalog = Catalog::load(&args.catalog)
        .with_context(|| format!("Failed to load catalog {}", args.catalog.display()))?;

    let files = select_files(&selection, &args.input, &instrument.input_file_extension)
        .with_context(|| format!("Failed to select input files in {}", args.input.display()))?;

    if !args.quiet {
        println!("{}", "Starting disdrometer processing".bright_green().bold());
        println!("  {} {}", "Input:".bright_cyan(), args.input.display());
        println!("  {} {}", "Output:".bright_cyan(), args.output.display());
        println!("  {} {:?}", "Selection:".bright_cyan(), selection);
        println!(
            "  {} {}",
            "Files:".bright_cyan(),
            files.len().to_string().bright_white().bold()
        );
    }

    if files.is_empty() {
        println!("{}", "No files to be processed".bright_yellow());
        return Ok(None);
    }

    let processor =
        DisdrometerProcessor::new(&instrument, &catalog).with_config(args.processor_config());
    let summary = processor.process(&files, mode)?;

    if !args.quiet {
        print_summary(&summary);
    }
    Ok(Some(summary))
}

/// Coloured end-of-run report
pub fn print_summary(summary: &RunSummary) {
    println!("\n{}", "Processing Summary".bright_green().bold());
    println!(
        "  {} {}ms",
        "Time elapsed:".bright_cyan(),
        summary.processing_time_ms.to_string().bright_white()
    );
    println!(
        "  {} {} ({} duplicate timestamps dropped)",
        "Records ingested:".bright_cyan(),
        summary.ingest.records_read.to_string().bright_white(),
        summary.ingest.duplicates_dropped
    );
    println!(
        "  {} {}",
        "Days written:".bright_cyan(),
        summary.days_written().to_string().bright_white().bold()
    );

    for file in summary.ingest.failed() {
        if let FileStatus::Failed { reason } = &file.status {
            println!(
                "  {} {}: {}",
                "File skipped:".bright_red(),
                file.path.display(),
                reason
            );
        }
    }
    for day in &summary.days {
        if let DayOutcome::Failed { date, reason } = day {
            println!("  {} {}: {}", "Day failed:".bright_red(), date, reason);
        }
    }
}
