//! Input file selection.
//!
//! Resolves a selection mode into the ordered list of raw files handed to
//! ingest. Order matters: when files overlap in time, the earlier file wins
//! on duplicate timestamps.

use crate::constants::{CLI_DATE_FORMAT, FILE_NAME_DATE_FORMAT};
use crate::error::{DsdError, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// How input files are chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every file in the input directory with the configured extension, by name
    Standard,
    /// File names listed one per line in this file, in listed order
    List(PathBuf),
    /// Files whose names carry the date, the day before or the day after
    Pattern(NaiveDate),
}

/// Parse a `dd/mm/YYYY` command-line date
pub fn parse_cli_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), CLI_DATE_FORMAT).map_err(|_| DsdError::InvalidDate {
        input: input.to_string(),
    })
}

/// Resolve `selection` against `input_dir`
pub fn select_files(selection: &Selection, input_dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let files = match selection {
        Selection::Standard => files_with_extension(input_dir, extension)?,
        Selection::List(list) => listed_files(list, input_dir)?,
        Selection::Pattern(date) => files_around_date(input_dir, *date)?,
    };
    debug!("Selected {} input files from {}", files.len(), input_dir.display());
    Ok(files)
}

fn files_with_extension(input_dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(input_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(extension));
        if entry.file_type().is_file() && matches {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn listed_files(list: &Path, input_dir: &Path) -> Result<Vec<PathBuf>> {
    let content = std::fs::read_to_string(list)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|name| input_dir.join(name))
        .collect())
}

fn files_around_date(input_dir: &Path, date: NaiveDate) -> Result<Vec<PathBuf>> {
    let days = [date.pred_opt(), Some(date), date.succ_opt()];
    let escaped_dir = glob::Pattern::escape(&input_dir.to_string_lossy());

    let mut files = Vec::new();
    for day in days.into_iter().flatten() {
        let pattern = format!("{}/*{}*", escaped_dir, day.format(FILE_NAME_DATE_FORMAT));
        let paths = glob::glob(&pattern).map_err(|e| {
            DsdError::configuration(format!("invalid file pattern '{}': {}", pattern, e))
        })?;
        for path in paths {
            let path = path.map_err(glob::GlobError::into_error)?;
            if path.is_file() {
                files.push(path);
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}
