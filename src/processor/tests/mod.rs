//! Pipeline tests for the processor module
//!
//! Run the full ingest, assemble, derive and write loop over small raw
//! fixtures written to temporary directories.

pub mod basic_processing;
pub mod error_handling;

use std::fs;
use std::path::{Path, PathBuf};

pub(crate) const RAW_HEADER: &str = "Date Time Interval n1 n2 RI";

/// Write a raw file with the two-bin column layout
pub(crate) fn write_raw_file(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut content = String::from(RAW_HEADER);
    for row in rows {
        content.push('\n');
        content.push_str(row);
    }
    fs::write(&path, content).unwrap();
    path
}

/// Sorted file names in a directory
pub(crate) fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
