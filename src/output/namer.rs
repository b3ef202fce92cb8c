//! Output path generation.
//!
//! `{prefix}{index zero-padded to digits}{_timestamp}.{ext}`. The index
//! field grows past `digits` instead of truncating.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::config::RunConfig;

/// Timestamp suffix format, millisecond resolution.
pub const FILENAME_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Derives frame paths for one run.
#[derive(Debug, Clone)]
pub struct SequenceNamer {
    folder: PathBuf,
    prefix: String,
    digits: usize,
    add_timestamp: bool,
    extension: &'static str,
}

impl SequenceNamer {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            folder: config.folder.clone(),
            prefix: config.prefix.clone(),
            digits: usize::from(config.digits.max(1)),
            add_timestamp: config.add_timestamp,
            extension: config.format.extension(),
        }
    }

    /// File name for `index`. `at` is only used when timestamps are enabled.
    pub fn file_name(&self, index: u64, at: &DateTime<Local>) -> String {
        let stamp = if self.add_timestamp {
            format!("_{}", at.format(FILENAME_TIMESTAMP_FORMAT))
        } else {
            String::new()
        };
        format!(
            "{}{:0width$}{}.{}",
            self.prefix,
            index,
            stamp,
            self.extension,
            width = self.digits
        )
    }

    /// Full path for `index` inside the output folder.
    pub fn path_for(&self, index: u64, at: &DateTime<Local>) -> PathBuf {
        self.folder.join(self.file_name(index, at))
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }
}

/// One-shot form of [`SequenceNamer::path_for`].
pub fn next_path(config: &RunConfig, index: u64, at: &DateTime<Local>) -> PathBuf {
    SequenceNamer::new(config).path_for(index, at)
}
