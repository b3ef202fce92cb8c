//! Error taxonomy for capture runs.
//!
//! Configuration errors are raised before a run enters the loop. Fatal run
//! errors end an in-progress run. Cancellation is never an error.

use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by [`crate::recording::Recorder`] and its collaborators.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Region is missing or smaller than 2x2.
    #[error("Invalid capture region: {0}")]
    InvalidRegion(String),

    /// No output folder was configured.
    #[error("Output folder is not set")]
    MissingFolder,

    /// Output folder could not be created.
    #[error("Cannot prepare output folder {path}: {source}")]
    FolderUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Destination volume is below the free-space margin.
    #[error("Insufficient free space at {path} (need more than {required_bytes} bytes)")]
    InsufficientSpace { path: PathBuf, required_bytes: u64 },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The frame source could not deliver pixels for the region.
    #[error("Frame acquisition failed: {0}")]
    Acquisition(String),

    /// Encoding or writing a frame failed.
    #[error("Failed to write frame {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The blocking tick worker panicked or was aborted.
    #[error("Capture worker failed: {0}")]
    Worker(String),
}

impl CaptureError {
    /// True for errors detected before the loop starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CaptureError::InvalidRegion(_)
                | CaptureError::MissingFolder
                | CaptureError::FolderUnavailable { .. }
                | CaptureError::InsufficientSpace { .. }
                | CaptureError::InvalidConfig(_)
        )
    }
}

pub type CaptureResult<T> = std::result::Result<T, CaptureError>;
