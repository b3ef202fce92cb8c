/*!
 * Region Timelapse Library
 *
 * Captures a fixed screen region at a steady frame rate into a numbered
 * image sequence.
 */

pub mod capture;
pub mod config;
pub mod error;
pub mod metrics;
pub mod output;
pub mod platform;
pub mod recording;
pub mod storage;
pub mod validation;

// Re-export commonly used types
pub use capture::{CaptureRegion, Frame, FrameSource};
pub use config::{OutputFormat, RunConfig, Settings};
pub use error::{CaptureError, CaptureResult};
pub use recording::{
    CommandOutcome, FrameProgress, Recorder, RecorderCommand, RunHandle, RunSummary, StartRequest,
    StopReason,
};
