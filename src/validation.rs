//! Input validation for capture settings.
//!
//! Range checks mirror the limits of the configuration surface and produce
//! descriptive messages suitable for showing to the operator.

use anyhow::{bail, Result};

use crate::config::RunConfig;
use crate::error::{CaptureError, CaptureResult};

pub const MIN_FPS: f64 = 1.0;
pub const MAX_FPS: f64 = 120.0;
pub const MIN_DIGITS: u8 = 1;
pub const MAX_DIGITS: u8 = 12;
pub const MAX_START_INDEX: u64 = 999_999_999;
pub const MAX_AUTO_STOP_MINUTES: u32 = 999;
pub const MIN_AUTO_STOP_SECONDS: f64 = 0.1;
pub const MAX_AUTO_STOP_SECONDS: f64 = 59.9;
const MAX_PREFIX_LEN: usize = 128;

/// Characters that are not allowed in a filename prefix on any platform.
const FORBIDDEN_PREFIX_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Validates a filename prefix. Empty prefixes are allowed.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.len() > MAX_PREFIX_LEN {
        bail!(
            "Filename prefix is too long: {} characters (max: {})",
            prefix.len(),
            MAX_PREFIX_LEN
        );
    }
    if let Some(c) = prefix.chars().find(|c| FORBIDDEN_PREFIX_CHARS.contains(c) || c.is_control()) {
        bail!("Filename prefix contains invalid character {:?}", c);
    }
    if prefix.contains("..") {
        bail!("Filename prefix cannot contain '..'");
    }
    Ok(())
}

/// Frame rate the operator may request.
pub fn validate_fps(fps: f64) -> Result<()> {
    if !(MIN_FPS..=MAX_FPS).contains(&fps) {
        bail!("Frame rate {} is out of range ({}-{})", fps, MIN_FPS, MAX_FPS);
    }
    Ok(())
}

pub fn validate_digits(digits: u8) -> Result<()> {
    if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits) {
        bail!("Sequence width {} is out of range ({}-{})", digits, MIN_DIGITS, MAX_DIGITS);
    }
    Ok(())
}

pub fn validate_start_index(start: u64) -> Result<()> {
    if start > MAX_START_INDEX {
        bail!("Start index {} exceeds {}", start, MAX_START_INDEX);
    }
    Ok(())
}

pub fn validate_jpeg_quality(quality: u32) -> Result<()> {
    if !(1..=100).contains(&quality) {
        bail!("JPEG quality {} is out of range (1-100)", quality);
    }
    Ok(())
}

/// Auto-stop duration fields. Seconds below the minimum are accepted here
/// because the timer raises them to 0.1s anyway.
pub fn validate_auto_stop(minutes: u32, seconds: f64) -> Result<()> {
    if minutes > MAX_AUTO_STOP_MINUTES {
        bail!("Auto-stop minutes {} exceeds {}", minutes, MAX_AUTO_STOP_MINUTES);
    }
    if !seconds.is_finite() || seconds < 0.0 || seconds > MAX_AUTO_STOP_SECONDS {
        bail!(
            "Auto-stop seconds {} is out of range ({}-{})",
            seconds,
            MIN_AUTO_STOP_SECONDS,
            MAX_AUTO_STOP_SECONDS
        );
    }
    Ok(())
}

/// Checks a run configuration before a run is allowed to start.
///
/// JPEG quality is deliberately not checked; it is clamped at encode time.
pub fn validate_run_config(config: &RunConfig) -> CaptureResult<()> {
    let folder = config.folder.to_string_lossy();
    if folder.trim().is_empty() {
        return Err(CaptureError::MissingFolder);
    }

    validate_prefix(&config.prefix)
        .and_then(|_| validate_digits(config.digits))
        .and_then(|_| validate_start_index(config.start_index))
        .map_err(|e| CaptureError::InvalidConfig(e.to_string()))
}
