//! Run configuration and persisted settings.
//!
//! `RunConfig` is the immutable value a capture run is started with.
//! `Settings` is what the CLI host loads from disk and overrides with flags:
//! - Linux: `~/.config/region-timelapse/settings.json`
//! - macOS: `~/Library/Application Support/region-timelapse/settings.json`
//! - Windows: `%APPDATA%\region-timelapse\settings.json`

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::capture::CaptureRegion;
use crate::recording::stop::auto_stop_duration;

/// Application directory name under the platform config dir.
const APP_DIR: &str = "region-timelapse";

/// Settings file name.
const SETTINGS_FILE: &str = "settings.json";

/// Output image container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
    Tiff,
    Bmp,
}

impl OutputFormat {
    /// Resolves a format name. Unknown names fall back to PNG so a typo never
    /// aborts a timelapse.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "png" => Self::Png,
            "jpeg" | "jpg" => Self::Jpeg,
            "tiff" | "tif" => Self::Tiff,
            "bmp" => Self::Bmp,
            other => {
                warn!("Unknown output format '{}', falling back to PNG", other);
                Self::Png
            }
        }
    }

    /// File extension written after the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Tiff => "tiff",
            Self::Bmp => "bmp",
        }
    }

    /// Whether quality settings apply.
    pub fn is_lossy(&self) -> bool {
        matches!(self, Self::Jpeg)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl From<String> for OutputFormat {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<OutputFormat> for String {
    fn from(format: OutputFormat) -> Self {
        format.extension().to_string()
    }
}

/// Per-run output configuration. Never mutated while a run is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Folder frames are written into.
    pub folder: PathBuf,
    /// Filename prefix placed before the sequence number.
    pub prefix: String,
    /// Output container.
    pub format: OutputFormat,
    /// Minimum width of the zero-padded sequence number (1-12).
    pub digits: u8,
    /// First sequence number of the run.
    pub start_index: u64,
    /// Stamp wall-clock time into both the filename and the pixels.
    pub add_timestamp: bool,
    /// JPEG quality. Clamped to 1-100 when encoding.
    pub jpeg_quality: u32,
    /// Move files already in `folder` into a `BackUP_NN` subfolder first.
    pub rotate_existing: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            folder: default_output_folder(),
            prefix: "capture_".to_string(),
            format: OutputFormat::Png,
            digits: 4,
            start_index: 1,
            add_timestamp: false,
            jpeg_quality: 90,
            rotate_existing: true,
        }
    }
}

/// `<Desktop>/RegionCaps`, or `./RegionCaps` when no desktop dir exists.
pub fn default_output_folder() -> PathBuf {
    dirs::desktop_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("RegionCaps")
}

/// Auto-stop timer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoStopSettings {
    pub enabled: bool,
    pub minutes: u32,
    pub seconds: f64,
}

impl Default for AutoStopSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            minutes: 0,
            seconds: 30.0,
        }
    }
}

impl AutoStopSettings {
    /// Timer duration, or `None` when auto-stop is disabled.
    pub fn duration(&self) -> Option<Duration> {
        self.enabled
            .then(|| auto_stop_duration(self.minutes, self.seconds))
    }
}

/// Everything the host persists between sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub run: RunConfig,
    pub fps: f64,
    pub auto_stop: AutoStopSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<CaptureRegion>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            run: RunConfig::default(),
            fps: 24.0,
            auto_stop: AutoStopSettings::default(),
            region: None,
        }
    }
}

impl Settings {
    /// Platform settings path, if a config dir is known.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
    }

    /// Loads settings from `path` (or the platform path). A missing file
    /// yields defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => {
                debug!("No config directory available, using default settings");
                return Ok(Self::default());
            }
        };

        if !path.exists() {
            debug!("Settings file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;

        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Writes settings as pretty JSON, creating parent folders.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write settings file {}", path.display()))?;
        info!("Saved settings to {}", path.display());
        Ok(())
    }
}
