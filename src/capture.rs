use chrono::{DateTime, Local};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::error::{CaptureError, CaptureResult};
use crate::platform::VirtualScreen;

pub mod screen;

/// Smallest width/height a region may have.
pub const MIN_REGION_SIZE: u32 = 2;

/// Axis-aligned capture rectangle in virtual-screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rounds width and height down to even numbers, with a floor of 2.
    pub fn make_even(&self) -> Self {
        Self {
            x: self.x,
            y: self.y,
            width: (self.width & !1).max(MIN_REGION_SIZE),
            height: (self.height & !1).max(MIN_REGION_SIZE),
        }
    }

    /// Pulls the region inside the virtual screen: the origin is moved to
    /// the top-left edge when it lies beyond it and the size shrinks to fit.
    /// The result is always even-sized.
    pub fn clamp_to(&self, screen: &VirtualScreen) -> Self {
        let x = self.x.max(screen.left);
        let y = self.y.max(screen.top);
        let mut width = self.width.max(MIN_REGION_SIZE);
        let mut height = self.height.max(MIN_REGION_SIZE);

        if i64::from(x) + i64::from(width) > i64::from(screen.right) {
            width = (i64::from(screen.right) - i64::from(x)).max(i64::from(MIN_REGION_SIZE)) as u32;
        }
        if i64::from(y) + i64::from(height) > i64::from(screen.bottom) {
            height = (i64::from(screen.bottom) - i64::from(y)).max(i64::from(MIN_REGION_SIZE)) as u32;
        }

        Self::new(x, y, width, height).make_even()
    }

    /// Checks the 2x2 minimum.
    pub fn validate(&self) -> CaptureResult<()> {
        if self.width < MIN_REGION_SIZE || self.height < MIN_REGION_SIZE {
            return Err(CaptureError::InvalidRegion(format!(
                "{}x{} is smaller than {}x{}",
                self.width, self.height, MIN_REGION_SIZE, MIN_REGION_SIZE
            )));
        }
        Ok(())
    }

    pub fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    pub fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for CaptureRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X={}, Y={}, W={}, H={}", self.x, self.y, self.width, self.height)
    }
}

impl std::str::FromStr for CaptureRegion {
    type Err = String;

    /// Parses `x,y,width,height`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(format!("expected x,y,width,height but got '{}'", s));
        }
        let x = parts[0].parse::<i32>().map_err(|e| format!("bad x '{}': {}", parts[0], e))?;
        let y = parts[1].parse::<i32>().map_err(|e| format!("bad y '{}': {}", parts[1], e))?;
        let width = parts[2]
            .parse::<u32>()
            .map_err(|e| format!("bad width '{}': {}", parts[2], e))?;
        let height = parts[3]
            .parse::<u32>()
            .map_err(|e| format!("bad height '{}': {}", parts[3], e))?;
        Ok(Self::new(x, y, width, height))
    }
}

/// One captured tick: pixels sized exactly to the region plus the wall-clock
/// time the tick started.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbaImage,
    pub captured_at: DateTime<Local>,
}

impl Frame {
    pub fn new(image: RgbaImage, captured_at: DateTime<Local>) -> Self {
        Self { image, captured_at }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// True when the pixel buffer has the region's exact dimensions.
    pub fn matches(&self, region: &CaptureRegion) -> bool {
        self.width() == region.width && self.height() == region.height
    }
}

/// Source of region pixels.
///
/// Implementations block; the engine calls them off the async runtime.
pub trait FrameSource: Send + Sync {
    /// Samples the current contents of `region`.
    fn grab(&self, region: &CaptureRegion) -> CaptureResult<RgbaImage>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "frame-source"
    }
}

/// Creates the live-screen frame source for this platform.
pub fn create_screen_source() -> screen::ScreenSource {
    #[cfg(target_os = "macos")]
    info!("Initializing screen source for platform: macOS");
    #[cfg(target_os = "windows")]
    info!("Initializing screen source for platform: Windows");
    #[cfg(target_os = "linux")]
    info!("Initializing screen source for platform: Linux");

    screen::ScreenSource::new()
}
