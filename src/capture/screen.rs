//! Live-screen frame source.
//!
//! Uses `xcap` to grab the monitor containing the region's origin, then crops
//! to the region. A region that is no longer fully on that monitor (layout
//! changed mid-run) is reported as an acquisition failure, never padded.

use image::RgbaImage;
use tracing::debug;
use xcap::Monitor;

use super::{CaptureRegion, FrameSource};
use crate::error::{CaptureError, CaptureResult};

/// Monitor geometry in virtual-screen coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorInfo {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub is_primary: bool,
}

impl MonitorInfo {
    /// Whether `region` lies entirely on this monitor.
    pub fn contains(&self, region: &CaptureRegion) -> bool {
        let right = i64::from(self.x) + i64::from(self.width);
        let bottom = i64::from(self.y) + i64::from(self.height);
        region.x >= self.x && region.y >= self.y && region.right() <= right && region.bottom() <= bottom
    }

    /// Whether the point is on this monitor.
    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && y >= self.y
            && i64::from(x) < i64::from(self.x) + i64::from(self.width)
            && i64::from(y) < i64::from(self.y) + i64::from(self.height)
    }
}

fn describe(monitor: &Monitor) -> CaptureResult<MonitorInfo> {
    let map = |e: xcap::XCapError| CaptureError::Acquisition(format!("Monitor query failed: {}", e));
    Ok(MonitorInfo {
        name: monitor.name().unwrap_or_else(|_| "unknown".to_string()),
        x: monitor.x().map_err(map)?,
        y: monitor.y().map_err(map)?,
        width: monitor.width().map_err(map)?,
        height: monitor.height().map_err(map)?,
        is_primary: monitor.is_primary().unwrap_or(false),
    })
}

/// Lists all monitors.
pub fn list_monitors() -> CaptureResult<Vec<MonitorInfo>> {
    let monitors = Monitor::all()
        .map_err(|e| CaptureError::Acquisition(format!("Failed to enumerate monitors: {}", e)))?;
    monitors.iter().map(describe).collect()
}

/// Cuts `region` (given relative to the image's top-left) out of `image`.
/// Fails when the region does not fit.
pub fn crop_region(image: &RgbaImage, rel_x: u32, rel_y: u32, width: u32, height: u32) -> CaptureResult<RgbaImage> {
    let fits_x = u64::from(rel_x) + u64::from(width) <= u64::from(image.width());
    let fits_y = u64::from(rel_y) + u64::from(height) <= u64::from(image.height());
    if !fits_x || !fits_y {
        return Err(CaptureError::Acquisition(format!(
            "Region {}x{} at ({}, {}) exceeds captured image {}x{}",
            width,
            height,
            rel_x,
            rel_y,
            image.width(),
            image.height()
        )));
    }
    Ok(image::imageops::crop_imm(image, rel_x, rel_y, width, height).to_image())
}

/// Frame source backed by the live desktop.
#[derive(Debug, Default)]
pub struct ScreenSource;

impl ScreenSource {
    pub fn new() -> Self {
        Self
    }
}

impl FrameSource for ScreenSource {
    fn grab(&self, region: &CaptureRegion) -> CaptureResult<RgbaImage> {
        let monitors = Monitor::all()
            .map_err(|e| CaptureError::Acquisition(format!("Failed to enumerate monitors: {}", e)))?;

        let mut target = None;
        for monitor in monitors {
            let info = describe(&monitor)?;
            if info.contains_point(region.x, region.y) {
                target = Some((monitor, info));
                break;
            }
        }

        let (monitor, info) = target.ok_or_else(|| {
            CaptureError::Acquisition(format!("Region origin ({}, {}) is not on any monitor", region.x, region.y))
        })?;

        if !info.contains(region) {
            return Err(CaptureError::Acquisition(format!(
                "Region [{}] extends past monitor '{}' ({}x{} at {}, {})",
                region, info.name, info.width, info.height, info.x, info.y
            )));
        }

        let screenshot = monitor
            .capture_image()
            .map_err(|e| CaptureError::Acquisition(format!("Screen capture failed: {}", e)))?;

        // Captured pixels may be denser than logical monitor units (HiDPI).
        let scale = f64::from(screenshot.width()) / f64::from(info.width.max(1));
        let rel_x = (f64::from(region.x - info.x) * scale).round() as u32;
        let rel_y = (f64::from(region.y - info.y) * scale).round() as u32;
        let scaled_w = (f64::from(region.width) * scale).round() as u32;
        let scaled_h = (f64::from(region.height) * scale).round() as u32;

        debug!(
            "Grabbing {} from '{}' (scale {:.2})",
            region, info.name, scale
        );

        let cropped = crop_region(&screenshot, rel_x, rel_y, scaled_w, scaled_h)?;
        if cropped.width() == region.width && cropped.height() == region.height {
            return Ok(cropped);
        }

        // Keep the frame sized to the region so the sequence stays uniform.
        Ok(image::imageops::resize(
            &cropped,
            region.width,
            region.height,
            image::imageops::FilterType::Triangle,
        ))
    }

    fn name(&self) -> &str {
        "screen"
    }
}
