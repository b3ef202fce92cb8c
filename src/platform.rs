use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::capture::screen::{list_monitors, MonitorInfo};

/// Bounding box of all monitors (right/bottom exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualScreen {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl VirtualScreen {
    /// Union of the given monitors, `None` when the list is empty.
    pub fn from_monitors(monitors: &[MonitorInfo]) -> Option<Self> {
        let mut iter = monitors.iter();
        let first = iter.next()?;
        let mut screen = Self::of(first);
        for monitor in iter {
            let other = Self::of(monitor);
            screen.left = screen.left.min(other.left);
            screen.top = screen.top.min(other.top);
            screen.right = screen.right.max(other.right);
            screen.bottom = screen.bottom.max(other.bottom);
        }
        Some(screen)
    }

    fn of(monitor: &MonitorInfo) -> Self {
        Self {
            left: monitor.x,
            top: monitor.y,
            right: monitor.x.saturating_add(monitor.width as i32),
            bottom: monitor.y.saturating_add(monitor.height as i32),
        }
    }

    pub fn width(&self) -> u32 {
        (self.right - self.left).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top).max(0) as u32
    }
}

/// Get platform name
pub fn get_platform_name() -> &'static str {
    #[cfg(target_os = "windows")]
    return "windows";

    #[cfg(target_os = "macos")]
    return "macos";

    #[cfg(target_os = "linux")]
    return "linux";

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    return "unknown";
}

/// Virtual screen of the current desktop.
pub fn virtual_screen() -> Result<VirtualScreen> {
    let monitors = list_monitors()?;
    match VirtualScreen::from_monitors(&monitors) {
        Some(screen) => Ok(screen),
        None => bail!("No monitors found on {}", get_platform_name()),
    }
}
