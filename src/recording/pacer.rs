/*!
 * Drift-Correcting Frame Pacer
 *
 * After each tick the loop sleeps until the next multiple of the frame
 * interval measured from run start, not a fixed interval from "now". Work
 * time therefore never accumulates into the schedule; a tick that overruns
 * simply lands on a later boundary.
 */

use std::time::Duration;

/// Schedules tick boundaries for a fixed frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePacer {
    interval: Duration,
}

impl FramePacer {
    /// Frame rates below 1 (including NaN) are treated as 1 fps.
    pub fn from_fps(fps: f64) -> Self {
        let fps = if fps.is_finite() && fps >= 1.0 { fps } else { 1.0 };
        Self::with_interval(Duration::from_secs_f64(1.0 / fps))
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_nanos(1)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Smallest multiple of the interval that is `>= elapsed`.
    pub fn next_boundary(&self, elapsed: Duration) -> Duration {
        let interval = self.interval.as_nanos();
        let ticks = elapsed.as_nanos().div_ceil(interval);
        let nanos = ticks.saturating_mul(interval);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// How long to sleep when `elapsed` has passed since run start.
    pub fn delay_after(&self, elapsed: Duration) -> Duration {
        self.next_boundary(elapsed).saturating_sub(elapsed)
    }
}
