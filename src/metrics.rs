//! Tick timing statistics for a capture run.
//!
//! Counters are atomics behind an `Arc` so the loop can record while the
//! host reads snapshots from another thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

/// Point-in-time copy of [`RunMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub frames_written: u64,
    pub avg_tick_ms: f64,
    pub max_tick_ms: f64,
    /// Ticks whose capture+encode took longer than one frame interval.
    pub overrun_ticks: u64,
}

/// Aggregated tick metrics for one run.
#[derive(Clone, Debug, Default)]
pub struct RunMetrics {
    frames_written: Arc<AtomicU64>,
    total_work_us: Arc<AtomicU64>,
    max_work_us: Arc<AtomicU64>,
    overrun_ticks: Arc<AtomicU64>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one written frame and how long its tick worked.
    pub fn record_tick(&self, work: Duration, interval: Duration) {
        let work_us = work.as_micros().min(u128::from(u64::MAX)) as u64;
        self.frames_written.fetch_add(1, Ordering::Relaxed);
        self.total_work_us.fetch_add(work_us, Ordering::Relaxed);
        self.max_work_us.fetch_max(work_us, Ordering::Relaxed);
        if work > interval {
            self.overrun_ticks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let frames = self.frames_written();
        let total_us = self.total_work_us.load(Ordering::Relaxed);
        let avg_tick_ms = if frames == 0 {
            0.0
        } else {
            total_us as f64 / frames as f64 / 1000.0
        };
        MetricsSnapshot {
            frames_written: frames,
            avg_tick_ms,
            max_tick_ms: self.max_work_us.load(Ordering::Relaxed) as f64 / 1000.0,
            overrun_ticks: self.overrun_ticks.load(Ordering::Relaxed),
        }
    }
}
