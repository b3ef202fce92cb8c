//! Run cancellation and the auto-stop timer.
//!
//! A [`StopSignal`] wraps the run's cancellation token and remembers which
//! request got there first. Manual stop and auto-stop expiry may race;
//! exactly one of them is reported as effective and neither can fail.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Shortest auto-stop timer.
pub const MIN_AUTO_STOP: Duration = Duration::from_millis(100);

/// Why a run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Stop command from the host.
    Manual,
    /// The auto-stop timer expired.
    AutoStop,
}

#[derive(Debug, Default)]
struct StopState {
    token: CancellationToken,
    reason: OnceLock<StopReason>,
}

/// Shared cancellation handle for one run.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopState>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Returns true only for the first request.
    pub fn request(&self, reason: StopReason) -> bool {
        let first = self.inner.reason.set(reason).is_ok();
        self.inner.token.cancel();
        if first {
            debug!("Stop requested ({:?})", reason);
        }
        first
    }

    pub fn is_requested(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Reason of the effective request, if any.
    pub fn reason(&self) -> Option<StopReason> {
        self.inner.reason.get().copied()
    }

    /// Resolves once a stop has been requested.
    pub async fn requested(&self) {
        self.inner.token.cancelled().await
    }
}

/// Total auto-stop duration from minutes and seconds, never below 0.1s.
pub fn auto_stop_duration(minutes: u32, seconds: f64) -> Duration {
    let seconds = if seconds.is_finite() { seconds } else { 0.0 };
    let total = f64::from(minutes) * 60.0 + seconds;
    Duration::from_secs_f64(total.max(0.0)).max(MIN_AUTO_STOP)
}

/// Timer that requests [`StopReason::AutoStop`] once its duration elapses.
///
/// Disarming (or dropping) the timer before expiry makes it a no-op.
#[derive(Debug)]
pub struct AutoStopTimer {
    disarm: CancellationToken,
    task: Option<JoinHandle<bool>>,
}

impl AutoStopTimer {
    /// Starts the timer. Must be called from within a Tokio runtime.
    pub fn arm(duration: Duration, signal: StopSignal) -> Self {
        let duration = duration.max(MIN_AUTO_STOP);
        let disarm = CancellationToken::new();
        let cancelled = disarm.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => false,
                _ = signal.requested() => false,
                _ = tokio::time::sleep(duration) => {
                    let effective = signal.request(StopReason::AutoStop);
                    if effective {
                        info!("[AutoStop] {:.1}s elapsed, stopping run", duration.as_secs_f64());
                    }
                    effective
                }
            }
        });

        debug!("[AutoStop] Armed for {:.1}s", duration.as_secs_f64());
        Self {
            disarm,
            task: Some(task),
        }
    }

    /// Cancels the timer. Safe to call any number of times.
    pub fn disarm(&self) {
        self.disarm.cancel();
    }

    /// Waits for the timer task and reports whether its stop was the
    /// effective one.
    pub async fn finished(mut self) -> bool {
        match self.task.take() {
            Some(task) => task.await.unwrap_or(false),
            None => false,
        }
    }
}

impl Drop for AutoStopTimer {
    fn drop(&mut self) {
        self.disarm.cancel();
    }
}
