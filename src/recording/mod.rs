/*!
 * Recording Engine
 *
 * `Recorder` owns the single active-run slot. `start` reserves the slot,
 * validates the request, prepares the output folder and spawns one capture
 * session. Only the session task clears the slot when its loop exits, so a
 * stopped run that is still writing its last frame blocks a new `start`.
 *
 * Runs:
 * - Idle -> Preparing -> Running on a successful `start`
 * - Preparing -> Idle when the request is rejected
 * - Running -> Stopping on a stop request (manual or auto-stop)
 * - Running/Stopping -> Idle when the loop exits or a tick fails
 */

pub mod pacer;
pub mod session;
pub mod stop;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capture::{CaptureRegion, FrameSource};
use crate::config::RunConfig;
use crate::error::{CaptureError, CaptureResult};
use crate::metrics::{MetricsSnapshot, RunMetrics};
use crate::storage::{self, DEFAULT_MIN_FREE_BYTES};
use crate::validation::validate_run_config;

pub use pacer::FramePacer;
pub use stop::{auto_stop_duration, AutoStopTimer, StopReason, StopSignal};

use session::Session;

/// How long `stop` waits for the in-flight tick to wind down.
pub const STOP_GRACE: Duration = Duration::from_millis(50);

/// Emitted once per written frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameProgress {
    pub index: u64,
    pub path: PathBuf,
}

/// Outcome of a run that ended without error.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub frames_written: u64,
    pub first_index: u64,
    /// Index the next run would continue from.
    pub next_index: u64,
    pub elapsed: Duration,
    pub stop_reason: StopReason,
    pub metrics: MetricsSnapshot,
}

/// Parameters of one `start` call.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub region: CaptureRegion,
    pub fps: f64,
    pub config: RunConfig,
    pub auto_stop: Option<Duration>,
    pub min_free_bytes: u64,
    pub progress: Option<mpsc::UnboundedSender<FrameProgress>>,
}

impl StartRequest {
    pub fn new(region: CaptureRegion, fps: f64, config: RunConfig) -> Self {
        Self {
            region,
            fps,
            config,
            auto_stop: None,
            min_free_bytes: DEFAULT_MIN_FREE_BYTES,
            progress: None,
        }
    }

    pub fn with_auto_stop(mut self, duration: Option<Duration>) -> Self {
        self.auto_stop = duration;
        self
    }

    pub fn with_progress(mut self, progress: mpsc::UnboundedSender<FrameProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_min_free_bytes(mut self, bytes: u64) -> Self {
        self.min_free_bytes = bytes;
        self
    }
}

struct ActiveRun {
    run_id: Uuid,
    signal: StopSignal,
    auto_stop: Option<AutoStopTimer>,
    done: CancellationToken,
}

/// Single-flight run slot. A run holds it from reservation until its
/// session task exits, including while it winds down after a stop.
enum RunSlot {
    Idle,
    Preparing,
    Active(ActiveRun),
}

/// Capture engine with a single-flight run slot.
#[derive(Clone)]
pub struct Recorder {
    source: Arc<dyn FrameSource>,
    active: Arc<Mutex<RunSlot>>,
}

impl Recorder {
    pub fn new(source: Arc<dyn FrameSource>) -> Self {
        Self {
            source,
            active: Arc::new(Mutex::new(RunSlot::Idle)),
        }
    }

    fn slot(&self) -> MutexGuard<'_, RunSlot> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// True from `start` until the run's loop has fully exited.
    pub fn is_running(&self) -> bool {
        !matches!(*self.slot(), RunSlot::Idle)
    }

    /// True while a stopped run is still finishing its last frame.
    pub fn is_stopping(&self) -> bool {
        matches!(&*self.slot(), RunSlot::Active(run) if run.signal.is_requested())
    }

    /// Starts a run. Returns `Ok(None)` when a run is already active or
    /// still winding down.
    ///
    /// Configuration errors are returned before any frame is written.
    /// Preparing the folder (creation, backup rotation, free-space lookup)
    /// is blocking I/O done on the caller's thread, outside the slot lock.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, request: StartRequest) -> CaptureResult<Option<RunHandle>> {
        {
            let mut slot = self.slot();
            if let RunSlot::Active(run) = &*slot {
                if run.signal.is_requested() {
                    warn!("[Recorder] Run {} still stopping, ignoring start", run.run_id);
                } else {
                    warn!("[Recorder] Run {} already active, ignoring start", run.run_id);
                }
                return Ok(None);
            }
            if matches!(*slot, RunSlot::Preparing) {
                warn!("[Recorder] Another run is being prepared, ignoring start");
                return Ok(None);
            }
            *slot = RunSlot::Preparing;
        }

        match self.launch(request) {
            Ok(handle) => Ok(Some(handle)),
            Err(e) => {
                *self.slot() = RunSlot::Idle;
                Err(e)
            }
        }
    }

    /// Prepares the folder and spawns the session. The caller holds the
    /// `Preparing` reservation.
    fn launch(&self, request: StartRequest) -> CaptureResult<RunHandle> {
        let StartRequest {
            region,
            fps,
            config,
            auto_stop,
            min_free_bytes,
            progress,
        } = request;

        region.validate()?;
        let region = region.make_even();
        validate_run_config(&config)?;

        std::fs::create_dir_all(&config.folder).map_err(|source| CaptureError::FolderUnavailable {
            path: config.folder.clone(),
            source,
        })?;

        if config.rotate_existing {
            match storage::rotate_existing(&config.folder) {
                Ok(Some(backup)) => info!("[Recorder] Previous frames moved to {}", backup.display()),
                Ok(None) => {}
                Err(e) => warn!("[Recorder] Backup rotation failed: {:#}", e),
            }
        }

        if !storage::has_sufficient_space(&config.folder, min_free_bytes) {
            return Err(CaptureError::InsufficientSpace {
                path: config.folder.clone(),
                required_bytes: min_free_bytes,
            });
        }

        let run_id = Uuid::new_v4();
        let signal = StopSignal::new();
        let metrics = RunMetrics::new();
        let done = CancellationToken::new();

        info!(
            "[Recorder] Run {} starting: [{}] at {} fps -> {} ({}, from #{})",
            run_id,
            region,
            fps,
            config.folder.display(),
            config.format,
            config.start_index
        );

        let session = Session::new(
            run_id,
            region,
            fps,
            &config,
            Arc::clone(&self.source),
            signal.clone(),
            progress,
            metrics.clone(),
        );

        let auto_stop = auto_stop.map(|duration| AutoStopTimer::arm(duration, signal.clone()));

        // The slot must hold the run before its task can exit and clear it.
        *self.slot() = RunSlot::Active(ActiveRun {
            run_id,
            signal: signal.clone(),
            auto_stop,
            done: done.clone(),
        });

        let active = Arc::clone(&self.active);
        let task = tokio::spawn(async move {
            let result = session.run().await;

            let mut slot = active.lock().unwrap_or_else(|e| e.into_inner());
            if matches!(&*slot, RunSlot::Active(run) if run.run_id == run_id) {
                if let RunSlot::Active(run) = std::mem::replace(&mut *slot, RunSlot::Idle) {
                    if let Some(timer) = &run.auto_stop {
                        timer.disarm();
                    }
                }
            }
            drop(slot);

            done.cancel();
            debug!("[Recorder] Run {} released", run_id);
            result
        });

        Ok(RunHandle {
            run_id,
            signal,
            metrics,
            task,
        })
    }

    /// Requests a manual stop of the active run and waits up to
    /// [`STOP_GRACE`] for it to wind down. The run keeps the slot until its
    /// loop exits, so a `start` during the wind-down is a no-op.
    ///
    /// Returns false when no run was running (idle, preparing, or already
    /// stopping).
    pub async fn stop(&self) -> bool {
        let (run_id, done) = {
            let slot = self.slot();
            let RunSlot::Active(run) = &*slot else {
                debug!("[Recorder] Stop requested with no active run");
                return false;
            };
            if let Some(timer) = &run.auto_stop {
                timer.disarm();
            }
            if !run.signal.request(StopReason::Manual) {
                debug!("[Recorder] Run {} is already stopping", run.run_id);
                return false;
            }
            (run.run_id, run.done.clone())
        };

        info!("[Recorder] Stopping run {}", run_id);
        if tokio::time::timeout(STOP_GRACE, done.cancelled()).await.is_err() {
            debug!("[Recorder] Run {} still finishing its last frame", run_id);
        }
        true
    }

    /// Applies a host command.
    pub async fn execute(&self, command: RecorderCommand) -> CaptureResult<CommandOutcome> {
        match command {
            RecorderCommand::Start(request) => self.start_command(request),
            RecorderCommand::Stop => Ok(if self.stop().await {
                CommandOutcome::Stopped
            } else {
                CommandOutcome::NotRunning
            }),
            RecorderCommand::Toggle(request) => {
                if self.stop().await {
                    Ok(CommandOutcome::Stopped)
                } else {
                    self.start_command(request)
                }
            }
        }
    }

    fn start_command(&self, request: StartRequest) -> CaptureResult<CommandOutcome> {
        Ok(match self.start(request)? {
            Some(handle) => CommandOutcome::Started(handle),
            None => CommandOutcome::AlreadyRunning,
        })
    }
}

/// Trigger-agnostic operations a host maps its inputs onto.
#[derive(Debug)]
pub enum RecorderCommand {
    Start(StartRequest),
    Stop,
    /// Stop when running, otherwise start.
    Toggle(StartRequest),
}

#[derive(Debug)]
pub enum CommandOutcome {
    Started(RunHandle),
    AlreadyRunning,
    Stopped,
    NotRunning,
}

/// Caller's handle to one run, returned by [`Recorder::start`].
#[derive(Debug)]
pub struct RunHandle {
    run_id: Uuid,
    signal: StopSignal,
    metrics: RunMetrics,
    task: JoinHandle<CaptureResult<RunSummary>>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Requests a manual stop. Returns true when this request was effective.
    pub fn request_stop(&self) -> bool {
        self.signal.request(StopReason::Manual)
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.signal.clone()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the run to end.
    pub async fn wait(self) -> CaptureResult<RunSummary> {
        self.task
            .await
            .map_err(|e| CaptureError::Worker(e.to_string()))?
    }

    /// Requests a manual stop and waits for the run to end.
    pub async fn stop(self) -> CaptureResult<RunSummary> {
        self.request_stop();
        self.wait().await
    }
}
