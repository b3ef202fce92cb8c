/*!
 * Capture Session
 *
 * The tick loop of one run: acquire -> stamp -> encode -> notify -> pace.
 * Each tick finishes before the next is scheduled, so frames are written in
 * strictly increasing index order with no gaps. Any tick failure ends the
 * run; frames are never skipped.
 */

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::pacer::FramePacer;
use super::stop::{StopReason, StopSignal};
use super::{FrameProgress, RunSummary};
use crate::capture::{CaptureRegion, Frame, FrameSource};
use crate::config::RunConfig;
use crate::error::{CaptureError, CaptureResult};
use crate::metrics::RunMetrics;
use crate::output::{stamp_timestamp, timestamp_text, FrameEncoder, SequenceNamer};

/// Live state of a running capture, owned by the loop.
#[derive(Debug)]
struct RunState {
    next_index: u64,
    started: Instant,
    elapsed: Duration,
}

impl RunState {
    fn new(start_index: u64) -> Self {
        Self {
            next_index: start_index,
            started: Instant::now(),
            elapsed: Duration::ZERO,
        }
    }

    fn tick_clock(&mut self) -> Duration {
        self.elapsed = self.started.elapsed();
        self.elapsed
    }
}

/// Everything one run needs, moved into the loop task.
pub(crate) struct Session {
    pub run_id: Uuid,
    pub region: CaptureRegion,
    pub add_timestamp: bool,
    pub start_index: u64,
    pub namer: SequenceNamer,
    pub encoder: FrameEncoder,
    pub pacer: FramePacer,
    pub source: Arc<dyn FrameSource>,
    pub signal: StopSignal,
    pub progress: Option<mpsc::UnboundedSender<FrameProgress>>,
    pub metrics: RunMetrics,
}

impl Session {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        run_id: Uuid,
        region: CaptureRegion,
        fps: f64,
        config: &RunConfig,
        source: Arc<dyn FrameSource>,
        signal: StopSignal,
        progress: Option<mpsc::UnboundedSender<FrameProgress>>,
        metrics: RunMetrics,
    ) -> Self {
        Self {
            run_id,
            region,
            add_timestamp: config.add_timestamp,
            start_index: config.start_index,
            namer: SequenceNamer::new(config),
            encoder: FrameEncoder::new(config.format, config.jpeg_quality),
            pacer: FramePacer::from_fps(fps),
            source,
            signal,
            progress,
            metrics,
        }
    }

    /// Runs ticks until a stop is requested or a tick fails.
    pub async fn run(self) -> CaptureResult<RunSummary> {
        let mut state = RunState::new(self.start_index);
        let interval = self.pacer.interval();

        info!(
            "[Session {}] Capturing [{}] every {:.1}ms via {}",
            self.run_id,
            self.region,
            interval.as_secs_f64() * 1000.0,
            self.source.name()
        );

        while !self.signal.is_requested() {
            let tick_start = state.tick_clock();
            let index = state.next_index;

            let path = match self.tick(index).await {
                Ok(path) => path,
                Err(e) => {
                    error!("[Session {}] Frame {} failed: {}", self.run_id, index, e);
                    return Err(e);
                }
            };

            let work = state.tick_clock().saturating_sub(tick_start);
            self.metrics.record_tick(work, interval);

            if let Some(progress) = &self.progress {
                // A dropped receiver only means nobody is listening.
                let _ = progress.send(FrameProgress {
                    index,
                    path: path.clone(),
                });
            }
            debug!("[Session {}] Wrote #{} {}", self.run_id, index, path.display());

            state.next_index += 1;

            let delay = self.pacer.delay_after(state.tick_clock());
            tokio::select! {
                biased;
                _ = self.signal.requested() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let summary = RunSummary {
            run_id: self.run_id,
            first_index: self.start_index,
            next_index: state.next_index,
            frames_written: state.next_index - self.start_index,
            elapsed: state.tick_clock(),
            stop_reason: self.signal.reason().unwrap_or(StopReason::Manual),
            metrics: self.metrics.snapshot(),
        };

        info!(
            "[Session {}] Stopped ({:?}) after {} frames in {:.1}s",
            self.run_id,
            summary.stop_reason,
            summary.frames_written,
            summary.elapsed.as_secs_f64()
        );
        Ok(summary)
    }

    /// Acquire, stamp and encode one frame off the async runtime.
    async fn tick(&self, index: u64) -> CaptureResult<PathBuf> {
        let captured_at = Local::now();
        let path = self.namer.path_for(index, &captured_at);

        let source = Arc::clone(&self.source);
        let region = self.region;
        let encoder = self.encoder;
        let add_timestamp = self.add_timestamp;
        let target = path.clone();

        tokio::task::spawn_blocking(move || -> CaptureResult<()> {
            let mut frame = Frame::new(source.grab(&region)?, captured_at);
            if !frame.matches(&region) {
                return Err(CaptureError::Acquisition(format!(
                    "Source returned {}x{} for a {}x{} region",
                    frame.width(),
                    frame.height(),
                    region.width,
                    region.height
                )));
            }

            if add_timestamp {
                let text = timestamp_text(&frame.captured_at);
                stamp_timestamp(&mut frame.image, &text);
            }

            encoder
                .encode(&frame.image, &target)
                .map_err(|source| CaptureError::Encode { path: target.clone(), source })
        })
        .await
        .map_err(|e| CaptureError::Worker(e.to_string()))??;

        Ok(path)
    }
}
