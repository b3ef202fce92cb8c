//! End-to-end runs of the recorder against synthetic frame sources.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use tokio::sync::mpsc;
use tokio::time::timeout;

use region_timelapse::capture::{CaptureRegion, FrameSource};
use region_timelapse::config::{OutputFormat, RunConfig};
use region_timelapse::error::{CaptureError, CaptureResult};
use region_timelapse::recording::{
    CommandOutcome, FrameProgress, Recorder, RecorderCommand, StartRequest, StopReason,
};

/// Solid frames whose colour changes every grab.
#[derive(Default)]
struct GradientSource {
    grabs: AtomicU32,
}

impl FrameSource for GradientSource {
    fn grab(&self, region: &CaptureRegion) -> CaptureResult<RgbaImage> {
        let n = self.grabs.fetch_add(1, Ordering::SeqCst);
        let shade = (n % 256) as u8;
        Ok(RgbaImage::from_pixel(region.width, region.height, Rgba([shade, 64, 255 - shade, 255])))
    }

    fn name(&self) -> &str {
        "gradient"
    }
}

/// Fails every grab, like a region that went off-screen.
struct BrokenSource;

impl FrameSource for BrokenSource {
    fn grab(&self, _region: &CaptureRegion) -> CaptureResult<RgbaImage> {
        Err(CaptureError::Acquisition("display disconnected".to_string()))
    }
}

/// Returns pixels that do not match the requested region.
struct WrongSizeSource;

impl FrameSource for WrongSizeSource {
    fn grab(&self, region: &CaptureRegion) -> CaptureResult<RgbaImage> {
        Ok(RgbaImage::new(region.width + 1, region.height))
    }
}

/// Blocks in every grab and records how many grabs overlap.
#[derive(Default)]
struct SlowSource {
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
}

impl FrameSource for SlowSource {
    fn grab(&self, region: &CaptureRegion) -> CaptureResult<RgbaImage> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(300));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(RgbaImage::from_pixel(region.width, region.height, Rgba([10, 20, 30, 255])))
    }
}

fn test_config(folder: &Path) -> RunConfig {
    RunConfig {
        folder: folder.to_path_buf(),
        prefix: "t_".to_string(),
        format: OutputFormat::Png,
        digits: 3,
        start_index: 0,
        add_timestamp: false,
        jpeg_quality: 90,
        rotate_existing: false,
    }
}

fn request(folder: &Path, fps: f64) -> StartRequest {
    StartRequest::new(CaptureRegion::new(0, 0, 4, 2), fps, test_config(folder)).with_min_free_bytes(0)
}

fn file_names(folder: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(folder)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_run_leaves_gap_free_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("frames");
    let recorder = Recorder::new(Arc::new(GradientSource::default()));
    let (tx, mut rx) = mpsc::unbounded_channel::<FrameProgress>();

    let handle = recorder
        .start(request(&folder, 2.0).with_progress(tx))
        .unwrap()
        .expect("recorder was idle");

    let mut received = Vec::new();
    while received.len() < 2 {
        let progress = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("progress within 5s")
            .expect("channel open while running");
        received.push(progress);
    }

    assert!(recorder.stop().await);
    let summary = handle.wait().await.unwrap();
    while let Ok(progress) = rx.try_recv() {
        received.push(progress);
    }

    assert_eq!(summary.stop_reason, StopReason::Manual);
    assert_eq!(summary.first_index, 0);
    assert_eq!(summary.frames_written, received.len() as u64);
    assert_eq!(summary.next_index, received.len() as u64);

    for (i, progress) in received.iter().enumerate() {
        assert_eq!(progress.index, i as u64, "indices must be strictly sequential");
        assert!(progress.path.exists());
    }

    let expected: Vec<String> = (0..received.len()).map(|i| format!("t_{:03}.png", i)).collect();
    assert_eq!(file_names(&folder), expected);

    let first = image::open(folder.join("t_000.png")).unwrap().to_rgba8();
    assert_eq!(first.dimensions(), (4, 2));
}

#[tokio::test]
async fn second_start_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::new(Arc::new(GradientSource::default()));

    let handle = recorder.start(request(dir.path(), 1.0)).unwrap().unwrap();
    assert!(recorder.is_running());
    assert!(recorder.start(request(dir.path(), 1.0)).unwrap().is_none());

    assert!(recorder.stop().await);
    assert!(!recorder.stop().await, "a stopping run is not stopped twice");

    let summary = handle.wait().await.unwrap();
    assert_eq!(summary.stop_reason, StopReason::Manual);
    assert!(!recorder.is_running());
    assert!(!recorder.stop().await);
}

#[tokio::test]
async fn invalid_region_fails_before_any_io() {
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("never-created");
    let recorder = Recorder::new(Arc::new(GradientSource::default()));

    let bad = StartRequest::new(CaptureRegion::new(0, 0, 1, 5), 5.0, test_config(&folder));
    let err = recorder.start(bad).unwrap_err();

    assert!(matches!(err, CaptureError::InvalidRegion(_)));
    assert!(err.is_configuration());
    assert!(!folder.exists());
    assert!(!recorder.is_running());
}

#[tokio::test]
async fn empty_folder_is_rejected() {
    let recorder = Recorder::new(Arc::new(GradientSource::default()));
    let config = test_config(Path::new(""));

    let err = recorder
        .start(StartRequest::new(CaptureRegion::new(0, 0, 4, 4), 5.0, config))
        .unwrap_err();
    assert!(matches!(err, CaptureError::MissingFolder));
}

#[tokio::test]
async fn folder_that_is_a_file_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("occupied");
    std::fs::write(&blocker, b"not a folder").unwrap();

    let recorder = Recorder::new(Arc::new(GradientSource::default()));
    let err = recorder.start(request(&blocker, 5.0)).unwrap_err();

    assert!(matches!(err, CaptureError::FolderUnavailable { .. }));
    assert!(err.is_configuration());
}

#[tokio::test]
async fn acquisition_failure_ends_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::new(Arc::new(BrokenSource));

    let handle = recorder.start(request(dir.path(), 10.0)).unwrap().unwrap();
    let err = timeout(Duration::from_secs(5), handle.wait())
        .await
        .unwrap()
        .unwrap_err();

    assert!(matches!(err, CaptureError::Acquisition(_)));
    assert!(!err.is_configuration());
    assert!(!recorder.is_running());
    assert!(file_names(dir.path()).is_empty());
}

#[tokio::test]
async fn mismatched_frame_size_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::new(Arc::new(WrongSizeSource));

    let handle = recorder.start(request(dir.path(), 10.0)).unwrap().unwrap();
    let err = timeout(Duration::from_secs(5), handle.wait())
        .await
        .unwrap()
        .unwrap_err();

    assert!(matches!(err, CaptureError::Acquisition(_)));
    assert!(file_names(dir.path()).is_empty());
}

#[tokio::test]
async fn auto_stop_ends_run() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::new(Arc::new(GradientSource::default()));

    let handle = recorder
        .start(request(dir.path(), 20.0).with_auto_stop(Some(Duration::from_millis(300))))
        .unwrap()
        .unwrap();

    let summary = timeout(Duration::from_secs(5), handle.wait())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::AutoStop);
    assert!(summary.frames_written >= 1);
    assert_eq!(file_names(dir.path()).len() as u64, summary.frames_written);
    assert!(!recorder.is_running());
}

#[tokio::test]
async fn existing_files_are_rotated_before_start() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("old.png"), b"previous run").unwrap();

    let recorder = Recorder::new(Arc::new(GradientSource::default()));
    let mut req = request(dir.path(), 5.0);
    req.config.rotate_existing = true;

    let handle = recorder.start(req).unwrap().unwrap();
    let summary = handle.stop().await.unwrap();

    assert!(dir.path().join("BackUP_01").join("old.png").exists());
    assert!(!dir.path().join("old.png").exists());
    assert_eq!(file_names(dir.path()).len() as u64, summary.frames_written);
}

#[tokio::test]
async fn toggle_starts_then_stops() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::new(Arc::new(GradientSource::default()));

    let handle = match recorder
        .execute(RecorderCommand::Toggle(request(dir.path(), 5.0)))
        .await
        .unwrap()
    {
        CommandOutcome::Started(handle) => handle,
        other => panic!("expected a start, got {:?}", other),
    };
    assert!(recorder.is_running());

    let outcome = recorder
        .execute(RecorderCommand::Toggle(request(dir.path(), 5.0)))
        .await
        .unwrap();
    assert!(matches!(outcome, CommandOutcome::Stopped));
    assert!(matches!(
        recorder.execute(RecorderCommand::Stop).await.unwrap(),
        CommandOutcome::NotRunning
    ));

    assert_eq!(handle.wait().await.unwrap().stop_reason, StopReason::Manual);
}

#[tokio::test]
async fn timestamped_jpeg_frames_use_canonical_extension() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::new(Arc::new(GradientSource::default()));

    let mut req = StartRequest::new(CaptureRegion::new(0, 0, 64, 32), 10.0, test_config(dir.path()))
        .with_min_free_bytes(0);
    req.config.format = OutputFormat::from_name("JPG");
    req.config.add_timestamp = true;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = recorder.start(req.with_progress(tx)).unwrap().unwrap();

    let first = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
    handle.stop().await.unwrap();

    let name = first.path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("t_000_"), "{}", name);
    assert!(name.ends_with(".jpeg"), "{}", name);
    let decoded = image::open(&first.path).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (64, 32));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_during_wind_down_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(SlowSource::default());
    let recorder = Recorder::new(source.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let first = recorder
        .start(request(dir.path(), 100.0).with_progress(tx))
        .unwrap()
        .unwrap();

    // The first frame is done; the next grab is under way.
    timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(recorder.stop().await);
    assert!(recorder.is_running(), "last frame is still being captured");
    assert!(recorder.is_stopping());
    assert!(recorder.start(request(dir.path(), 100.0)).unwrap().is_none());

    let summary = first.wait().await.unwrap();
    assert!(!recorder.is_running());
    assert_eq!(file_names(dir.path()).len() as u64, summary.frames_written);

    let second = recorder.start(request(dir.path(), 100.0)).unwrap().unwrap();
    second.stop().await.unwrap();

    assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stop_interrupts_pacing_sleep() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::new(Arc::new(GradientSource::default()));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = recorder
        .start(request(dir.path(), 1.0).with_progress(tx))
        .unwrap()
        .unwrap();
    timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();

    let stopped_at = Instant::now();
    let summary = handle.stop().await.unwrap();
    let latency = stopped_at.elapsed();

    assert!(latency < Duration::from_millis(200), "stop took {:?}", latency);
    assert_eq!(summary.frames_written, 1);
    assert_eq!(summary.stop_reason, StopReason::Manual);
}

#[tokio::test]
async fn odd_region_is_captured_even() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::new(Arc::new(GradientSource::default()));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let req = StartRequest::new(CaptureRegion::new(0, 0, 5, 3), 5.0, test_config(dir.path()))
        .with_min_free_bytes(0)
        .with_progress(tx);
    let handle = recorder.start(req).unwrap().unwrap();

    let first = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
    handle.stop().await.unwrap();

    let frame = image::open(&first.path).unwrap();
    assert_eq!((frame.width(), frame.height()), (4, 2));
}
