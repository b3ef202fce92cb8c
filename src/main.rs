//! region-timelapse: capture a fixed screen region into a numbered image
//! sequence for timelapse assembly.
//!
//! Press Enter or Ctrl+C to stop a recording early.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use region_timelapse::capture::{self, CaptureRegion};
use region_timelapse::config::{OutputFormat, Settings};
use region_timelapse::platform::{self, VirtualScreen};
use region_timelapse::recording::{CommandOutcome, Recorder, RecorderCommand, StartRequest};
use region_timelapse::{storage, validation};

/// Region Timelapse - fixed-region screen capture
#[derive(Parser, Debug)]
#[command(name = "region-timelapse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture a region until stopped
    Record(RecordArgs),
    /// List monitors and the virtual screen
    Displays,
    /// Move existing files in the output folder into a BackUP_NN folder
    Backup {
        /// Folder to rotate (defaults to the configured output folder)
        #[arg(long)]
        folder: Option<PathBuf>,
    },
}

#[derive(Parser, Debug)]
struct RecordArgs {
    /// Region as x,y,width,height in virtual-screen pixels
    #[arg(long, allow_hyphen_values = true)]
    region: Option<CaptureRegion>,

    /// Frames per second (1-120)
    #[arg(long)]
    fps: Option<f64>,

    /// Output folder
    #[arg(long)]
    folder: Option<PathBuf>,

    /// Filename prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Image format: png, jpeg, tiff, bmp
    #[arg(long)]
    format: Option<String>,

    /// Zero-padded sequence width (1-12)
    #[arg(long)]
    digits: Option<u8>,

    /// First sequence number
    #[arg(long)]
    start: Option<u64>,

    /// Stamp the capture time into filenames and pixels
    #[arg(long)]
    timestamp: bool,

    /// JPEG quality (1-100)
    #[arg(long)]
    jpeg_quality: Option<u32>,

    /// Auto-stop minutes (0-999)
    #[arg(long)]
    auto_stop_min: Option<u32>,

    /// Auto-stop seconds (0.1-59.9)
    #[arg(long)]
    auto_stop_sec: Option<f64>,

    /// Record until stopped manually
    #[arg(long, conflicts_with_all = ["auto_stop_min", "auto_stop_sec"])]
    no_auto_stop: bool,

    /// Keep existing files in place instead of moving them to BackUP_NN
    #[arg(long)]
    no_backup: bool,

    /// Persist the effective settings before recording
    #[arg(long)]
    save_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Record(args) => record(settings, args, cli.config).await,
        Commands::Displays => displays(),
        Commands::Backup { folder } => backup(folder.unwrap_or(settings.run.folder)),
    }
}

/// Merges flags over loaded settings and checks every range.
fn apply_overrides(settings: &mut Settings, args: &RecordArgs) -> Result<()> {
    let run = &mut settings.run;
    if let Some(folder) = &args.folder {
        run.folder = folder.clone();
    }
    if let Some(prefix) = &args.prefix {
        run.prefix = prefix.clone();
    }
    if let Some(format) = &args.format {
        run.format = OutputFormat::from_name(format);
    }
    if let Some(digits) = args.digits {
        run.digits = digits;
    }
    if let Some(start) = args.start {
        run.start_index = start;
    }
    if args.timestamp {
        run.add_timestamp = true;
    }
    if let Some(quality) = args.jpeg_quality {
        run.jpeg_quality = quality;
    }
    if args.no_backup {
        run.rotate_existing = false;
    }
    if let Some(fps) = args.fps {
        settings.fps = fps;
    }

    let auto_stop = &mut settings.auto_stop;
    if args.no_auto_stop {
        auto_stop.enabled = false;
    }
    if let Some(minutes) = args.auto_stop_min {
        auto_stop.minutes = minutes;
        auto_stop.enabled = true;
    }
    if let Some(seconds) = args.auto_stop_sec {
        auto_stop.seconds = seconds;
        auto_stop.enabled = true;
    }

    validation::validate_prefix(&settings.run.prefix)?;
    validation::validate_fps(settings.fps)?;
    validation::validate_digits(settings.run.digits)?;
    validation::validate_start_index(settings.run.start_index)?;
    validation::validate_jpeg_quality(settings.run.jpeg_quality)?;
    if settings.auto_stop.enabled {
        validation::validate_auto_stop(settings.auto_stop.minutes, settings.auto_stop.seconds)?;
    }
    Ok(())
}

/// Clamps the region to the desktop when the monitor layout is known.
fn resolve_region(region: CaptureRegion) -> CaptureRegion {
    match platform::virtual_screen() {
        Ok(screen) => {
            let clamped = region.clamp_to(&screen);
            if clamped != region {
                info!("[Main] Region adjusted to [{}]", clamped);
            }
            clamped
        }
        Err(e) => {
            warn!("[Main] Could not read monitor layout ({:#}), using region as given", e);
            region.make_even()
        }
    }
}

async fn record(mut settings: Settings, args: RecordArgs, config_path: Option<PathBuf>) -> Result<()> {
    apply_overrides(&mut settings, &args)?;

    let Some(region) = args.region.or(settings.region) else {
        bail!("No capture region configured; pass --region x,y,width,height");
    };
    let region = resolve_region(region);

    if args.save_config {
        settings.region = Some(region);
        match config_path.or_else(Settings::default_path) {
            Some(path) => settings.save(&path)?,
            None => warn!("[Main] No config directory available, settings not saved"),
        }
    }

    let recorder = Recorder::new(Arc::new(capture::create_screen_source()));
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();

    let request = StartRequest::new(region, settings.fps, settings.run.clone())
        .with_auto_stop(settings.auto_stop.duration())
        .with_progress(progress_tx);

    let handle = match recorder.execute(RecorderCommand::Start(request)).await {
        Ok(CommandOutcome::Started(handle)) => handle,
        Ok(outcome) => bail!("Recorder did not start: {:?}", outcome),
        Err(e) if e.is_configuration() => {
            return Err(e).context("Recording not started");
        }
        Err(e) => return Err(e.into()),
    };

    info!("[Main] Recording run {} (press Enter or Ctrl+C to stop)", handle.run_id());
    if let Some(duration) = settings.auto_stop.duration() {
        info!("[Main] Auto-stop after {:.1}s", duration.as_secs_f64());
    }

    tokio::spawn(async move {
        while let Some(progress) = progress_rx.recv().await {
            info!("[Frame] #{} -> {}", progress.index, progress.path.display());
        }
    });

    let stopper = recorder.clone();
    tokio::spawn(async move {
        wait_for_stop_trigger().await;
        if let Err(e) = stopper.execute(RecorderCommand::Stop).await {
            warn!("[Main] Stop failed: {}", e);
        }
    });

    match handle.wait().await {
        Ok(summary) => {
            info!(
                "[Main] Done: {} frames ({:?}), next index {}",
                summary.frames_written, summary.stop_reason, summary.next_index
            );
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Err(e) => {
            error!("[Main] Recording failed: {}", e);
            Err(e.into())
        }
    }
}

/// Resolves on Ctrl+C or when a line is entered on stdin.
async fn wait_for_stop_trigger() {
    // Plain thread so a pending read never holds up runtime shutdown.
    let (enter_tx, mut enter_rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        if matches!(std::io::stdin().read_line(&mut line), Ok(n) if n > 0) {
            let _ = enter_tx.send(());
        }
    });

    let enter = async {
        match enter_rx.recv().await {
            Some(()) => info!("[Main] Enter pressed, stopping"),
            None => std::future::pending::<()>().await,
        }
    };

    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("[Main] Ctrl+C received, stopping"),
            Err(e) => {
                warn!("[Main] Ctrl+C handler unavailable: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    tokio::select! {
        _ = enter => {}
        _ = ctrl_c => {}
    }
}

fn displays() -> Result<()> {
    let monitors = capture::screen::list_monitors()?;
    if monitors.is_empty() {
        println!("No monitors found on {}", platform::get_platform_name());
        return Ok(());
    }

    for (i, monitor) in monitors.iter().enumerate() {
        let primary = if monitor.is_primary { " (primary)" } else { "" };
        println!(
            "{}: {} at {},{} size {}x{}{}",
            i, monitor.name, monitor.x, monitor.y, monitor.width, monitor.height, primary
        );
    }

    if let Some(screen) = VirtualScreen::from_monitors(&monitors) {
        println!(
            "Virtual screen: {},{} size {}x{}",
            screen.left,
            screen.top,
            screen.width(),
            screen.height()
        );
    }
    Ok(())
}

fn backup(folder: PathBuf) -> Result<()> {
    match storage::rotate_existing(&folder)
        .with_context(|| format!("Backup of {} failed", folder.display()))?
    {
        Some(dir) => println!("Moved existing files into {}", dir.display()),
        None => println!("Nothing to back up in {}", folder.display()),
    }
    Ok(())
}
