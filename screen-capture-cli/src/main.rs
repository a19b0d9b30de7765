use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use parking_lot::Mutex;
use screen_capture_core::{
    AudioChunk, AudioLevels, CaptureController, CaptureDelegate, CaptureError, CaptureService,
    CaptureSession, CaptureSettings, CaptureTarget, SessionState, VideoFrame,
};
use screen_capture_synthetic::{SyntheticCaptureService, SyntheticOptions};

#[derive(Parser)]
#[command(name = "screen-capture")]
#[command(about = "Capture a display or window from the synthetic backend")]
struct Cli {
    /// JSON settings file (see CaptureSettings)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the displays, windows and applications that can be captured
    List,
    /// Run a capture session and print delivery statistics
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Display to capture
    #[arg(long, conflicts_with = "window", required_unless_present = "window")]
    display: Option<u32>,

    /// Window to capture
    #[arg(long)]
    window: Option<u32>,

    /// How long to capture, in seconds
    #[arg(long, default_value = "3")]
    seconds: u64,

    /// Capture system audio (overrides the settings file)
    #[arg(long)]
    audio: bool,

    /// Bundle id to leave out of a display capture; repeatable
    #[arg(long = "exclude")]
    excluded: Vec<String>,

    /// Simulated acknowledgment latency in milliseconds
    #[arg(long, default_value = "0")]
    ack_latency_ms: u64,
}

/// Prints lifecycle events and counts deliveries.
#[derive(Default)]
struct ConsoleDelegate {
    frames: AtomicU64,
    audio_frames: AtomicU64,
    levels: Mutex<AudioLevels>,
}

impl CaptureDelegate for ConsoleDelegate {
    fn on_state_changed(&self, state: SessionState) {
        println!("state: {}", state);
    }

    fn on_video_frame(&self, _frame: &VideoFrame<'_>) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    fn on_audio_chunk(&self, chunk: &AudioChunk) {
        self.audio_frames.fetch_add(chunk.frame_count() as u64, Ordering::Relaxed);
    }

    fn on_levels_updated(&self, levels: &AudioLevels) {
        *self.levels.lock() = levels.clone();
    }

    fn on_error(&self, error: &CaptureError) {
        eprintln!("\nerror: {}", error);
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => load_settings(path)?,
        None => CaptureSettings::default(),
    };

    match cli.command {
        Command::List => list(),
        Command::Run(args) => run(args, settings),
    }
}

fn load_settings(path: &Path) -> Result<CaptureSettings> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {}", path.display()))?;
    CaptureSettings::from_json(&json).with_context(|| format!("Invalid settings in {}", path.display()))
}

fn list() -> Result<()> {
    let service = SyntheticCaptureService::demo();
    let content = service.shareable_content()?;
    println!("{}", serde_json::to_string_pretty(&content)?);
    Ok(())
}

fn run(args: RunArgs, mut settings: CaptureSettings) -> Result<()> {
    if args.audio {
        settings.captures_audio = true;
    }
    settings.excluded_bundle_ids.extend(args.excluded.iter().cloned());
    settings.validate().map_err(anyhow::Error::msg)?;

    let service = Arc::new(SyntheticCaptureService::with_options(
        screen_capture_synthetic::demo_content(),
        SyntheticOptions {
            ack_latency: Duration::from_millis(args.ack_latency_ms),
            ..Default::default()
        },
    ));
    let target = resolve_target(service.as_ref(), &args)?;

    let session = Arc::new(CaptureSession::with_options(service.clone(), settings.session_options()));
    let delegate = Arc::new(ConsoleDelegate::default());
    session.set_delegate(delegate.clone());
    let controller = CaptureController::new(Arc::clone(&session), &settings);

    println!("Session {}", session.session_id());
    println!("Target: {}", target.describe());
    controller.select_target(target)?;
    controller.start().context("Failed to start capture")?;

    if let Some(pair) = session.effective() {
        println!(
            "Output: {}x{}, queue depth {}, audio {}",
            pair.config.width,
            pair.config.height,
            pair.config.queue_depth,
            if pair.config.captures_audio { "on" } else { "off" }
        );
    }

    let deadline = Instant::now() + Duration::from_secs(args.seconds);
    while Instant::now() < deadline && session.state().is_running() {
        thread::sleep(Duration::from_millis(250));
        let levels = delegate.levels.lock().clone();
        print!(
            "\rFrames: {} | Audio frames: {} | Level: {:.3}    ",
            delegate.frames.load(Ordering::Relaxed),
            delegate.audio_frames.load(Ordering::Relaxed),
            levels.max_level()
        );
        std::io::stdout().flush().ok();
    }
    println!();

    controller.stop().context("Failed to stop capture")?;
    println!("{}", serde_json::to_string_pretty(&session.diagnostics())?);
    Ok(())
}

fn resolve_target(service: &SyntheticCaptureService, args: &RunArgs) -> Result<CaptureTarget> {
    let content = service.shareable_content()?;
    let target = match (args.display, args.window) {
        (Some(id), _) => content
            .display_target(id)
            .with_context(|| format!("No display with id {}", id))?,
        (None, Some(id)) => content
            .window_target(id)
            .with_context(|| format!("No window with id {}", id))?,
        (None, None) => anyhow::bail!("Either --display or --window is required"),
    };
    if target.is_window() && !args.excluded.is_empty() {
        log::warn!("Exclusions are ignored for window captures");
    }
    Ok(target)
}
