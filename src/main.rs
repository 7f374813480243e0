mod actuation;
mod capture;
mod classify;
mod error;
mod output;
mod pipeline;
mod segmentation;

use actuation::{ActuatorLink, ServoChannel};
use anyhow::{bail, Context, Result};
use capture::{CaptureSource, ImageSequence, WebcamCapture};
use clap::Parser;
use output::{LoopbackPreview, OutputSink};
use pipeline::{run_pipeline, SortingContext};
use segmentation::{ColorSegmenter, HsvRange};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Serial device of the servo controller
    /// If not provided, the first USB/ACM serial port is used
    #[arg(short, long)]
    port: Option<String>,

    /// Serial line speed
    #[arg(long, default_value_t = actuation::BAUD_RATE)]
    baud: u32,

    /// Wait after opening the port while the controller resets (ms)
    #[arg(long, default_value_t = actuation::RESET_DELAY.as_millis() as u64)]
    reset_delay_ms: u64,

    /// Pause after each servo command (ms)
    #[arg(long, default_value_t = actuation::SETTLE_DELAY.as_millis() as u64)]
    settle_ms: u64,

    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    input_device: u32,

    /// Capture resolution width
    #[arg(long, default_value_t = 1280)]
    capture_width: u32,

    /// Capture resolution height
    #[arg(long, default_value_t = 720)]
    capture_height: u32,

    /// Replay still images from this directory instead of the webcam
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// v4l2loopback device receiving annotated frames
    #[arg(long)]
    preview_device: Option<String>,

    /// Lower HSV bound (H 0-179, S 0-255, V 0-255)
    #[arg(long, value_delimiter = ',', default_values_t = [30u8, 50, 50])]
    hsv_lower: Vec<u8>,

    /// Upper HSV bound (H 0-179, S 0-255, V 0-255)
    #[arg(long, value_delimiter = ',', default_values_t = [85u8, 255, 255])]
    hsv_upper: Vec<u8>,

    /// Stop after this many frames (0 = run until stopped)
    #[arg(long, default_value_t = 0)]
    max_frames: u64,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let range = hsv_range(&args.hsv_lower, &args.hsv_upper)?;

    tracing::info!("Camsort starting");
    tracing::info!("HSV range: {:?} - {:?}", range.lower, range.upper);

    // The controller link must be up before anything else starts
    let port = match &args.port {
        Some(port) => port.clone(),
        None => actuation::discover_port().context("Servo controller not detected")?,
    };
    let link = ServoChannel::open(
        &port,
        args.baud,
        Duration::from_millis(args.reset_delay_ms),
    )
    .context("Failed to connect to servo controller")?
    .with_settle(Duration::from_millis(args.settle_ms));

    // Initialize capture
    let mut capture: Box<dyn CaptureSource> = match &args.frames_dir {
        Some(dir) => Box::new(ImageSequence::new(dir).context("Failed to open frame directory")?),
        None => Box::new(
            WebcamCapture::new(args.input_device, args.capture_width, args.capture_height)
                .context("Failed to initialize webcam capture")?,
        ),
    };

    // Initialize preview output if requested
    let mut preview = match &args.preview_device {
        Some(device) => {
            let (width, height) = capture.resolution();
            Some(
                LoopbackPreview::new(device, width, height)
                    .context("Failed to initialize preview output")?,
            )
        }
        None => None,
    };

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("Failed to install Ctrl+C handler")?;
    }

    let mut context = SortingContext::new(Box::new(ColorSegmenter::new(range)), link);

    // Main loop
    let summary = run_pipeline(
        capture.as_mut(),
        &mut context,
        preview.as_mut().map(|p| p as &mut dyn OutputSink),
        &stop,
        args.max_frames,
    )?;

    tracing::info!(
        "Processed {} frames, sent {} commands (small={}, medium={}, large={}), link {} {}",
        summary.frames,
        summary.commands,
        summary.totals.small,
        summary.totals.medium,
        summary.totals.large,
        context.link().name(),
        if context.link().is_open() { "open" } else { "closed" }
    );

    Ok(())
}

fn hsv_range(lower: &[u8], upper: &[u8]) -> Result<HsvRange> {
    let (Ok(lower), Ok(upper)) = (<[u8; 3]>::try_from(lower), <[u8; 3]>::try_from(upper)) else {
        bail!("HSV bounds need exactly three values each (H,S,V)");
    };
    if lower.iter().zip(&upper).any(|(lo, hi)| lo > hi) {
        bail!("HSV lower bound {:?} exceeds upper bound {:?}", lower, upper);
    }
    Ok(HsvRange::new(lower, upper))
}
