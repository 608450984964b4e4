use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use vidcut::{
    config::Config,
    edit::{CropRect, EditingSession, ResizeTarget},
    export::{ExportState, ExportWorker, OutputFormat},
    logging,
    video::{
        ffmpeg, types::format_timestamp, DryRunEncoder, EncoderBackend, FfmpegEncoder,
        FfmpegOpener, SyntheticSource, VideoCodec, VideoSource,
    },
};

#[derive(Parser)]
#[command(
    name = "vidcut",
    version,
    about = "Cut, crop, resize and export video segments",
    long_about = "vidcut selects a frame range from a video, optionally crops and resizes it, and exports the result as a video file, a single snapshot, or a numbered image sequence next to the input."
)]
struct Cli {
    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show stream metadata and encoder availability
    Info {
        /// Video file (mp4, avi, mov)
        input: PathBuf,
    },

    /// Export a segment, snapshot, or image sequence
    Export(ExportArgs),

    /// Write the default configuration to a TOML file
    InitConfig {
        /// Destination file
        path: PathBuf,
    },
}

#[derive(Args)]
struct ExportArgs {
    /// Video file (mp4, avi, mov)
    input: PathBuf,

    /// `.jpg`/`.png` snapshot, `*.jpg`/`*.png` sequence, or a container such as `.mp4`
    #[arg(short, long, default_value = ".mp4")]
    format: String,

    /// First frame of the segment
    #[arg(long)]
    begin: Option<usize>,

    /// End of the segment (exclusive)
    #[arg(long)]
    end: Option<usize>,

    /// Crop rectangle `x1,y1,x2,y2`
    #[arg(long)]
    crop: Option<CropRect>,

    /// Output size `WIDTHxHEIGHT`
    #[arg(long)]
    resize: Option<ResizeTarget>,

    /// Playback speed (0.1 - 10)
    #[arg(long)]
    speed: Option<f64>,

    /// Frame to snapshot for `.jpg`/`.png` (defaults to the segment start)
    #[arg(long)]
    frame: Option<usize>,

    /// Use a generated video with this many frames instead of decoding the input
    #[arg(long, value_name = "FRAMES")]
    synthetic: Option<usize>,

    /// Skip video encoding and only report what would be written
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(config_path) => Config::from_file(config_path)
            .with_context(|| format!("loading {}", config_path.display()))?,
        None => Config::default(),
    };

    logging::init_logging(&config.logging, cli.verbose);
    info!("Starting vidcut v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Info { input } => show_info(&input, &config),
        Command::Export(args) => run_export(args, &config).await,
        Command::InitConfig { path } => {
            Config::default().save_to_file(&path)?;
            info!("Default configuration written to {}", path.display());
            Ok(())
        }
    }
}

fn show_info(input: &Path, config: &Config) -> Result<()> {
    let metadata = ffmpeg::probe(&config.export.ffprobe_path, input)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    println!("File:       {}", input.display());
    println!("Codec:      {}", metadata.codec);
    println!("Resolution: {}x{}", metadata.width, metadata.height);
    println!("Frames:     {}", metadata.frame_count);
    println!("Frame rate: {:.3} fps", metadata.fps);
    println!("Duration:   {}", format_timestamp(metadata.duration()));

    let ffmpeg_ok = ffmpeg::check_available(&config.export.ffmpeg_path);
    println!("ffmpeg:     {}", if ffmpeg_ok { "available" } else { "not found" });
    if ffmpeg_ok {
        let encoder = FfmpegEncoder::new(&config.export.ffmpeg_path);
        let default_codec = config.export.codec.unwrap_or_else(VideoCodec::platform_default);
        for codec in [VideoCodec::H264, VideoCodec::Xvid, VideoCodec::Mp4v] {
            println!(
                "  {:<5} {:<9} {}{}",
                codec.fourcc(),
                codec.ffmpeg_encoder(),
                if encoder.is_available(codec) { "yes" } else { "no" },
                if codec == default_codec { " (export default)" } else { "" }
            );
        }
    }
    Ok(())
}

async fn run_export(args: ExportArgs, config: &Config) -> Result<()> {
    let format: OutputFormat = args.format.parse()?;
    let mut session = EditingSession::new(config);

    let metadata = match args.synthetic {
        Some(frames) => {
            info!("Using a synthetic {}-frame source", frames);
            let opener = move |_: &Path| -> vidcut::Result<Box<dyn VideoSource>> {
                Ok(Box::new(SyntheticSource::new(frames, 30.0, 640, 360)))
            };
            session.load_video(&args.input, &opener)?.clone()
        }
        None => {
            let opener = FfmpegOpener::new(&config.export.ffmpeg_path, &config.export.ffprobe_path);
            session
                .load_video(&args.input, &opener)
                .map_err(|e| anyhow::anyhow!(e.user_message()))?
                .clone()
        }
    };

    if args.begin.is_some() || args.end.is_some() {
        session.confirm_segment(
            args.begin.unwrap_or(0),
            args.end.unwrap_or(metadata.frame_count),
        )?;
    }
    if let Some(rect) = args.crop {
        let clamped = rect.clamped_to(metadata.width, metadata.height).ok_or_else(|| {
            anyhow::anyhow!(
                "crop {},{},{},{} lies outside the {}x{} frame",
                rect.x1(),
                rect.y1(),
                rect.x2(),
                rect.y2(),
                metadata.width,
                metadata.height
            )
        })?;
        if clamped != rect {
            warn!(
                "Crop clamped to the frame: {},{},{},{}",
                clamped.x1(),
                clamped.y1(),
                clamped.x2(),
                clamped.y2()
            );
        }
        session.confirm_crop(clamped)?;
    }
    if let Some(target) = args.resize {
        session.confirm_resize(target.width(), target.height())?;
    }
    if let Some(speed) = args.speed {
        session.confirm_speed(speed);
    }
    if let OutputFormat::Image(_) = format {
        let frame = args.frame.unwrap_or(session.state().segment_begin());
        session.preview_frame(frame)?;
    }

    let job = session.export_job(&format)?;
    let backend: Arc<dyn EncoderBackend> = if args.dry_run {
        Arc::new(DryRunEncoder::new())
    } else {
        Arc::new(FfmpegEncoder::new(&config.export.ffmpeg_path))
    };

    let worker = ExportWorker::new(session.executor().clone());
    let task = worker.spawn(job, session.source()?.clone(), backend)?;

    let mut progress = task.progress();
    let mut last_decile = 0;
    while progress.changed().await.is_ok() {
        let update = *progress.borrow();
        let decile = (update.percent() / 10.0) as u32;
        if decile > last_decile {
            last_decile = decile;
            info!(
                "Saved {}/{} frames ({:.0}%)",
                update.frames_written,
                update.total_frames,
                update.percent()
            );
        }
    }

    match task.wait().await {
        Ok(summary) => {
            for output in &summary.outputs {
                info!("Saved {}", output.display());
            }
            info!(
                "Done: {} frames at {}x{}",
                summary.frames_written, summary.width, summary.height
            );
            Ok(())
        }
        Err(e) => {
            if config.export.discard_partial_output {
                if let ExportState::Failed { partial_outputs, .. } = worker.state() {
                    for path in partial_outputs {
                        match std::fs::remove_file(&path) {
                            Ok(()) => info!("Removed partial output {}", path.display()),
                            Err(err) => warn!("Could not remove {}: {}", path.display(), err),
                        }
                    }
                }
            }
            Err(anyhow::anyhow!(e.user_message()))
        }
    }
}
