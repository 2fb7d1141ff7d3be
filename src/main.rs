use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use objscope::driver::DriverEvent;
use objscope::source::{CameraSettings, PlaybackMode};
use objscope::views::StreamFrame;
use objscope::{CameraView, Config, DetectionContext, ImageView, VideoView, ViewModel};

#[derive(Parser)]
#[command(name = "objscope")]
#[command(about = "Detect objects in images, videos and camera streams")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// ONNX detection model (overrides the config file)
    #[arg(long, global = true, value_name = "ONNX")]
    model: Option<PathBuf>,

    /// Font used for box captions (overrides the config file)
    #[arg(long, global = true, value_name = "TTF")]
    font: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect objects in a single image
    Image {
        #[arg(value_name = "IMAGE")]
        path: PathBuf,

        /// Write the annotated image here
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Run detection over an animated GIF or a directory of frames
    Video {
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Write every annotated frame into this directory
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Process every frame instead of following the playback clock
        #[arg(long)]
        every_frame: bool,
    },
    /// Run detection on a live camera
    Camera {
        /// V4L2 device (overrides the config file)
        #[arg(long)]
        device: Option<String>,

        /// Stop after this many processed frames
        #[arg(long, default_value_t = 100)]
        frames: usize,

        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
    },
    /// Open the desktop interface
    #[cfg(feature = "gui")]
    Gui,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_or_default(self.config.as_deref())?;
        if let Some(model) = &self.model {
            config.model.path = Some(model.clone());
        }
        if let Some(font) = &self.font {
            config.render.font_path = Some(font.clone());
        }
        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = cli.load_config()?;

    #[cfg(feature = "gui")]
    if matches!(cli.command, Command::Gui) {
        return objscope::gui::run(config);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    runtime.block_on(run(cli, config))
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let ctx = DetectionContext::from_config(&config)?;
    ctx.adapter.ensure_model_ready().await?;
    match cli.command {
        Command::Image { path, output } => run_image(ctx, &path, output.as_deref()).await,
        Command::Video {
            path,
            out_dir,
            every_frame,
        } => {
            let mode = if every_frame {
                PlaybackMode::EveryFrame
            } else {
                PlaybackMode::Realtime
            };
            run_video(ctx, path, mode, out_dir.as_deref(), cli.verbose).await
        }
        Command::Camera {
            device,
            frames,
            out_dir,
        } => run_camera(ctx, device, frames, out_dir.as_deref(), cli.verbose).await,
        #[cfg(feature = "gui")]
        Command::Gui => Ok(()),
    }
}

async fn run_image(ctx: DetectionContext, path: &Path, output: Option<&Path>) -> Result<()> {
    info!("Loading image: {}", path.display());
    let mut view = ImageView::new(ctx);
    let result = view.open(path).await?;

    print_report(&result.view);
    if let Some(output) = output {
        result
            .annotated()
            .save(output)
            .with_context(|| format!("failed to write {}", output.display()))?;
        println!("\nAnnotated image written to {}", output.display());
    }
    Ok(())
}

async fn run_video(
    ctx: DetectionContext,
    path: PathBuf,
    mode: PlaybackMode,
    out_dir: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    prepare_out_dir(out_dir)?;
    let mut view = VideoView::new(ctx, mode);
    view.upload(path);
    view.toggle_playback().await?;

    let mut written = 0usize;
    while let Some(event) = view.stream_mut().next_event().await {
        let done = matches!(event, DriverEvent::Ended { .. } | DriverEvent::Failed { .. });
        if view.apply(event) && !done {
            if let Some(frame) = view.stream().latest() {
                written = handle_frame(frame, written, out_dir, verbose)?;
            }
        }
        if done {
            break;
        }
    }
    if let Some(err) = view.stream().error() {
        return Err(err.clone().into());
    }

    println!("\nProcessed {written} frame(s)");
    print_report(&view.view_model());
    Ok(())
}

async fn run_camera(
    ctx: DetectionContext,
    device: Option<String>,
    frames: usize,
    out_dir: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    prepare_out_dir(out_dir)?;
    let mut settings = CameraSettings::from(&ctx.stream);
    if let Some(device) = device {
        settings.device = device;
    }
    let mut view = CameraView::new(ctx).with_settings(settings);
    view.start().await?;

    let mut written = 0usize;
    while written < frames {
        let Some(event) = view.stream_mut().next_event().await else {
            break;
        };
        let done = matches!(event, DriverEvent::Ended { .. } | DriverEvent::Failed { .. });
        if view.apply(event) && !done {
            if let Some(frame) = view.stream().latest() {
                written = handle_frame(frame, written, out_dir, verbose)?;
            }
        }
        if done {
            break;
        }
    }
    let report = view.view_model();
    let failure = view.stream().error().cloned();
    view.stop_camera();
    if let Some(err) = failure {
        return Err(err.into());
    }

    println!("\nProcessed {written} frame(s)");
    print_report(&report);
    Ok(())
}

fn prepare_out_dir(dir: Option<&Path>) -> Result<()> {
    if let Some(dir) = dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    Ok(())
}

fn handle_frame(
    frame: &StreamFrame,
    written: usize,
    out_dir: Option<&Path>,
    verbose: bool,
) -> Result<usize> {
    let stats = &frame.view.stats;
    if verbose {
        println!(
            "frame {:>5}: {} object(s), {} ms, {} fps",
            written + 1,
            stats.object_count,
            stats.processing_millis,
            frame.fps
        );
    }
    if let Some(dir) = out_dir {
        let path = dir.join(format!("frame_{:05}.png", written + 1));
        frame
            .annotated()
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(written + 1)
}

fn print_report(view: &ViewModel) {
    let stats = &view.stats;
    println!("\n=== Detection Results ===");
    println!("Objects detected: {}", stats.object_count);
    println!("Average confidence: {}%", stats.average_confidence_pct);
    println!("Processing time: {} ms", stats.processing_millis);
    if let Some(fps) = stats.fps {
        println!("FPS: {fps}");
    }
    if stats.source_width > 0 {
        println!("Resolution: {}x{}", stats.source_width, stats.source_height);
    }

    if view.legend.is_empty() {
        println!("\nNo objects detected.");
        return;
    }

    println!("\nLegend:");
    for entry in &view.legend {
        println!("  {} {} ({})", entry.color.hex, entry.label, entry.count);
    }

    println!("\nDetections:");
    for row in &view.details {
        println!(
            "  {:<16} {:>3}%  {}x{}",
            row.label, row.confidence_pct, row.width, row.height
        );
    }
}
