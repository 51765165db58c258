//! trash_detect - live trash detection over a camera feed
//!
//! This binary:
//! 1. Loads the detector model (ONNX via tract, or `stub://` for dry runs)
//! 2. Opens and warms up the camera
//! 3. Captures, detects, annotates, and displays frames until the quit key is pressed

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use trash_detect::camera::{Camera, FrameSource};
use trash_detect::config::TrashDetectConfig;
use trash_detect::detect::{open_backend, Detector};
use trash_detect::display::{open_display, DisplayMode};
use trash_detect::pipeline::{LoopOptions, Pipeline, StopSignal};
use trash_detect::render::{LabelFont, Renderer};
use trash_detect::ui::{Ui, UiMode};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Model weights (ONNX), or stub://<name> for the stub backend.
    #[arg(long)]
    model: Option<String>,
    /// Class names file, one name per line.
    #[arg(long)]
    labels: Option<PathBuf>,
    /// Camera device path, or stub://<name> for a synthetic camera.
    #[arg(long)]
    camera: Option<String>,
    /// Display mode: auto, window or headless.
    #[arg(long, value_name = "MODE")]
    display: Option<String>,
    /// Stop after this many frames.
    #[arg(long, env = "TRASH_DETECT_FRAMES")]
    frames: Option<u64>,
    /// Print each frame's detections as a JSON line on stdout.
    #[arg(long, env = "TRASH_DETECT_JSON")]
    json: bool,
    /// Startup progress style.
    #[arg(long, value_enum, default_value_t = UiMode::Auto, value_name = "MODE")]
    ui: UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = TrashDetectConfig::load()?;
    apply_args(&mut cfg, &args)?;
    cfg.validate()?;

    let ui = Ui::detect(args.ui);

    let stage = ui.stage("load model");
    let backend = open_backend(&cfg.model)?;
    let mut detector = match &cfg.scratch_dir {
        Some(dir) => Detector::with_scratch_dir(backend, dir.clone()),
        None => Detector::new(backend),
    };
    detector
        .warm_up()
        .with_context(|| format!("warm up model {}", cfg.model.path))?;
    stage.finish();

    let font = LabelFont::discover(cfg.render.font_path.as_deref())?;
    log::info!("label font: {}", font.source().display());

    let stage = ui.stage("start camera");
    let mut camera = Camera::new(cfg.camera.clone())?;
    camera.start()?;
    stage.finish();

    let display = open_display(&cfg.display)?;
    let stop = StopSignal::install_ctrlc()?;
    let options = LoopOptions {
        quit_key: cfg.display.quit_key,
        key_wait: cfg.display.key_wait,
        max_frames: args.frames,
    };

    let mut pipeline = Pipeline::new(
        Box::new(camera),
        detector,
        Renderer::new(cfg.render.style),
        font,
        display,
        options,
    )
    .with_stop_signal(stop);
    if args.json {
        pipeline = pipeline.with_report(Box::new(std::io::stdout()));
    }

    let summary = pipeline.run()?;
    eprintln!(
        "Done: {} frame(s), {} detection(s), stopped by {:?}",
        summary.frames, summary.detections, summary.reason
    );
    Ok(())
}

fn apply_args(cfg: &mut TrashDetectConfig, args: &Args) -> Result<()> {
    if let Some(model) = &args.model {
        cfg.model.path = model.clone();
    }
    if let Some(labels) = &args.labels {
        cfg.model.labels_path = Some(labels.clone());
    }
    if let Some(camera) = &args.camera {
        cfg.camera.device = camera.clone();
    }
    if let Some(mode) = &args.display {
        cfg.display.mode = DisplayMode::parse(mode)?;
    }
    Ok(())
}
