use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use clip_compositor::{
    composition::{ConcatMode, ConcatenationEngine, TransitionKind},
    config::Config,
    effects::EffectKind,
    video::{ClipLoader, VideoEncoder},
    CompositorError,
};

#[derive(Parser)]
#[command(
    name = "clip-compositor",
    version,
    about = "Join clips into one video with transitions",
    long_about = "Clip-Compositor normalizes clips of mixed frame rates and resolutions onto a shared target, joins them with hard cuts or transitions, and encodes the result with ffmpeg."
)]
struct Cli {
    /// Input clips: video files, image files or directories of numbered frames, in order
    #[arg(short, long = "input", required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// Output video file, or frame directory with --frames-only
    #[arg(short, long)]
    output: PathBuf,

    /// How clips are joined
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,

    /// Transition kind (none, crossfade, fade_black, fade_white, slide_left, slide_right, zoom_in, zoom_out)
    #[arg(short, long)]
    transition: Option<TransitionKind>,

    /// Transition duration in seconds
    #[arg(short, long)]
    duration: Option<f64>,

    /// Output frame rate (the first clip's rate otherwise)
    #[arg(long)]
    fps: Option<f64>,

    /// Frame rate assumed for image sequences
    #[arg(long)]
    input_fps: Option<f64>,

    /// Seconds a single still image is shown
    #[arg(long)]
    still_duration: Option<f64>,

    /// Effect applied after grading (blur, sharpen, mirror_x, mirror_y, speed_up, slow_down, noise, vignette)
    #[arg(short, long)]
    effect: Option<EffectKind>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write PNG frames instead of encoding a video
    #[arg(long)]
    frames_only: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Simple,
    Transition,
}

impl From<ModeArg> for ConcatMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Simple => ConcatMode::Simple,
            ModeArg::Transition => ConcatMode::Transition,
        }
    }
}

impl Cli {
    /// Command-line flags win over the configuration file
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(mode) = self.mode {
            config.composition.mode = mode.into();
        }
        if let Some(transition) = self.transition {
            config.composition.transition = transition;
            // Naming a transition implies transition mode unless a mode was given
            if self.mode.is_none() && transition != TransitionKind::None {
                config.composition.mode = ConcatMode::Transition;
            }
        }
        if let Some(duration) = self.duration {
            config.composition.transition_duration = duration;
        }
        if self.fps.is_some() {
            config.composition.frame_rate = self.fps;
        }
        if let Some(rate) = self.input_fps {
            config.output.input_fps = rate;
        }
        if let Some(seconds) = self.still_duration {
            config.output.still_duration = seconds;
        }
        if let Some(effect) = self.effect {
            config.effect.kind = effect;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.as_str())),
        )
        .init();

    if let Err(e) = run(&cli).await {
        match e.downcast_ref::<CompositorError>() {
            Some(err) => error!("{}", err.user_message()),
            None => error!("{:#}", e),
        }
        return Err(e);
    }
    Ok(())
}

async fn run(cli: &Cli) -> Result<()> {
    info!("Starting Clip-Compositor v{}", env!("CARGO_PKG_VERSION"));
    info!("Inputs: {:?}", cli.inputs);
    info!("Output: {:?}", cli.output);

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };
    cli.apply_overrides(&mut config);
    config.validate()?;

    let loader = ClipLoader::new(config.output.input_fps, config.output.still_duration);
    let clips = loader.load_all(&cli.inputs)?;

    let engine = ConcatenationEngine::new(config.composition.clone());
    info!(
        "Mode: {:?}, transition: {}",
        engine.config().mode,
        engine.transition_spec().kind
    );
    let mut timeline = engine.concatenate(&clips)?;

    if !config.grading.is_neutral() {
        info!("Applying color grading");
        timeline = config.grading.apply(&timeline)?;
    }

    let effect = config.effect.resolve()?;
    if config.effect.kind != EffectKind::None {
        info!("Applying effect: {}", config.effect.kind);
        timeline = effect.apply(&timeline)?;
    }

    let mut encoder = VideoEncoder::new(config.output.clone());
    if cli.frames_only {
        let written = encoder
            .write_frames(&timeline, &cli.output)
            .with_context(|| format!("writing frames to {:?}", cli.output))?;
        info!("Wrote {} frames to {:?}", written, cli.output);
        return Ok(());
    }

    if !VideoEncoder::check_ffmpeg_available() {
        warn!("ffmpeg is required to encode video; use --frames-only to write PNG frames instead");
    }
    let encoded = encoder.encode(&timeline, &cli.output).await?;
    info!(
        "Composition complete! {} frames, {:.2}s, saved to: {}",
        encoded.frame_count, encoded.duration, encoded.path
    );
    Ok(())
}
