use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use spectrograph_core::{
    save_png, RenderConfig, RenderSession, SharedSession, TimeSliceScheduler, WavSource,
    WaveformSource,
};
use tracing_subscriber::EnvFilter;

fn main() -> spectrograph_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => run_render(&args),
        Commands::Info { input } => run_info(&input),
    }
}

fn run_render(args: &RenderArgs) -> spectrograph_core::Result<()> {
    let config = args.resolve_config()?;
    tracing::info!(input = ?args.input, output = ?args.output, ?config, "rendering spectrogram");

    let mut session = RenderSession::from_config(WavSource::new(&args.input), &config)?;
    session.add_listener(|| tracing::info!("spectrogram complete"));

    let handle = SharedSession::new(session);
    let mut scheduler = TimeSliceScheduler::new();
    scheduler.add_client(Box::new(handle.clone()));
    let slices = scheduler.run_until_idle()?;

    let image = handle.snapshot()?;
    save_png(&image, &args.output)?;

    let progress = handle.progress()?;
    tracing::info!(
        slices,
        blocks = progress.blocks_processed,
        output = ?args.output,
        "wrote spectrogram"
    );
    Ok(())
}

fn run_info(input: &Path) -> spectrograph_core::Result<()> {
    let info = WavSource::new(input).open()?;
    tracing::debug!(duration = ?info.duration_seconds(), "probed source");
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Render spectrogram images from audio files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a WAV file into a PNG spectrogram.
    Render(RenderArgs),
    /// Print channel count, length and sample rate of a WAV file as JSON.
    Info {
        /// Path to the audio file that should be inspected.
        input: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Path to the WAV file that should be analysed.
    input: PathBuf,
    /// Output path for the PNG image.
    output: PathBuf,
    /// JSON configuration file; command line flags take precedence.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Image width in pixels.
    #[arg(long)]
    width: Option<u32>,
    /// Image height in pixels.
    #[arg(long)]
    height: Option<u32>,
    /// Block unit; each step reads twice this many samples.
    #[arg(long)]
    block_unit: Option<usize>,
}

impl RenderArgs {
    fn resolve_config(&self) -> spectrograph_core::Result<RenderConfig> {
        let mut config = match &self.config {
            Some(path) => RenderConfig::load(path)?,
            None => RenderConfig::default(),
        };

        if let Some(width) = self.width {
            config.image.width = width;
        }
        if let Some(height) = self.height {
            config.image.height = height;
        }
        if let Some(unit) = self.block_unit {
            config.block_size_unit = unit;
        }

        config.validate()?;
        Ok(config)
    }
}
