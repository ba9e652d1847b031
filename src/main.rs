use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use frame_craft::capture;
use frame_craft::collage::{Collage, TextRenderer};
use frame_craft::config::{expand_tilde, Config};
use frame_craft::layout::{compute_layout, LayoutMode, SLOT_COUNT};
use frame_craft::photo::Photo;
use frame_craft::{app, export};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "frame-craft")]
#[command(version, about = "Four-cut photo booth: capture, arrange, decorate and export")]
struct Cli {
    /// Config file (default: ~/.config/frame-craft/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Use the images in this folder as the camera feed
    #[arg(long, value_name = "DIR")]
    frames: Option<PathBuf>,

    /// Initial layout (grid or vertical)
    #[arg(long, value_name = "MODE", global = true)]
    layout: Option<LayoutMode>,

    /// Initial theme index
    #[arg(long, value_name = "INDEX", global = true)]
    theme: Option<usize>,

    /// Use the synthetic test pattern instead of a camera
    #[arg(long)]
    test_pattern: bool,

    /// SegFormer ONNX model for background removal
    #[arg(long, value_name = "FILE")]
    model: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a collage from existing photos without opening a window
    Compose {
        /// Up to four images, in slot order
        #[arg(required = true, num_args = 1..=SLOT_COUNT)]
        photos: Vec<PathBuf>,

        /// Output directory (default: [export] directory or Pictures)
        #[arg(long, short = 'o', value_name = "DIR")]
        output: Option<PathBuf>,
    },
    /// Print the resolved slot geometry as JSON
    Layout {
        mode: Option<LayoutMode>,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load config")?;

    if let Some(dir) = &cli.frames {
        config.capture.frames_dir = Some(dir.clone());
    }
    if let Some(mode) = cli.layout {
        config.editor.layout = mode;
    }
    if let Some(theme) = cli.theme {
        config.editor.theme = theme;
    }
    if let Some(model) = &cli.model {
        config.segmentation.model_path = Some(model.clone());
    }
    config.validate_and_clamp();
    Ok(config)
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("frame-craft-worker")
        .build()
        .context("Failed to start async runtime")
}

fn text_renderer(config: &Config) -> anyhow::Result<TextRenderer> {
    let font = config.editor.font_path.as_deref().map(expand_tilde);
    TextRenderer::load(font.as_deref()).context("Failed to load font")
}

fn compose(config: &Config, photos: &[PathBuf], output: Option<PathBuf>) -> anyhow::Result<()> {
    let photos = photos
        .iter()
        .map(|path| Photo::open(path).with_context(|| format!("Failed to read {}", path.display())))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut collage = Collage::new(config.collage_options(), text_renderer(config)?);
    runtime()?.block_on(collage.load_photos(&photos));

    let directory = output
        .map(|dir| expand_tilde(&dir))
        .unwrap_or_else(|| config.export_directory());
    let path = export::export_to(&mut collage, &directory)
        .with_context(|| format!("Failed to export to {}", directory.display()))?;
    println!("{}", path.display());
    Ok(())
}

fn run_gui(config: Config, test_pattern: bool) -> anyhow::Result<()> {
    let runtime = runtime()?;
    let frames = config.capture.frames_dir.as_deref().map(expand_tilde);
    let backend = capture::default_backend(frames.as_deref(), config.capture.camera_index, test_pattern);
    log::info!("Camera backend: {}", backend.name());
    let text = text_renderer(&config)?;

    app::run(runtime.handle().clone(), config, backend, text).map_err(|e| anyhow!("{e}"))?;
    log::info!("Window closed");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Some(Command::Compose { photos, output }) => compose(&config, &photos, output),
        Some(Command::Layout { mode }) => {
            let mode = mode.unwrap_or(config.editor.layout);
            let layout = compute_layout(mode, &config.layout);
            println!("{}", serde_json::to_string_pretty(&layout)?);
            Ok(())
        }
        None => run_gui(config, cli.test_pattern),
    }
}
