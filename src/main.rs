use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use kitchen_capture::capture::pattern::PatternDevices;
use kitchen_capture::capture::{FacingMode, MediaDevices, ResolutionHint, default_media_devices};
use kitchen_capture::panels::local::{DEFAULT_CAPACITY_ML, FreshnessClient, VolumeClient};
use kitchen_capture::panels::inventory::{self, DateKind};
use kitchen_capture::panels::{VisionClient, expiry, food_waste, garbage, recognition};
use kitchen_capture::{
    AcquisitionConfig, CaptureControl, CapturedImage, ImageAcquisition, OverlayState, PanelConfig,
    Recoverable, RecoveryStrategy,
};
use kitchen_scale::presets::UploadPreset;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

/// Acquire a kitchen photo from a file or a live camera and run it through
/// one of the analysis panels.
#[derive(Parser, Debug)]
#[command(name = "kcap")]
#[command(about = "📷 Capture a kitchen photo and analyze it")]
#[command(long_about = "Capture a kitchen photo from a file or a live camera and send it to an analysis panel.
Camera capture is interactive: press Enter (or type c) to capture, q to cancel, r to reset.")]
struct Cli {
    /// Panel configuration file (JSON)
    #[arg(long, global = true, help = "Panel configuration file (JSON); missing keys keep their defaults")]
    config: Option<PathBuf>,

    /// Downscaling applied before vision uploads
    #[arg(long, global = true, value_enum,
          help = "Cap the image size sent to the vision model: original, long1280, long1024, long640")]
    upload_preset: Option<UploadPreset>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Acquire an image and optionally save it
    Acquire {
        #[command(flatten)]
        source: SourceArgs,
        /// Write the acquired image bytes here
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Classify food waste into one of eight categories
    ClassifyWaste {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Decide whether the image shows garbage, and describe it
    Garbage {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Read the expiry date printed on a product
    Expiry {
        #[command(flatten)]
        source: SourceArgs,
        /// Replace the default extraction prompt
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Detect inventory items of one material, and read the label date
    Inventory {
        #[command(flatten)]
        source: SourceArgs,
        /// Material the products are made of (e.g. vine, chapati)
        #[arg(long, default_value = inventory::VINE)]
        material: String,
        /// Also read the manufacturing (vine) or expiry date from the label
        #[arg(long)]
        date: bool,
    },
    /// Describe every object and food item in the image
    Recognize {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Estimate the liquid left in a bottle
    Volume {
        #[command(flatten)]
        source: SourceArgs,
        /// Bottle capacity in millilitres
        #[arg(long, default_value_t = DEFAULT_CAPACITY_ML)]
        capacity: f64,
        /// Write the annotated result image here
        #[arg(long)]
        save_result: Option<PathBuf>,
    },
    /// Detect a fruit and whether it is fresh or spoiled
    Freshness {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Check that the local analysis services are up
    Health,
}

impl Command {
    fn source(&self) -> Option<&SourceArgs> {
        match self {
            Command::Acquire { source, .. }
            | Command::ClassifyWaste { source }
            | Command::Garbage { source }
            | Command::Expiry { source, .. }
            | Command::Inventory { source, .. }
            | Command::Recognize { source }
            | Command::Volume { source, .. }
            | Command::Freshness { source } => Some(source),
            Command::Health => None,
        }
    }
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Image file to analyze
    #[arg(long, conflicts_with = "camera", required_unless_present = "camera")]
    file: Option<PathBuf>,

    /// Capture from a camera instead of a file
    #[arg(long, value_enum)]
    camera: Option<CameraBackend>,

    /// Which camera to prefer
    #[arg(long, value_enum, default_value = "environment")]
    facing: Facing,

    /// Requested capture resolution
    #[arg(long, default_value = "1280x720", help = "Capture resolution as WIDTHxHEIGHT")]
    resolution: String,

    /// Fail instead of falling back when the resolution is unavailable
    #[arg(long)]
    exact: bool,

    /// Snapshot JPEG quality preset
    #[arg(short, long, default_value = "medium",
          help = "Snapshot quality preset: low, medium (default), high, max")]
    quality: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum CameraBackend {
    /// Platform camera (V4L2 on Linux)
    Auto,
    /// Synthetic test pattern, no hardware needed
    Pattern,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Facing {
    User,
    Environment,
}

impl From<Facing> for FacingMode {
    fn from(facing: Facing) -> Self {
        match facing {
            Facing::User => FacingMode::User,
            Facing::Environment => FacingMode::Environment,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kitchen_capture=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut panels = match &cli.config {
        Some(path) => PanelConfig::from_json_file(path).map_err(anyhow::Error::msg)?,
        None => PanelConfig::default(),
    };
    if let Some(preset) = cli.upload_preset {
        panels.max_upload_side = preset.max_long_side();
    }
    panels.validate().map_err(anyhow::Error::msg)?;

    let Some(source) = cli.command.source() else {
        return run_health(&panels).await;
    };
    let Some(image) = acquire(source).await? else {
        println!("No image acquired.");
        return Ok(());
    };
    println!(
        "Acquired {} image: {} bytes ({})",
        image.origin().as_str(),
        image.byte_size(),
        image.mime()
    );

    match &cli.command {
        Command::Acquire { save, .. } => {
            if let Some(path) = save {
                save_bytes(path, &image.decode_bytes().map_err(anyhow::Error::msg)?).await?;
            }
        }
        Command::ClassifyWaste { .. } => {
            let client = VisionClient::from_config(&panels)?;
            let result = food_waste::classify(&client, &image).await;
            if let Some(notice) = &result.notice {
                eprintln!("{}", notice);
            }
            println!("Category:   {}", result.category.label);
            println!("Confidence: {}%", result.confidence);
            if result.simulated {
                println!("(simulated result: set {} to use the vision model)", panels.api_key_env);
            }
        }
        Command::Garbage { .. } => {
            let client = VisionClient::from_config(&panels)?;
            let verdict = garbage::classify(&client, &image).await?;
            println!("Garbage: {}", if verdict.is_garbage { "yes" } else { "no" });
            println!("{}", verdict.classification);
            if let Some(description) = verdict.description {
                println!("\n{}", description);
            }
        }
        Command::Expiry { prompt, .. } => {
            let client = VisionClient::from_config(&panels)?;
            println!("{}", expiry::read_expiry(&client, &image, prompt.as_deref()).await?);
        }
        Command::Inventory { material, date, .. } => {
            let client = VisionClient::from_config(&panels)?;
            let detection = inventory::detect_items(&client, &image, material).await?;
            if let Some(notice) = &detection.notice {
                eprintln!("{}", notice);
            }
            for item in &detection.items {
                match item.quantity {
                    Some(quantity) => println!("{:>4} x {} ({})", quantity, item.name, item.material),
                    None => println!("   ? x {} ({})", item.name, item.material),
                }
            }
            if *date {
                let kind = DateKind::for_material(material);
                let label = inventory::extract_date(&client, &image, kind).await?;
                match label.date {
                    Some(date) => println!("{} date: {}", kind.as_str(), date),
                    None => println!("{} date: not found", kind.as_str()),
                }
            }
        }
        Command::Recognize { .. } => {
            let client = VisionClient::from_config(&panels)?;
            println!("{}", recognition::describe(&client, &image).await.description);
        }
        Command::Volume {
            capacity,
            save_result,
            ..
        } => {
            let estimate = VolumeClient::from_config(&panels)?
                .estimate(&image, *capacity)
                .await?;
            println!("Liquid level:     {:.1}%", estimate.liquid_percentage);
            println!("Remaining volume: {:.1} ml", estimate.remaining_volume_ml);
            if let (Some(path), Some(bytes)) = (save_result, estimate.result_image_bytes()) {
                save_bytes(path, &bytes.map_err(anyhow::Error::msg)?).await?;
            }
        }
        Command::Freshness { .. } => {
            let prediction = FreshnessClient::from_config(&panels)?.predict(&image).await?;
            println!("Fruit:     {}", prediction.fruit);
            println!("Freshness: {}", prediction.freshness);
        }
        Command::Health => {}
    }
    Ok(())
}

/// Acquire one image. Acquisition errors are reported and yield `None`.
async fn acquire(source: &SourceArgs) -> Result<Option<CapturedImage>> {
    let config = AcquisitionConfig::new(
        source.facing.into(),
        parse_resolution(&source.resolution, source.exact)?,
        parse_quality(&source.quality)?,
        "Press Enter to capture, q to cancel, r to reset",
    );
    config.validate().map_err(anyhow::Error::msg)?;

    let devices: Option<Arc<dyn MediaDevices>> = match source.camera {
        Some(CameraBackend::Pattern) => Some(Arc::new(PatternDevices::new())),
        _ => default_media_devices(),
    };
    let mut acquisition = ImageAcquisition::new(devices, config);

    let result = match &source.file {
        Some(path) => acquisition.acquire_from_file(path).await.map(Some),
        None => {
            let (tx, mut rx) = mpsc::channel(8);
            spawn_stdin_controls(tx, acquisition.overlay());
            let overlay = tokio::spawn(print_overlay(acquisition.overlay()));
            let result = acquisition.acquire_from_camera(&mut rx).await;
            overlay.abort();
            result
        }
    };

    match result {
        Ok(image) => Ok(image),
        Err(e) => {
            eprintln!("{}", e.user_message());
            if e.recovery_strategies().contains(&RecoveryStrategy::FallbackToFileUpload) {
                eprintln!("You can use --file <PATH> to upload an image instead.");
            }
            Ok(None)
        }
    }
}

/// Forward stdin commands to the camera session.
///
/// Runs on a plain thread: blocking stdin reads must not hold up runtime shutdown.
/// A capture typed ahead (or piped in) is held back until the preview is live,
/// since the session ignores Capture before that.
fn spawn_stdin_controls(tx: mpsc::Sender<CaptureControl>, mut overlay: watch::Receiver<OverlayState>) {
    let runtime = tokio::runtime::Handle::current();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            let control = match line.trim().to_ascii_lowercase().as_str() {
                "" | "c" | "capture" => CaptureControl::Capture,
                "q" | "cancel" => CaptureControl::Cancel,
                "r" | "reset" => CaptureControl::Reset,
                other => {
                    eprintln!("Unknown command '{}'. Use Enter/c, q or r.", other);
                    continue;
                }
            };
            if control == CaptureControl::Capture
                && runtime.block_on(overlay.wait_for(OverlayState::is_live)).is_err()
            {
                break;
            }
            if tx.blocking_send(control).is_err() {
                break;
            }
        }
    });
}

async fn print_overlay(mut overlay: watch::Receiver<OverlayState>) {
    while overlay.changed().await.is_ok() {
        match &*overlay.borrow_and_update() {
            OverlayState::Hidden => {}
            OverlayState::Requesting => eprintln!("Requesting camera access..."),
            OverlayState::Live {
                width,
                height,
                instructions,
            } => eprintln!("Camera live at {}x{}. {}", width, height, instructions),
        }
    }
}

async fn run_health(panels: &PanelConfig) -> Result<()> {
    let volume = VolumeClient::from_config(panels)?.health().await;
    let freshness = FreshnessClient::from_config(panels)?.health().await;
    for (name, url, status) in [
        ("volume", &panels.volume_base_url, volume),
        ("freshness", &panels.freshness_base_url, freshness),
    ] {
        match status {
            Ok(true) => println!("{:<10} {} healthy", name, url),
            Ok(false) => println!("{:<10} {} unhealthy", name, url),
            Err(e) => println!("{:<10} {} unreachable ({})", name, url, e),
        }
    }
    Ok(())
}

async fn save_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| anyhow!("Cannot write {}: {}", path.display(), e))?;
    println!("Saved {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Parse resolution string like "1280x720"
fn parse_resolution(resolution: &str, exact: bool) -> Result<ResolutionHint> {
    let (w, h) = resolution
        .to_lowercase()
        .split_once('x')
        .map(|(w, h)| (w.trim().to_string(), h.trim().to_string()))
        .ok_or_else(|| anyhow!("Invalid resolution format: {}. Use WIDTHxHEIGHT, e.g. 1280x720", resolution))?;
    let width: u32 = w.parse().map_err(|_| anyhow!("Invalid width in resolution: {}", w))?;
    let height: u32 = h.parse().map_err(|_| anyhow!("Invalid height in resolution: {}", h))?;

    Ok(if exact {
        ResolutionHint::exact(width, height)
    } else {
        ResolutionHint::ideal(width, height)
    })
}

/// Parse quality preset into JPEG quality
fn parse_quality(quality: &str) -> Result<u8> {
    match quality.to_lowercase().as_str() {
        "low" => Ok(60),
        "medium" => Ok(80),
        "high" => Ok(92),
        "max" => Ok(100),
        _ => Err(anyhow!("Invalid quality preset: {}. Use: low, medium, high, max", quality)),
    }
}
