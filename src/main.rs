use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use ndarray::Array2;
use svdface::matcher::Decision;
use svdface::storage::{self, FileStore, IdentityStore};
use svdface::{config, preprocess, Recognizer};

#[derive(Parser)]
#[command(name = "svdface")]
#[command(version, about = "Face verification by SVD subspace similarity")]
struct Cli {
    /// Config file (defaults to the system config path)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll an identity from an image file or the camera
    Enroll {
        /// Identity name to store the descriptor under
        #[arg(short, long)]
        name: String,
        /// Image file to use instead of the camera
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
    /// Verify an image against every enrolled identity
    Verify {
        /// Image file to use instead of the camera
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
    /// List enrolled identities
    List,
    /// Remove an enrolled identity
    Remove {
        #[arg(short, long)]
        name: String,
    },
    /// Open config file in editor
    Config,
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;
    let store = FileStore::new(cfg.store_path());

    match cli.command {
        Commands::Enroll { name, image } => enroll(&cfg, store, &name, image.as_deref()),
        Commands::Verify { image } => verify(&cfg, store, image.as_deref()),
        Commands::List => list(&store),
        Commands::Remove { name } => remove(&store, &name),
        Commands::Config => open_config(cli.config.as_deref()),
    }
}

fn acquire(cfg: &config::Config, image: Option<&Path>) -> Result<Array2<f64>> {
    match image {
        Some(path) => preprocess::load_intensity(path, cfg.image_size)
            .with_context(|| format!("Failed to load image {}", path.display())),
        None => capture(cfg),
    }
}

#[cfg(feature = "camera")]
fn capture(cfg: &config::Config) -> Result<Array2<f64>> {
    use svdface_vision::Camera;

    info!("Opening camera: {}", cfg.camera);
    let mut camera = Camera::open(&cfg.camera).context("Failed to open camera")?;
    let frame = camera
        .still(cfg.warmup_frames)
        .context("Failed to capture frame")?;
    let img = image::DynamicImage::ImageLuma8(frame);
    Ok(preprocess::to_intensity(&img, cfg.image_size))
}

#[cfg(not(feature = "camera"))]
fn capture(_cfg: &config::Config) -> Result<Array2<f64>> {
    anyhow::bail!("built without camera support; pass --image")
}

fn enroll(cfg: &config::Config, store: FileStore, name: &str, image: Option<&Path>) -> Result<()> {
    info!("Enrolling identity: {}", name);
    let recognizer = Recognizer::new(cfg, store)?;
    let intensity = acquire(cfg, image)?;

    recognizer
        .enroll_image(name, &intensity)
        .context("Failed to enroll identity")?;

    info!("✓ Identity '{}' enrolled", name);
    Ok(())
}

fn verify(cfg: &config::Config, store: FileStore, image: Option<&Path>) -> Result<()> {
    let recognizer = Recognizer::new(cfg, store)?;

    let verification = recognizer
        .verify_acquired(|| {
            let intensity = acquire(cfg, image)?;
            if log::log_enabled!(log::Level::Debug) {
                let spectrum = svdface::descriptor::singular_values(&cfg.extractor(), &intensity)?;
                log::debug!(
                    "leading singular values: {:?}",
                    &spectrum[..cfg.rank.min(spectrum.len())]
                );
            }
            Ok::<_, anyhow::Error>(intensity)
        })
        .context("Failed to verify image")?;

    match verification.decision {
        Decision::Accept { name, score } => {
            info!(
                "Match score: {:.3} (threshold: {:.3})",
                score,
                recognizer.threshold()
            );
            info!("✓ Access granted to {}", name);
            Ok(())
        }
        Decision::Reject { best } => {
            match best.name {
                Some(name) => warn!(
                    "Closest identity {} scored {:.3} (threshold: {:.3})",
                    name,
                    best.score,
                    recognizer.threshold()
                ),
                None => warn!("No enrolled identities"),
            }
            anyhow::bail!("Verification failed: access denied")
        }
    }
}

fn list(store: &FileStore) -> Result<()> {
    let gallery = store.load().context("Failed to load identity store")?;
    if gallery.is_empty() {
        info!("No enrolled identities in {}", store.path().display());
        return Ok(());
    }
    for name in gallery.names() {
        println!("{}", name);
    }
    Ok(())
}

fn remove(store: &FileStore, name: &str) -> Result<()> {
    info!("Removing identity: {}", name);

    if storage::remove(store, name).context("Failed to remove identity")? {
        info!("✓ Identity '{}' removed", name);
    } else {
        warn!("No identity named '{}'", name);
    }
    Ok(())
}

fn open_config(path: Option<&Path>) -> Result<()> {
    let config_path = path.unwrap_or(&config::CONFIG_PATH).as_os_str();
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
