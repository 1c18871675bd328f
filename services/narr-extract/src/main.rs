//! Auxiliary NARR extraction for one satellite scene.
//!
//! Reads the acquisition date and scene center time from an ESPA metadata
//! file and dumps every pressure level of HGT, SPFH and TMP from the two
//! archived slices bracketing the scene into `<VAR>_1/` and `<VAR>_2/`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use narr_archive::config::{AUX_DIR_ENV, DEFAULT_CONFIG_FILE};
use narr_archive::{ArchiveLocator, ProcessRunner, SceneExtractor, SceneTime, TemplateConfig, Wgrib};

#[derive(Parser, Debug)]
#[command(name = "narr-extract")]
#[command(version)]
#[command(about = "Extracts auxiliary NARR data for a scene")]
struct Args {
    /// ESPA XML metadata file of the scene
    #[arg(long)]
    xml: PathBuf,

    /// Directory receiving the <VAR>_1 and <VAR>_2 directories
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Root of the local auxiliary archive
    #[arg(long, env = "LST_AUX_DIR")]
    aux_dir: Option<PathBuf>,

    /// Settings file with naming templates
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// wgrib executable
    #[arg(long, default_value = "wgrib")]
    wgrib: PathBuf,

    /// Log at debug level
    #[arg(long)]
    debug: bool,
}

fn init_tracing(debug: bool) -> Result<()> {
    let level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.debug)?;

    info!(xml = %args.xml.display(), "Extracting auxiliary NARR data");

    let xml = tokio::fs::read_to_string(&args.xml)
        .await
        .with_context(|| format!("Failed to read {}", args.xml.display()))?;
    let scene = SceneTime::from_metadata_xml(&xml)?;
    info!(date = %scene.date, center = %scene.center, "Scene acquisition");

    let aux_dir = args
        .aux_dir
        .clone()
        .ok_or_else(|| anyhow!("Archive directory not set; use --aux-dir or {}", AUX_DIR_ENV))?;
    let templates = TemplateConfig::load(&args.config).context("Failed to load settings")?;
    let locator = ArchiveLocator::new(&aux_dir, &templates)?;

    let extractor = SceneExtractor::new(locator, Wgrib::new(&args.wgrib, Arc::new(ProcessRunner)));
    let written = extractor
        .extract(&scene, &args.output_dir)
        .await
        .context("Failed processing auxiliary NARR data")?;

    info!(files = written.len(), "Completed extraction of auxiliary NARR data");
    Ok(())
}
