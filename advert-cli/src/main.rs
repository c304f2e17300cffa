//! Advertisement lookup CLI
//!
//! Wires two JSON catalogs into the advertisement service as primary and
//! backup providers, resolves the requested ids in order and prints each
//! result as JSON.

use advert_cli::JsonCatalogProvider;
use advert_service::{AdvertisementService, ServiceConfig};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "advert-cli")]
#[command(about = "Resolve advertisements through a primary and a backup catalog")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Primary catalog (JSON map of id to advertisement)
    #[arg(long)]
    primary: PathBuf,

    /// Backup catalog, consulted when the primary fails or is skipped
    #[arg(long)]
    backup: PathBuf,

    /// Service configuration file; ADVERT_* environment variables otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Make every primary call fail
    #[arg(long)]
    primary_down: bool,

    /// Advertisement ids to resolve
    #[arg(required = true)]
    ids: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ServiceConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ServiceConfig::from_env(),
    };

    let primary = Arc::new(JsonCatalogProvider::load("primary", &cli.primary)?);
    let backup = Arc::new(JsonCatalogProvider::load("backup", &cli.backup)?);
    primary.set_down(cli.primary_down);
    tracing::info!(
        primary = primary.len(),
        backup = backup.len(),
        "Catalogs loaded"
    );

    let service = AdvertisementService::with_config(primary, backup, config)?;
    service.start()?;

    let mut failed = false;
    for id in &cli.ids {
        match service.get_advertisement(id).await {
            Ok(Some(adv)) => println!("{}", serde_json::to_string(&adv)?),
            Ok(None) => println!("{id}: not found"),
            Err(e) => {
                eprintln!("{id}: {e}");
                failed = true;
            }
        }
    }

    if let Err(e) = service.stop().await {
        tracing::error!(error = %e, "Service did not stop cleanly");
    }

    if failed {
        anyhow::bail!("one or more lookups failed");
    }
    Ok(())
}
