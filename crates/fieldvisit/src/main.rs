use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fieldvisit_core::AppConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
use commands::maps::{handle_maps, MapsArgs};
use commands::observations::{handle_observations, ObservationsArgs};
use commands::visits::{handle_visits, VisitsArgs};

#[derive(Parser, Debug)]
#[command(author, version, about = "Field-visit time window checks and observation exports", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when absent
    #[arg(long, global = true, env = "FIELDVISIT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify visits, suggest protocol time windows and flag changes
    Visits(VisitsArgs),
    /// Enrich observations and write one export per project
    Observations(ObservationsArgs),
    /// Write a GeoJSON layer and an HTML map per project
    Maps(MapsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_optional(cli.config.as_deref()).with_context(|| {
        match cli.config.as_deref() {
            Some(path) => format!("failed to load config from {}", path.display()),
            None => "invalid default configuration".to_string(),
        }
    })?;
    info!(timezone = %config.timezone, "configuration loaded");

    match cli.command {
        Command::Visits(args) => handle_visits(args, &config),
        Command::Observations(args) => handle_observations(args, &config).await,
        Command::Maps(args) => handle_maps(args, &config),
    }
}
