use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use fieldvisit_core::geocoder::{GeocodeCache, GeocodeRunner, GeocodeSettings, NominatimGeocoder};
use fieldvisit_core::observations::{apply_addresses, enrich_observations, geocode_targets};
use fieldvisit_core::outputs::write_observation_outputs;
use fieldvisit_core::pipelines::read_export;
use fieldvisit_core::AppConfig;
use fieldvisit_parser::parse_observations;
use tracing::warn;

use super::{project_names_from_visits, summary_table};

#[derive(Args, Debug)]
pub struct ObservationsArgs {
    /// Observation export (`waarnemingen_export.csv`)
    observations: PathBuf,
    /// Field-visit export used to fill in missing project names
    #[arg(long)]
    visits_csv: Option<PathBuf>,
    /// Directory for the per-project files
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
    /// Reverse geocode roost and nest observations through Nominatim
    #[arg(long)]
    geocode: bool,
}

pub async fn handle_observations(args: ObservationsArgs, config: &AppConfig) -> Result<()> {
    let timezone = config.timezone()?;
    let records = read_export(&args.observations, parse_observations)
        .with_context(|| format!("failed to read {}", args.observations.display()))?;
    let project_names = project_names_from_visits(args.visits_csv.as_deref())?;
    let mut observations = enrich_observations(&records, &project_names, &config.region, timezone);

    let mut geocoded = 0;
    let mut failed_batches = 0;
    if args.geocode {
        let behaviours = &config.geocoding.behaviours;
        let targets = geocode_targets(&observations, behaviours);
        let mut cache = match config.geocoding.cache_file.as_deref() {
            Some(path) => GeocodeCache::open(path)
                .with_context(|| format!("failed to open geocode cache {}", path.display()))?,
            None => GeocodeCache::in_memory(),
        };
        let geocoder = NominatimGeocoder::from_config(&config.geocoding)
            .context("failed to build geocoding client")?;
        let report = GeocodeRunner::new(&geocoder, GeocodeSettings::from(&config.geocoding))
            .run(&targets, &mut cache)
            .await
            .context("reverse geocoding failed")?;
        for batch in &report.failed_batches {
            warn!(batch = batch.index, points = batch.points, error = %batch.error, "batch not geocoded; rerun to retry");
        }
        geocoded = report.resolved;
        failed_batches = report.failed_batches.len();
        apply_addresses(&mut observations, &cache.addresses(), behaviours);
    }

    let written = write_observation_outputs(&observations, &args.out_dir)
        .with_context(|| format!("failed to write outputs to {}", args.out_dir.display()))?;

    let table = summary_table(
        "observations",
        &[
            ("total", observations.len()),
            ("located", observations.iter().filter(|o| o.point.is_some()).count()),
            ("with site function", observations.iter().filter(|o| o.function.is_some()).count()),
            ("addresses resolved", geocoded),
            ("failed geocode batches", failed_batches),
            ("files written", written.len()),
        ],
    );
    println!("{table}");
    Ok(())
}
