use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use fieldvisit_core::maps::write_project_maps;
use fieldvisit_core::observations::enrich_observations;
use fieldvisit_core::pipelines::read_export;
use fieldvisit_core::AppConfig;
use fieldvisit_parser::{parse_observations, ObservationRecord};
use tracing::{info, warn};

use super::{project_names_from_visits, summary_table};

#[derive(Args, Debug)]
pub struct MapsArgs {
    /// Observation export, or a directory of them
    input: PathBuf,
    /// Directory that receives one `waarn_*` folder per project
    #[arg(long, default_value = ".")]
    out_root: PathBuf,
    /// Field-visit export used to fill in missing project names
    #[arg(long)]
    visits_csv: Option<PathBuf>,
}

pub fn handle_maps(args: MapsArgs, config: &AppConfig) -> Result<()> {
    let timezone = config.timezone()?;
    let records = if args.input.is_dir() {
        read_directory(&args.input)?
    } else {
        read_export(&args.input, parse_observations)
            .with_context(|| format!("failed to read {}", args.input.display()))?
    };
    let project_names = project_names_from_visits(args.visits_csv.as_deref())?;
    let observations = enrich_observations(&records, &project_names, &config.region, timezone);

    let maps = write_project_maps(&observations, &args.out_root)
        .with_context(|| format!("failed to write maps to {}", args.out_root.display()))?;

    let mut rows: Vec<(&str, usize)> = maps.iter().map(|m| (m.project.as_str(), m.points)).collect();
    rows.push(("projects", maps.len()));
    println!("{}", summary_table("points per map", &rows));
    Ok(())
}

/// Every `*.csv` in `dir` that parses as an observation export; others are skipped.
fn read_directory(dir: &Path) -> Result<Vec<ObservationRecord>> {
    let pattern = dir.join("*.csv");
    let pattern = pattern
        .to_str()
        .with_context(|| format!("path is not valid UTF-8: {}", dir.display()))?;

    let mut records = Vec::new();
    for entry in glob::glob(pattern)? {
        let path = match entry {
            Ok(path) => path,
            Err(err) => {
                warn!(error = %err, "could not read path from glob pattern");
                continue;
            }
        };
        match read_export(&path, parse_observations) {
            Ok(mut parsed) => {
                info!(file = %path.display(), rows = parsed.len(), "observation export read");
                records.append(&mut parsed);
            }
            Err(err) => warn!(file = %path.display(), error = %err, "skipping file"),
        }
    }
    Ok(records)
}
