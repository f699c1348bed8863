use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use fieldvisit_core::outputs::write_visit_outputs;
use fieldvisit_core::pipelines::{run_visit_pipeline, ExecutionContext, FieldVisitInputs};
use fieldvisit_core::AppConfig;

use super::summary_table;

#[derive(Args, Debug)]
pub struct VisitsArgs {
    /// Field-visit export (`veldbezoeken_export.csv`)
    visits: PathBuf,
    /// Observation export, used to locate visits
    observations: PathBuf,
    /// Project export, supplies the city per project
    projects: PathBuf,
    /// Directory for the combined and per-project files
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
    /// Extra keyword marking a visit for removal (repeatable)
    #[arg(long = "remove-pattern")]
    remove_patterns: Vec<String>,
}

pub fn handle_visits(args: VisitsArgs, config: &AppConfig) -> Result<()> {
    let mut context =
        ExecutionContext::from_config(config).context("failed to build execution context")?;
    context.removal_keywords.extend(args.remove_patterns);

    let inputs = FieldVisitInputs::load(&args.visits, &args.observations, &args.projects)
        .context("failed to read input exports")?;
    let output = run_visit_pipeline(&inputs, &context);

    let written = write_visit_outputs(&output.visits, &args.out_dir, &config.output.visits_file)
        .with_context(|| format!("failed to write outputs to {}", args.out_dir.display()))?;

    let summary = &output.summary;
    let table = summary_table(
        "visits",
        &[
            ("total", summary.total),
            ("recognized", summary.recognized),
            ("marked for removal", summary.marked_remove),
            ("located by observation", summary.located_by_observation),
            ("located by project", summary.located_by_fallback),
            ("with sun times", summary.with_sun_times),
            ("adjusted", summary.adjusted),
            ("flagged for review", summary.flagged),
            ("files written", written.len()),
        ],
    );
    println!("{table}");
    Ok(())
}
