use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::naming::KeepFlag;
use crate::observations::EnrichedObservation;
use crate::timestamps::format_local;
use crate::types::FieldVisit;

static UNSAFE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("valid safe name pattern"));

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("polars operation failed: {0}")]
    Polars(#[from] PolarsError),
}

/// File-system friendly form of a project name: runs of anything but ASCII letters and digits
/// become `_`, lowercased, at most 40 characters.
pub fn safe_name(name: &str) -> String {
    let replaced = UNSAFE_RUN.replace_all(name.trim(), "_").to_lowercase();
    let trimmed: String = replaced.chars().take(40).collect();
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed
    }
}

/// Per-visit record handed to the writers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitExportRow {
    pub project_id: Option<String>,
    pub visit_id: String,
    pub review_flag: &'static str,
    pub review_reasons: Option<String>,
    pub keep_flag: &'static str,
    pub project_name: Option<String>,
    pub city: Option<String>,
    pub raw_name: Option<String>,
    pub cleaned_name: Option<String>,
    pub project_code: Option<String>,
    pub day_part: Option<String>,
    pub recorded_start: Option<String>,
    pub suggested_start: Option<String>,
    pub recorded_end: Option<String>,
    pub suggested_end: Option<String>,
    pub recorded_duration_hours: Option<f64>,
    pub suggested_duration_hours: Option<f64>,
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
    pub location_source: &'static str,
}

impl VisitExportRow {
    pub fn from_visit(visit: &FieldVisit) -> Self {
        let classification = visit.classification.as_ref();
        let review = visit.review.as_ref();
        let suggested = visit.suggested.as_ref();
        Self {
            project_id: visit.project_id.clone(),
            visit_id: visit.visit_id.clone(),
            review_flag: review.map_or("no", |r| r.label()),
            review_reasons: review.and_then(|r| r.explanation()),
            keep_flag: classification.map_or(KeepFlag::Keep, |c| c.keep).as_str(),
            project_name: visit.project_name.clone(),
            city: visit.city.clone(),
            raw_name: visit.raw_name.clone(),
            cleaned_name: classification
                .and_then(|c| c.cleaned_name.clone())
                .or_else(|| visit.raw_name.clone()),
            project_code: classification.and_then(|c| c.project_code.clone()),
            day_part: classification.and_then(|c| c.day_part.map(|p| p.to_string())),
            recorded_start: visit.recorded_start.as_ref().map(format_local),
            suggested_start: suggested.and_then(|w| w.start.as_ref().map(format_local)),
            recorded_end: visit.recorded_end.as_ref().map(format_local),
            suggested_end: suggested.and_then(|w| w.end.as_ref().map(format_local)),
            recorded_duration_hours: visit.recorded_duration_hours,
            suggested_duration_hours: suggested.and_then(|w| w.duration_hours),
            sunrise: visit.sun_times.as_ref().map(|s| format_local(&s.sunrise)),
            sunset: visit.sun_times.as_ref().map(|s| format_local(&s.sunset)),
            location_source: visit.location_source.as_str(),
        }
    }
}

pub fn export_rows(visits: &[FieldVisit]) -> Vec<VisitExportRow> {
    visits.iter().map(VisitExportRow::from_visit).collect()
}

fn text_column<T>(name: &str, rows: &[T], get: impl Fn(&T) -> Option<&str>) -> Column {
    let values: Vec<Option<&str>> = rows.iter().map(get).collect();
    Series::new(name.into(), values).into()
}

fn float_column<T>(name: &str, rows: &[T], get: impl Fn(&T) -> Option<f64>) -> Column {
    let values: Vec<Option<f64>> = rows.iter().map(get).collect();
    Series::new(name.into(), values).into()
}

pub fn visits_frame(rows: &[VisitExportRow]) -> Result<DataFrame, PolarsError> {
    DataFrame::new(vec![
        text_column("project_id", rows, |r| r.project_id.as_deref()),
        text_column("veldbezoek_ID", rows, |r| Some(r.visit_id.as_str())),
        text_column("check_data", rows, |r| Some(r.review_flag)),
        text_column("reden_controle", rows, |r| r.review_reasons.as_deref()),
        text_column("verwijderd", rows, |r| Some(r.keep_flag)),
        text_column("project_naam", rows, |r| r.project_name.as_deref()),
        text_column("plaats", rows, |r| r.city.as_deref()),
        text_column("veldbezoeknaam_oud", rows, |r| r.raw_name.as_deref()),
        text_column("veldbezoeknaam_nieuw", rows, |r| r.cleaned_name.as_deref()),
        text_column("projectcode", rows, |r| r.project_code.as_deref()),
        text_column("dagdeel", rows, |r| r.day_part.as_deref()),
        text_column("starttijd_oud", rows, |r| r.recorded_start.as_deref()),
        text_column("starttijd_nieuw", rows, |r| r.suggested_start.as_deref()),
        text_column("eindtijd_oud", rows, |r| r.recorded_end.as_deref()),
        text_column("eindtijd_nieuw", rows, |r| r.suggested_end.as_deref()),
        float_column("duur_oud", rows, |r| r.recorded_duration_hours),
        float_column("duur_nieuw", rows, |r| r.suggested_duration_hours),
        text_column("zonsopkomst", rows, |r| r.sunrise.as_deref()),
        text_column("zonsondergang", rows, |r| r.sunset.as_deref()),
        text_column("locatiebron", rows, |r| Some(r.location_source)),
    ])
}

pub fn observations_frame(observations: &[EnrichedObservation]) -> Result<DataFrame, PolarsError> {
    let dates: Vec<Option<String>> = observations
        .iter()
        .map(|o| o.date.map(|d| d.format("%Y-%m-%d").to_string()))
        .collect();
    let times: Vec<Option<String>> = observations
        .iter()
        .map(|o| o.time.map(|t| t.format("%H:%M:%S").to_string()))
        .collect();
    let roost_numbers: Vec<Option<u32>> = observations.iter().map(|o| o.roost_number).collect();

    DataFrame::new(vec![
        Series::new("Verblijfnummer".into(), roost_numbers).into(),
        text_column("Groep", observations, |o| Some(o.group.label())),
        text_column("Soort", observations, |o| o.record.species.as_deref()),
        Series::new("Datum".into(), dates).into(),
        Series::new("Tijd".into(), times).into(),
        float_column("Aantal", observations, |o| Some(o.count)),
        text_column("Gedrag", observations, |o| o.record.behaviour.as_deref()),
        text_column("Verblijfplaats", observations, |o| o.record.roost.as_deref()),
        text_column("Sekse", observations, |o| o.record.sex.as_deref()),
        text_column("Adres", observations, |o| o.street_address.as_deref()),
        text_column("Plaats", observations, |o| o.place.as_deref()),
        text_column("Locatie_adres", observations, |o| o.record.remark.as_deref()),
        text_column("Functie", observations, |o| o.function.map(|f| f.label())),
        text_column("Projectnaam", observations, |o| o.project_name.as_deref()),
    ])
}

pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<(), OutputError> {
    let io_error = |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    let mut file = File::create(path).map_err(io_error)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b';')
        .finish(df)?;
    Ok(())
}

/// Writes the combined adjustments file and one file per project. Returns every path written.
pub fn write_visit_outputs(
    visits: &[FieldVisit],
    out_dir: &Path,
    combined_file: &str,
) -> Result<Vec<PathBuf>, OutputError> {
    let rows = export_rows(visits);
    let mut written = Vec::new();

    let combined_path = out_dir.join(combined_file);
    write_csv(&mut visits_frame(&rows)?, &combined_path)?;
    written.push(combined_path);

    let mut per_project: BTreeMap<String, Vec<VisitExportRow>> = BTreeMap::new();
    for row in rows {
        let key = row
            .project_name
            .clone()
            .or_else(|| row.project_id.clone())
            .unwrap_or_else(|| "unknown".to_string());
        per_project.entry(key).or_default().push(row);
    }
    for (project, rows) in per_project {
        let path = out_dir.join(format!("veldbezoeken_{}.csv", safe_name(&project)));
        write_csv(&mut visits_frame(&rows)?, &path)?;
        written.push(path);
    }

    info!(files = written.len(), dir = %out_dir.display(), "visit outputs written");
    Ok(written)
}

/// One `waarnemingen_export_{project}.csv` per project; observations without a project name
/// are left out.
pub fn write_observation_outputs(
    observations: &[EnrichedObservation],
    out_dir: &Path,
) -> Result<Vec<PathBuf>, OutputError> {
    let mut per_project: BTreeMap<&str, Vec<EnrichedObservation>> = BTreeMap::new();
    for observation in observations {
        if let Some(project) = observation.project_name.as_deref() {
            per_project
                .entry(project)
                .or_default()
                .push(observation.clone());
        }
    }

    let mut written = Vec::new();
    for (project, rows) in per_project {
        let path = out_dir.join(format!("waarnemingen_export_{}.csv", safe_name(project)));
        write_csv(&mut observations_frame(&rows)?, &path)?;
        written.push(path);
    }
    info!(files = written.len(), dir = %out_dir.display(), "observation outputs written");
    Ok(written)
}
