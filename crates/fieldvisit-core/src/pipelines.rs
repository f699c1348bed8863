use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono_tz::Tz;
use fieldvisit_parser::{
    parse_fieldvisits, parse_observations, parse_projects, FieldVisitRecord, ObservationRecord,
    ParserError, ProjectRecord,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{AppConfig, ConfigError};
use crate::error::{PipelineError, Result};
use crate::locations::{apply_project_fallback, first_point_per_visit, RegionBounds};
use crate::naming::{self, KeepFlag};
use crate::review::{self, ReviewSettings};
use crate::rules;
use crate::suntimes::SunTimeResolver;
use crate::timestamps::to_zone;
use crate::types::{FieldVisit, LocationSource};

/// Everything the visit pipeline needs besides the records themselves.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub timezone: Tz,
    pub removal_keywords: Vec<String>,
    pub resolver: SunTimeResolver,
    pub review: ReviewSettings,
    pub region: RegionBounds,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        let timezone = chrono_tz::Europe::Amsterdam;
        Self {
            timezone,
            removal_keywords: Vec::new(),
            resolver: SunTimeResolver::new(timezone),
            review: ReviewSettings::default(),
            region: RegionBounds::default(),
        }
    }
}

impl ExecutionContext {
    pub fn from_config(config: &AppConfig) -> std::result::Result<Self, ConfigError> {
        let timezone = config.timezone()?;
        Ok(Self {
            timezone,
            removal_keywords: config.removal_keywords.clone(),
            resolver: SunTimeResolver::new(timezone).with_elevation(config.sun.elevation_m),
            review: config.review.settings(),
            region: config.region,
        })
    }
}

/// The three exports a visit run reads.
#[derive(Debug, Clone, Default)]
pub struct FieldVisitInputs {
    pub visits: Vec<FieldVisitRecord>,
    pub observations: Vec<ObservationRecord>,
    pub projects: Vec<ProjectRecord>,
}

impl FieldVisitInputs {
    pub fn load(visits: &Path, observations: &Path, projects: &Path) -> Result<Self> {
        Ok(Self {
            visits: read_export(visits, parse_fieldvisits)?,
            observations: read_export(observations, parse_observations)?,
            projects: read_export(projects, parse_projects)?,
        })
    }
}

pub fn read_export<T>(
    path: &Path,
    parse: impl Fn(&str) -> std::result::Result<Vec<T>, ParserError>,
) -> Result<Vec<T>> {
    let content = fs::read_to_string(path).map_err(|source| PipelineError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content).map_err(|source| PipelineError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VisitPipelineSummary {
    pub total: usize,
    pub recognized: usize,
    pub marked_remove: usize,
    pub located_by_observation: usize,
    pub located_by_fallback: usize,
    pub with_sun_times: usize,
    pub adjusted: usize,
    pub flagged: usize,
}

pub struct VisitPipelineOutput {
    pub visits: Vec<FieldVisit>,
    pub summary: VisitPipelineSummary,
}

/// Turns export records into pipeline visits: times localised, project name and city joined,
/// first observation point attached.
pub fn build_visits(inputs: &FieldVisitInputs, context: &ExecutionContext) -> Vec<FieldVisit> {
    let tz = context.timezone;
    let points = first_point_per_visit(&inputs.observations, &context.region);
    let projects: HashMap<&str, &ProjectRecord> = inputs
        .projects
        .iter()
        .map(|p| (p.project_id.as_str(), p))
        .collect();

    inputs
        .visits
        .iter()
        .map(|record| {
            let mut visit = FieldVisit::new(record.visit_id.clone(), record.project_id.clone());
            let project = record
                .project_id
                .as_deref()
                .and_then(|id| projects.get(id));
            visit.project_name = record
                .project_name
                .clone()
                .or_else(|| project.and_then(|p| p.name.clone()));
            visit.city = project.and_then(|p| p.city.clone());
            visit.raw_name = record.name.clone();
            visit.recorded_start = record.start.and_then(|ts| to_zone(ts, tz));
            visit.recorded_end = record.end.and_then(|ts| to_zone(ts, tz));
            visit.recorded_duration_hours = record.duration_hours;
            if let Some(point) = points.get(&record.visit_id) {
                visit.location = Some(*point);
                visit.location_source = LocationSource::Observation;
            }
            visit
        })
        .collect()
}

pub fn classify_visits(visits: &mut [FieldVisit], removal_keywords: &[String]) {
    for visit in visits.iter_mut() {
        let classification = naming::classify(visit.raw_name.as_deref(), removal_keywords);
        debug!(
            visit_id = %visit.visit_id,
            code = ?classification.project_code,
            cleaned = ?classification.cleaned_name,
            "visit classified"
        );
        visit.classification = Some(classification);
    }
    info!(visits = visits.len(), "visits classified");
}

pub fn resolve_sun_times(visits: &mut [FieldVisit], resolver: &SunTimeResolver) {
    for visit in visits.iter_mut() {
        visit.sun_times = resolver.resolve_point(visit.visit_date(), visit.location);
    }
    info!(
        with_sun_times = visits.iter().filter(|v| v.sun_times.is_some()).count(),
        "sun times resolved"
    );
}

pub fn suggest_windows(visits: &mut [FieldVisit]) {
    for visit in visits.iter_mut() {
        let window = rules::suggest_for_visit(visit);
        if window.is_adjusted() {
            debug!(visit_id = %visit.visit_id, rules = ?window.adjustments, "window adjusted");
        }
        visit.suggested = Some(window);
    }
    info!(
        adjusted = visits
            .iter()
            .filter(|v| v.suggested.as_ref().is_some_and(|w| w.is_adjusted()))
            .count(),
        "time windows suggested"
    );
}

pub fn review_visits(visits: &mut [FieldVisit], settings: &ReviewSettings) {
    for visit in visits.iter_mut() {
        let outcome = match visit.suggested.as_ref() {
            Some(window) => review::flag(visit, window, settings),
            None => review::ReviewOutcome::default(),
        };
        if outcome.is_flagged() {
            debug!(visit_id = %visit.visit_id, reasons = ?outcome.explanation(), "visit flagged");
        }
        visit.review = Some(outcome);
    }
    info!(
        flagged = visits
            .iter()
            .filter(|v| v.review.as_ref().is_some_and(|r| r.is_flagged()))
            .count(),
        "visits reviewed"
    );
}

pub fn summarize(visits: &[FieldVisit]) -> VisitPipelineSummary {
    let count = |pred: &dyn Fn(&FieldVisit) -> bool| visits.iter().filter(|v| pred(*v)).count();
    VisitPipelineSummary {
        total: visits.len(),
        recognized: count(&|v| {
            v.classification
                .as_ref()
                .is_some_and(|c| c.cleaned_name.is_some())
        }),
        marked_remove: count(&|v| {
            v.classification
                .as_ref()
                .is_some_and(|c| c.keep == KeepFlag::Remove)
        }),
        located_by_observation: count(&|v| v.location_source == LocationSource::Observation),
        located_by_fallback: count(&|v| v.location_source == LocationSource::ProjectFallback),
        with_sun_times: count(&|v| v.sun_times.is_some()),
        adjusted: count(&|v| v.suggested.as_ref().is_some_and(|w| w.is_adjusted())),
        flagged: count(&|v| v.review.as_ref().is_some_and(|r| r.is_flagged())),
    }
}

/// Runs every stage in order: build, location fallback, classification, sun times, window
/// rules, review.
pub fn run_visit_pipeline(
    inputs: &FieldVisitInputs,
    context: &ExecutionContext,
) -> VisitPipelineOutput {
    let mut visits = build_visits(inputs, context);
    let filled = apply_project_fallback(&mut visits);
    classify_visits(&mut visits, &context.removal_keywords);
    resolve_sun_times(&mut visits, &context.resolver);
    suggest_windows(&mut visits);
    review_visits(&mut visits, &context.review);

    let summary = summarize(&visits);
    info!(
        total = summary.total,
        recognized = summary.recognized,
        fallback_locations = filled,
        with_sun_times = summary.with_sun_times,
        adjusted = summary.adjusted,
        flagged = summary.flagged,
        "visit pipeline finished"
    );
    VisitPipelineOutput { visits, summary }
}
