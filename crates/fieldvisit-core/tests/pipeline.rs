use std::path::PathBuf;

use anyhow::Result;
use chrono::{Duration, Timelike};

use fieldvisit_core::naming::KeepFlag;
use fieldvisit_core::pipelines::{run_visit_pipeline, ExecutionContext, FieldVisitInputs};
use fieldvisit_core::{AppConfig, FieldVisit, LocationSource};

fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../fieldvisit-parser/tests/data")
}

fn load_inputs() -> Result<FieldVisitInputs> {
    let dir = data_dir();
    Ok(FieldVisitInputs::load(
        &dir.join("veldbezoeken_export.csv"),
        &dir.join("waarnemingen_export.csv"),
        &dir.join("projecten_export.csv"),
    )?)
}

fn context() -> Result<ExecutionContext> {
    Ok(ExecutionContext::from_config(&AppConfig::default())?)
}

fn by_id<'a>(visits: &'a [FieldVisit], id: &str) -> &'a FieldVisit {
    visits
        .iter()
        .find(|v| v.visit_id == id)
        .unwrap_or_else(|| panic!("visit {id} missing"))
}

#[test]
fn fixture_run_produces_expected_summary() -> Result<()> {
    let output = run_visit_pipeline(&load_inputs()?, &context()?);
    let summary = output.summary;

    assert_eq!(summary.total, 6);
    assert_eq!(summary.recognized, 5);
    assert_eq!(summary.marked_remove, 1);
    assert_eq!(summary.located_by_observation, 2);
    assert_eq!(summary.located_by_fallback, 3);
    assert_eq!(summary.with_sun_times, 5);
    assert_eq!(summary.adjusted, 5);
    assert_eq!(summary.flagged, 5);
    Ok(())
}

#[test]
fn vm01_evening_visit_is_clamped_around_sunset() -> Result<()> {
    let output = run_visit_pipeline(&load_inputs()?, &context()?);
    let visit = by_id(&output.visits, "101");
    let sun = visit.sun_times.expect("sun times");
    let window = visit.suggested.as_ref().expect("window");

    assert_eq!(visit.location_source, LocationSource::Observation);
    assert_eq!(visit.city.as_deref(), Some("Utrecht"));
    assert_eq!(window.start, Some(sun.sunset - Duration::hours(1)));
    assert_eq!(window.end, Some(sun.sunset + Duration::hours(3)));
    assert_eq!(window.duration_hours, Some(4.0));
    assert_eq!(sun.sunset.hour(), 22);

    let review = visit.review.as_ref().expect("review");
    assert_eq!(
        review.explanation().as_deref(),
        Some("start_changed|end_changed|duration_changed")
    );
    Ok(())
}

#[test]
fn morning_visit_uses_project_fallback() -> Result<()> {
    let output = run_visit_pipeline(&load_inputs()?, &context()?);
    let visit = by_id(&output.visits, "102");
    let sun = visit.sun_times.expect("sun times");
    let window = visit.suggested.as_ref().expect("window");
    let classification = visit.classification.as_ref().expect("classified");

    assert_eq!(visit.location_source, LocationSource::ProjectFallback);
    assert_eq!(classification.cleaned_name.as_deref(), Some("VM01 ochtend 2"));
    assert_eq!(window.end, Some(sun.sunrise));
    assert_eq!(window.start, Some(sun.sunrise - Duration::hours(3)));
    Ok(())
}

#[test]
fn vm02_visit_rolls_end_into_next_day() -> Result<()> {
    let output = run_visit_pipeline(&load_inputs()?, &context()?);
    let visit = by_id(&output.visits, "103");
    let window = visit.suggested.as_ref().expect("window");

    let start = window.start.expect("start");
    let end = window.end.expect("end");
    assert_eq!((start.hour(), start.minute()), (23, 59));
    assert_eq!((end.hour(), end.minute()), (1, 0));
    assert_eq!(end.date_naive(), start.date_naive().succ_opt().unwrap());
    assert!(window.duration_hours.unwrap() > 0.0);
    Ok(())
}

#[test]
fn swapped_coordinates_and_removal_keywords() -> Result<()> {
    let output = run_visit_pipeline(&load_inputs()?, &context()?);

    let gz = by_id(&output.visits, "104");
    let point = gz.location.expect("location");
    assert!((point.latitude - 52.5168).abs() < 1e-9);
    let sun = gz.sun_times.expect("sun times");
    let window = gz.suggested.as_ref().expect("window");
    assert_eq!(window.start, Some(sun.sunset - Duration::minutes(90)));
    assert_eq!(window.end, Some(sun.sunset + Duration::minutes(30)));

    let zr = by_id(&output.visits, "105");
    let classification = zr.classification.as_ref().expect("classified");
    assert_eq!(classification.keep, KeepFlag::Remove);
    assert_eq!(classification.project_code.as_deref(), Some("ZR"));
    Ok(())
}

#[test]
fn unlocated_visit_passes_through_unflagged() -> Result<()> {
    let output = run_visit_pipeline(&load_inputs()?, &context()?);
    let visit = by_id(&output.visits, "106");

    assert_eq!(visit.location_source, LocationSource::None);
    assert!(visit.sun_times.is_none());
    let window = visit.suggested.as_ref().expect("window");
    assert!(!window.rules_applied);
    assert_eq!(window.start, visit.recorded_start);
    assert_eq!(window.end, visit.recorded_end);
    assert!(!visit.review.as_ref().expect("review").is_flagged());
    Ok(())
}
