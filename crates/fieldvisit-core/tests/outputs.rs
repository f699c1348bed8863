use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use chrono_tz::Europe::Amsterdam;
use std::collections::HashMap;

use fieldvisit_core::locations::RegionBounds;
use fieldvisit_core::observations::enrich_observations;
use fieldvisit_core::outputs::{
    export_rows, safe_name, visits_frame, write_observation_outputs, write_visit_outputs,
};
use fieldvisit_core::pipelines::{run_visit_pipeline, ExecutionContext, FieldVisitInputs};
use fieldvisit_core::AppConfig;

fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../fieldvisit-parser/tests/data")
}

fn fixture_inputs() -> Result<FieldVisitInputs> {
    let dir = data_dir();
    Ok(FieldVisitInputs::load(
        &dir.join("veldbezoeken_export.csv"),
        &dir.join("waarnemingen_export.csv"),
        &dir.join("projecten_export.csv"),
    )?)
}

#[test]
fn safe_names() {
    assert_eq!(safe_name("Kerkpad Zwolle"), "kerkpad_zwolle");
    assert_eq!(safe_name("Café / De Plek!"), "caf_de_plek_");
    assert_eq!(safe_name("   "), "unknown");
    assert_eq!(safe_name(&"a".repeat(60)).len(), 40);
}

#[test]
fn export_rows_carry_core_fields() -> Result<()> {
    let context = ExecutionContext::from_config(&AppConfig::default())?;
    let output = run_visit_pipeline(&fixture_inputs()?, &context);
    let rows = export_rows(&output.visits);

    let first = &rows[0];
    assert_eq!(first.visit_id, "101");
    assert_eq!(first.cleaned_name.as_deref(), Some("VM01 avond"));
    assert_eq!(first.project_code.as_deref(), Some("VM01"));
    assert_eq!(first.day_part.as_deref(), Some("avond"));
    assert_eq!(first.keep_flag, "keep");
    assert_eq!(first.review_flag, "yes");
    assert_eq!(first.recorded_start.as_deref(), Some("2024-06-15 19:30:00+02:00"));
    assert_eq!(first.suggested_duration_hours, Some(4.0));
    assert_eq!(first.location_source, "observation");

    let unnamed = &rows[5];
    assert_eq!(unnamed.cleaned_name.as_deref(), Some("Losse ronde"));
    assert_eq!(unnamed.review_flag, "no");
    assert_eq!(unnamed.sunrise, None);

    let df = visits_frame(&rows)?;
    assert_eq!(df.height(), 6);
    assert_eq!(df.width(), 20);
    Ok(())
}

#[test]
fn writes_combined_and_per_project_visit_files() -> Result<()> {
    let context = ExecutionContext::from_config(&AppConfig::default())?;
    let output = run_visit_pipeline(&fixture_inputs()?, &context);
    let dir = tempfile::tempdir()?;

    let written = write_visit_outputs(&output.visits, dir.path(), "aanpassingen.csv")?;
    assert_eq!(written.len(), 4);
    assert!(dir.path().join("veldbezoeken_kerkpad_zwolle.csv").exists());
    assert!(dir.path().join("veldbezoeken_zonder_locatie.csv").exists());

    let combined = fs::read_to_string(dir.path().join("aanpassingen.csv"))?;
    let lines: Vec<&str> = combined.lines().collect();
    assert_eq!(lines.len(), 7);
    assert!(lines[0].starts_with("project_id;veldbezoek_ID;check_data;reden_controle;verwijderd"));
    assert!(lines[1].starts_with("P1;101;yes;start_changed|end_changed|duration_changed;keep"));
    assert!(lines[6].starts_with("P3;106;no;;keep"));
    Ok(())
}

#[test]
fn writes_observation_files_per_project() -> Result<()> {
    let content = fs::read_to_string(data_dir().join("waarnemingen_export.csv"))?;
    let records = fieldvisit_parser::parse_observations(&content)?;
    let observations =
        enrich_observations(&records, &HashMap::new(), &RegionBounds::default(), Amsterdam);
    let dir = tempfile::tempdir()?;

    let written = write_observation_outputs(&observations, dir.path())?;
    assert_eq!(written.len(), 2);

    let utrecht =
        fs::read_to_string(dir.path().join("waarnemingen_export_dorpsstraat_utrecht.csv"))?;
    let lines: Vec<&str> = utrecht.lines().collect();
    assert_eq!(
        lines[0],
        "Verblijfnummer;Groep;Soort;Datum;Tijd;Aantal;Gedrag;Verblijfplaats;Sekse;Adres;Plaats;Locatie_adres;Functie;Projectnaam"
    );
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains(";Vleermuizen;Gewone dwergvleermuis;2024-06-15;22:10:00;"));
    assert!(lines[1].contains(";kraamverblijfplaats;Dorpsstraat Utrecht"));
    Ok(())
}
