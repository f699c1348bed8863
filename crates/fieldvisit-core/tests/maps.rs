use std::collections::HashMap;
use std::fs;

use anyhow::Result;
use chrono_tz::Europe::Amsterdam;

use fieldvisit_core::locations::{wgs84_to_rd, RegionBounds};
use fieldvisit_core::maps::{extent, feature_collection, render_html, write_project_maps};
use fieldvisit_core::observations::enrich_observations;
use fieldvisit_core::GeoPoint;
use fieldvisit_parser::ObservationRecord;

fn observation(project: &str, lat: f64, lon: f64, species: &str) -> ObservationRecord {
    ObservationRecord {
        project_name: Some(project.to_string()),
        latitude: Some(lat),
        longitude: Some(lon),
        species: Some(species.to_string()),
        ..Default::default()
    }
}

#[test]
fn extent_is_mean_and_bounds() {
    let points = [
        GeoPoint::new(52.0, 5.0).unwrap(),
        GeoPoint::new(52.2, 5.4).unwrap(),
    ];
    let e = extent(&points).expect("extent");
    assert!((e.center.latitude - 52.1).abs() < 1e-9);
    assert!((e.center.longitude - 5.2).abs() < 1e-9);
    assert_eq!(e.south_west, points[0]);
    assert_eq!(e.north_east, points[1]);
    assert!(extent(&[]).is_none());
}

#[test]
fn features_carry_rd_coordinates() {
    let records = vec![
        observation("Park", 52.0907, 5.1214, "Merel"),
        ObservationRecord {
            project_name: Some("Park".into()),
            species: Some("Vos".into()),
            ..Default::default()
        },
    ];
    let observations =
        enrich_observations(&records, &HashMap::new(), &RegionBounds::default(), Amsterdam);
    let collection = feature_collection(&observations);

    assert_eq!(collection.features.len(), 1);
    let feature = &collection.features[0];
    let properties = feature.properties.as_ref().expect("properties");
    let (x, _) = wgs84_to_rd(GeoPoint::new(52.0907, 5.1214).unwrap());
    assert_eq!(properties["Soort"], "Merel");
    assert_eq!(properties["Groep"], "Vogels");
    assert!((properties["rd_x"].as_f64().unwrap() - x).abs() < 1e-6);
}

#[test]
fn html_fits_bounds_only_for_several_points() {
    let one = [GeoPoint::new(52.0, 5.0).unwrap()];
    let single = render_html("Park <noord>", "{}", &extent(&one).unwrap(), 1);
    assert!(single.contains("setView([52, 5], 14)"));
    assert!(!single.contains("fitBounds"));
    assert!(single.contains("Park &lt;noord&gt;"));

    let two = [
        GeoPoint::new(52.0, 5.0).unwrap(),
        GeoPoint::new(52.5, 5.5).unwrap(),
    ];
    let multi = render_html("Park", "{}", &extent(&two).unwrap(), 2);
    assert!(multi.contains("map.fitBounds([[52, 5], [52.5, 5.5]]);"));
}

#[test]
fn writes_one_directory_per_project() -> Result<()> {
    let records = vec![
        observation("Park Noord", 52.0907, 5.1214, "Merel"),
        observation("Park Noord", 52.0910, 5.1220, "Laatvlieger"),
        observation("Kerkpad", 52.5168, 6.0944, "Huismus"),
    ];
    let observations =
        enrich_observations(&records, &HashMap::new(), &RegionBounds::default(), Amsterdam);
    let dir = tempfile::tempdir()?;

    let maps = write_project_maps(&observations, dir.path())?;
    assert_eq!(maps.len(), 2);

    let park = maps.iter().find(|m| m.project == "Park Noord").expect("park map");
    assert_eq!(park.points, 2);
    assert_eq!(park.directory, dir.path().join("waarn_park_noord"));
    assert!(park.html_path.ends_with("map_park_noord.html"));

    let geojson: serde_json::Value = serde_json::from_str(&fs::read_to_string(&park.geojson_path)?)?;
    assert_eq!(geojson["type"], "FeatureCollection");
    assert_eq!(geojson["features"].as_array().map(Vec::len), Some(2));
    Ok(())
}
