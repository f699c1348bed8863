//! Per-project observation maps: a GeoJSON layer plus a standalone Leaflet page.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use tracing::info;

use crate::locations::wgs84_to_rd;
use crate::observations::EnrichedObservation;
use crate::outputs::safe_name;
use crate::types::GeoPoint;

const POPUP_FIELDS: &[&str] = &["Soort", "Adres", "Plaats", "Datum"];

#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialise GeoJSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct ProjectMap {
    pub project: String,
    pub directory: PathBuf,
    pub geojson_path: PathBuf,
    pub html_path: PathBuf,
    pub points: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapExtent {
    pub center: GeoPoint,
    pub south_west: GeoPoint,
    pub north_east: GeoPoint,
}

/// Mean point and bounding box of `points`.
pub fn extent(points: &[GeoPoint]) -> Option<MapExtent> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let center = GeoPoint {
        latitude: points.iter().map(|p| p.latitude).sum::<f64>() / n,
        longitude: points.iter().map(|p| p.longitude).sum::<f64>() / n,
    };
    let mut south_west = points[0];
    let mut north_east = points[0];
    for point in points {
        south_west.latitude = south_west.latitude.min(point.latitude);
        south_west.longitude = south_west.longitude.min(point.longitude);
        north_east.latitude = north_east.latitude.max(point.latitude);
        north_east.longitude = north_east.longitude.max(point.longitude);
    }
    Some(MapExtent {
        center,
        south_west,
        north_east,
    })
}

fn observation_feature(observation: &EnrichedObservation, point: GeoPoint) -> Feature {
    let (rd_x, rd_y) = wgs84_to_rd(point);
    let text = |value: Option<&str>| value.map_or(JsonValue::Null, JsonValue::from);

    let mut properties = Map::new();
    properties.insert("Soort".into(), text(observation.record.species.as_deref()));
    properties.insert("Adres".into(), text(observation.street_address.as_deref()));
    properties.insert("Plaats".into(), text(observation.place.as_deref()));
    properties.insert(
        "Datum".into(),
        observation
            .date
            .map_or(JsonValue::Null, |d| JsonValue::from(d.format("%Y-%m-%d").to_string())),
    );
    properties.insert("Groep".into(), JsonValue::from(observation.group.label()));
    properties.insert("Aantal".into(), JsonValue::from(observation.count));
    properties.insert("Gedrag".into(), text(observation.record.behaviour.as_deref()));
    properties.insert("Functie".into(), text(observation.function.map(|f| f.label())));
    properties.insert("rd_x".into(), JsonValue::from(rd_x));
    properties.insert("rd_y".into(), JsonValue::from(rd_y));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![
            point.longitude,
            point.latitude,
        ]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Located observations as a WGS84 feature collection; unlocated ones are skipped.
pub fn feature_collection(observations: &[EnrichedObservation]) -> FeatureCollection {
    let features = observations
        .iter()
        .filter_map(|o| o.point.map(|p| observation_feature(o, p)))
        .collect();
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Self-contained Leaflet page with the collection inlined. Centred on the mean point, and
/// fitted to the bounds when there is more than one point.
pub fn render_html(title: &str, geojson: &str, extent: &MapExtent, points: usize) -> String {
    let popup_fields = POPUP_FIELDS
        .iter()
        .map(|f| format!("\"{f}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let fit_bounds = if points > 1 {
        format!(
            "map.fitBounds([[{}, {}], [{}, {}]]);",
            extent.south_west.latitude,
            extent.south_west.longitude,
            extent.north_east.latitude,
            extent.north_east.longitude
        )
    } else {
        String::new()
    };
    let title = html_escape(title);

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>html, body, #map {{ height: 100%; margin: 0; }}</style>
</head>
<body>
<div id="map"></div>
<script>
const data = {geojson};
const popupFields = [{popup_fields}];
const map = L.map("map").setView([{lat}, {lon}], 14);
L.tileLayer("https://{{s}}.tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png", {{
  attribution: "&copy; OpenStreetMap contributors"
}}).addTo(map);
L.geoJSON(data, {{
  onEachFeature: (feature, layer) => {{
    const rows = popupFields
      .filter((key) => feature.properties[key] !== null && feature.properties[key] !== undefined)
      .map((key) => `<b>${{key}}</b>: ${{feature.properties[key]}}`);
    layer.bindPopup(rows.join("<br>"));
  }}
}}).addTo(map);
{fit_bounds}
</script>
</body>
</html>
"#,
        lat = extent.center.latitude,
        lon = extent.center.longitude,
    )
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Writes `waarn_{project}/` with a GeoJSON layer and an HTML map for every project that has
/// at least one located observation.
pub fn write_project_maps(
    observations: &[EnrichedObservation],
    out_root: &Path,
) -> Result<Vec<ProjectMap>, MapError> {
    let mut per_project: BTreeMap<&str, Vec<EnrichedObservation>> = BTreeMap::new();
    for observation in observations.iter().filter(|o| o.point.is_some()) {
        let project = observation.project_name.as_deref().unwrap_or("unknown");
        per_project
            .entry(project)
            .or_default()
            .push(observation.clone());
    }

    let mut maps = Vec::new();
    for (project, rows) in per_project {
        let points: Vec<GeoPoint> = rows.iter().filter_map(|o| o.point).collect();
        let Some(bounds) = extent(&points) else {
            continue;
        };

        let safe = safe_name(project);
        let directory = out_root.join(format!("waarn_{safe}"));
        let io_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source| MapError::Io { path, source }
        };
        fs::create_dir_all(&directory).map_err(io_error(&directory))?;

        let geojson = serde_json::to_string(&feature_collection(&rows))?;
        let geojson_path = directory.join(format!("waarn_{safe}.geojson"));
        fs::write(&geojson_path, &geojson).map_err(io_error(&geojson_path))?;

        let html_path = directory.join(format!("map_{safe}.html"));
        let html = render_html(project, &geojson, &bounds, points.len());
        fs::write(&html_path, html).map_err(io_error(&html_path))?;

        maps.push(ProjectMap {
            project: project.to_string(),
            directory,
            geojson_path,
            html_path,
            points: points.len(),
        });
    }

    info!(maps = maps.len(), root = %out_root.display(), "project maps written");
    Ok(maps)
}
