use std::collections::HashMap;

use fieldvisit_parser::ObservationRecord;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{FieldVisit, GeoPoint, LocationSource};

const RD_ORIGIN_X: f64 = 155_000.0;
const RD_ORIGIN_Y: f64 = 463_000.0;
const AMERSFOORT_LAT: f64 = 52.155_174_40;
const AMERSFOORT_LON: f64 = 5.387_206_21;

/// Latitude/longitude box used to tell plausible WGS84 pairs from swapped or projected ones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Default for RegionBounds {
    fn default() -> Self {
        Self {
            min_lat: 50.5,
            max_lat: 53.8,
            min_lon: 3.0,
            max_lon: 7.5,
        }
    }
}

impl RegionBounds {
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&latitude)
            && (self.min_lon..=self.max_lon).contains(&longitude)
    }

    pub fn is_valid(&self) -> bool {
        self.min_lat < self.max_lat && self.min_lon < self.max_lon
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoordinateSystem {
    Wgs84,
    Wgs84Swapped,
    RdNew,
    RdNewSwapped,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedCoordinate {
    pub point: GeoPoint,
    pub system: CoordinateSystem,
}

/// Works out what a pair of numbers from an export means. Pairs inside the region win as
/// WGS84 (in either order), then pairs that read as RD New metres; anything else is kept
/// only if it is at least a valid WGS84 position.
pub fn detect_coordinate(a: f64, b: f64, region: &RegionBounds) -> Option<ResolvedCoordinate> {
    if !a.is_finite() || !b.is_finite() {
        return None;
    }
    let resolved = |point: GeoPoint, system| Some(ResolvedCoordinate { point, system });

    if region.contains(a, b) {
        return resolved(GeoPoint::new(a, b)?, CoordinateSystem::Wgs84);
    }
    if region.contains(b, a) {
        return resolved(GeoPoint::new(b, a)?, CoordinateSystem::Wgs84Swapped);
    }
    if looks_like_rd(a, b) {
        return resolved(rd_to_wgs84(a, b), CoordinateSystem::RdNew);
    }
    if looks_like_rd(b, a) {
        return resolved(rd_to_wgs84(b, a), CoordinateSystem::RdNewSwapped);
    }
    GeoPoint::new(a, b).map(|point| ResolvedCoordinate {
        point,
        system: CoordinateSystem::Wgs84,
    })
}

fn looks_like_rd(x: f64, y: f64) -> bool {
    (-7_000.0..=300_000.0).contains(&x) && (289_000.0..=629_000.0).contains(&y)
}

/// Parses a `Coördinaten` cell such as `52.0907, 5.1214`.
pub fn parse_coordinate_text(text: &str, region: &RegionBounds) -> Option<ResolvedCoordinate> {
    let mut numbers = text
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<f64>());
    let a = numbers.next()?.ok()?;
    let b = numbers.next()?.ok()?;
    detect_coordinate(a, b, region)
}

/// Position of one observation: the coordinate cell first, the separate columns second.
pub fn observation_point(record: &ObservationRecord, region: &RegionBounds) -> Option<GeoPoint> {
    record
        .coordinates
        .as_deref()
        .and_then(|text| parse_coordinate_text(text, region))
        .or_else(|| match (record.latitude, record.longitude) {
            (Some(lat), Some(lon)) => detect_coordinate(lat, lon, region),
            _ => None,
        })
        .map(|resolved| resolved.point)
}

/// First located observation per visit, in export order.
pub fn first_point_per_visit(
    observations: &[ObservationRecord],
    region: &RegionBounds,
) -> HashMap<String, GeoPoint> {
    let mut points = HashMap::new();
    for record in observations {
        let Some(visit_id) = record.visit_id.as_deref() else {
            continue;
        };
        if points.contains_key(visit_id) {
            continue;
        }
        if let Some(point) = observation_point(record, region) {
            points.insert(visit_id.to_string(), point);
        }
    }
    points
}

/// Gives unlocated visits the first point found among visits of the same project. Visits
/// without a project ID are left alone.
pub fn apply_project_fallback(visits: &mut [FieldVisit]) -> usize {
    let mut project_points: HashMap<String, GeoPoint> = HashMap::new();
    for visit in visits.iter() {
        if let (Some(project_id), Some(point)) = (visit.project_id.as_ref(), visit.location) {
            project_points.entry(project_id.clone()).or_insert(point);
        }
    }

    let mut filled = 0;
    for visit in visits.iter_mut().filter(|v| v.location.is_none()) {
        let Some(project_id) = visit.project_id.as_deref() else {
            continue;
        };
        if let Some(point) = project_points.get(project_id) {
            debug!(visit_id = %visit.visit_id, project_id, "location taken from project");
            visit.location = Some(*point);
            visit.location_source = LocationSource::ProjectFallback;
            filled += 1;
        }
    }
    filled
}

/// RD New (EPSG:28992) metres to WGS84 degrees, polynomial approximation accurate to well
/// under a metre inside the Netherlands.
pub fn rd_to_wgs84(x: f64, y: f64) -> GeoPoint {
    let dx = (x - RD_ORIGIN_X) * 1e-5;
    let dy = (y - RD_ORIGIN_Y) * 1e-5;

    let sum_n = 3235.65389 * dy - 32.58297 * dx.powi(2) - 0.2475 * dy.powi(2)
        - 0.84978 * dx.powi(2) * dy
        - 0.0655 * dy.powi(3)
        - 0.01709 * dx.powi(2) * dy.powi(2)
        - 0.00738 * dx
        + 0.0053 * dx.powi(4)
        - 0.00039 * dx.powi(2) * dy.powi(3)
        + 0.00033 * dx.powi(4) * dy
        - 0.00012 * dx * dy;
    let sum_e = 5260.52916 * dx + 105.94684 * dx * dy + 2.45656 * dx * dy.powi(2)
        - 0.81885 * dx.powi(3)
        + 0.05594 * dx * dy.powi(3)
        - 0.05607 * dx.powi(3) * dy
        + 0.01199 * dy
        - 0.00256 * dx.powi(3) * dy.powi(2)
        + 0.00128 * dx * dy.powi(4)
        + 0.00022 * dy.powi(2)
        - 0.00022 * dx.powi(2)
        + 0.00026 * dx.powi(5);

    GeoPoint {
        latitude: AMERSFOORT_LAT + sum_n / 3600.0,
        longitude: AMERSFOORT_LON + sum_e / 3600.0,
    }
}

/// WGS84 degrees to RD New metres, returned as `(x, y)`.
pub fn wgs84_to_rd(point: GeoPoint) -> (f64, f64) {
    let df = 0.36 * (point.latitude - AMERSFOORT_LAT);
    let dl = 0.36 * (point.longitude - AMERSFOORT_LON);

    let sum_x = 190094.945 * dl - 11832.228 * df * dl - 114.221 * df.powi(2) * dl
        - 32.391 * dl.powi(3)
        - 0.705 * df
        - 2.340 * df.powi(3) * dl
        - 0.608 * df * dl.powi(3)
        - 0.008 * dl.powi(2)
        + 0.148 * df.powi(2) * dl.powi(3);
    let sum_y = 309056.544 * df + 3638.893 * dl.powi(2) + 73.077 * df.powi(2)
        - 157.984 * df * dl.powi(2)
        + 59.788 * df.powi(3)
        + 0.433 * dl
        - 6.439 * df.powi(2) * dl.powi(2)
        - 0.032 * df * dl
        + 0.092 * dl.powi(4)
        - 0.054 * df * dl.powi(4);

    (RD_ORIGIN_X + sum_x, RD_ORIGIN_Y + sum_y)
}
