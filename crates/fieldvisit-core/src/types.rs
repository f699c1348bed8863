// crates/fieldvisit-core/src/types.rs

use std::fmt;

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::naming::VisitClassification;
use crate::review::ReviewOutcome;
use crate::rules::SuggestedWindow;
use crate::suntimes::SunTimes;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Returns a point only when both components are finite and within the WGS84 ranges.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let point = Self {
            latitude,
            longitude,
        };
        point.is_valid().then_some(point)
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Key used by the reverse-geocoding cache.
    pub fn cache_key(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

/// Where a visit's location came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    Observation,
    ProjectFallback,
    #[default]
    None,
}

impl LocationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationSource::Observation => "observation",
            LocationSource::ProjectFallback => "project_fallback",
            LocationSource::None => "none",
        }
    }
}

/// A field visit as it moves through the pipeline. The recorded fields come straight from the
/// export; the derived fields are filled in stage by stage.
#[derive(Debug, Clone)]
pub struct FieldVisit {
    pub visit_id: String,
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    pub city: Option<String>,
    pub raw_name: Option<String>,
    pub recorded_start: Option<DateTime<Tz>>,
    pub recorded_end: Option<DateTime<Tz>>,
    pub recorded_duration_hours: Option<f64>,
    pub location: Option<GeoPoint>,
    pub location_source: LocationSource,
    pub classification: Option<VisitClassification>,
    pub sun_times: Option<SunTimes>,
    pub suggested: Option<SuggestedWindow>,
    pub review: Option<ReviewOutcome>,
}

impl FieldVisit {
    pub fn new(visit_id: impl Into<String>, project_id: Option<String>) -> Self {
        Self {
            visit_id: visit_id.into(),
            project_id,
            project_name: None,
            city: None,
            raw_name: None,
            recorded_start: None,
            recorded_end: None,
            recorded_duration_hours: None,
            location: None,
            location_source: LocationSource::None,
            classification: None,
            sun_times: None,
            suggested: None,
            review: None,
        }
    }

    /// Local calendar date of the recorded start; sun times are resolved for this day.
    pub fn visit_date(&self) -> Option<NaiveDate> {
        self.recorded_start.map(|dt| dt.date_naive())
    }

    /// Recorded duration, derived from the recorded times when the export left it blank.
    pub fn effective_recorded_duration(&self) -> Option<f64> {
        self.recorded_duration_hours.or_else(|| {
            match (self.recorded_start, self.recorded_end) {
                (Some(start), Some(end)) => Some(crate::timestamps::hours_between(&start, &end)),
                _ => None,
            }
        })
    }
}
