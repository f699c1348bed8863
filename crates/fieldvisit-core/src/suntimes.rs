//! Sunrise and sunset from the standard sunrise equation (NOAA approximation), good to a
//! minute or two at Dutch latitudes.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::types::GeoPoint;

const J2000: f64 = 2_451_545.0;
const UNIX_EPOCH_JD: f64 = 2_440_587.5;
const OBLIQUITY_DEG: f64 = 23.4397;
const STANDARD_ALTITUDE_DEG: f64 = -0.833;

/// Sunrise and sunset for one visit, in the visit's timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SunTimes {
    pub sunrise: DateTime<Tz>,
    pub sunset: DateTime<Tz>,
}

/// Resolves sun times for a date and location in a fixed zone.
#[derive(Debug, Clone, Copy)]
pub struct SunTimeResolver {
    timezone: Tz,
    elevation_m: f64,
}

impl SunTimeResolver {
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            elevation_m: 0.0,
        }
    }

    pub fn with_elevation(mut self, elevation_m: f64) -> Self {
        self.elevation_m = elevation_m.max(0.0);
        self
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// `None` when the sun does not cross the horizon that day (polar day or night) or the
    /// coordinates are out of range.
    pub fn resolve(&self, date: NaiveDate, latitude: f64, longitude: f64) -> Option<SunTimes> {
        GeoPoint::new(latitude, longitude)?;
        let (sunrise, sunset) = sun_events_utc(date, latitude, longitude, self.elevation_m)?;
        Some(SunTimes {
            sunrise: sunrise.with_timezone(&self.timezone),
            sunset: sunset.with_timezone(&self.timezone),
        })
    }

    pub fn resolve_point(&self, date: Option<NaiveDate>, point: Option<GeoPoint>) -> Option<SunTimes> {
        let (date, point) = (date?, point?);
        self.resolve(date, point.latitude, point.longitude)
    }
}

/// Sunrise and sunset instants (UTC) for the solar day of `date`.
pub fn sun_events_utc(
    date: NaiveDate,
    latitude: f64,
    longitude: f64,
    elevation_m: f64,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let midnight = date.and_hms_opt(0, 0, 0)?.and_utc();
    let julian_date = midnight.timestamp() as f64 / 86_400.0 + UNIX_EPOCH_JD;
    let day_number = (julian_date - J2000 + 0.0008).ceil();

    let mean_solar_noon = day_number + 0.0009 - longitude / 360.0;
    let anomaly = (357.5291 + 0.985_600_28 * mean_solar_noon).rem_euclid(360.0);
    let anomaly_rad = anomaly.to_radians();
    let center = 1.9148 * anomaly_rad.sin()
        + 0.0200 * (2.0 * anomaly_rad).sin()
        + 0.0003 * (3.0 * anomaly_rad).sin();
    let ecliptic_longitude = (anomaly + center + 180.0 + 102.9372).rem_euclid(360.0);
    let lambda = ecliptic_longitude.to_radians();

    let transit = J2000 + mean_solar_noon + 0.0053 * anomaly_rad.sin() - 0.0069 * (2.0 * lambda).sin();

    let sin_declination = lambda.sin() * OBLIQUITY_DEG.to_radians().sin();
    let cos_declination = sin_declination.asin().cos();

    let altitude = STANDARD_ALTITUDE_DEG - 2.076 * elevation_m.sqrt() / 60.0;
    let phi = latitude.to_radians();
    let cos_hour_angle = (altitude.to_radians().sin() - phi.sin() * sin_declination)
        / (phi.cos() * cos_declination);
    if !cos_hour_angle.is_finite() || cos_hour_angle.abs() > 1.0 {
        return None;
    }
    let hour_angle = cos_hour_angle.acos().to_degrees();

    let rise = julian_to_utc(transit - hour_angle / 360.0)?;
    let set = julian_to_utc(transit + hour_angle / 360.0)?;
    Some((rise, set))
}

fn julian_to_utc(julian: f64) -> Option<DateTime<Utc>> {
    let millis = ((julian - UNIX_EPOCH_JD) * 86_400_000.0).round();
    DateTime::from_timestamp_millis(millis as i64)
}
