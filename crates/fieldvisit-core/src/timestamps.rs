use chrono::offset::LocalResult;
use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone as _, Timelike};
use chrono_tz::Tz;
use fieldvisit_parser::ExportTimestamp;

pub const OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// Attaches `tz` to a local clock reading. On the autumn fold the earlier instant wins. Inside
/// the spring gap the reading is moved one hour forward, which lands on the first valid instant
/// after the jump.
pub fn localize(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => tz.from_local_datetime(&(naive + Duration::hours(1))).earliest(),
    }
}

/// Brings an export timestamp into `tz`. Offset-carrying values keep their instant.
pub fn to_zone(value: ExportTimestamp, tz: Tz) -> Option<DateTime<Tz>> {
    match value {
        ExportTimestamp::Local(naive) => localize(tz, naive),
        ExportTimestamp::Offset(dt) => Some(dt.with_timezone(&tz)),
    }
}

/// Same local calendar day, different clock reading.
pub fn with_clock(dt: &DateTime<Tz>, hour: u32, minute: u32) -> Option<DateTime<Tz>> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    localize(dt.timezone(), dt.date_naive().and_time(time))
}

/// Same local clock reading on the following calendar day.
pub fn next_calendar_day(dt: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let naive = dt.naive_local();
    let date = naive.date().succ_opt()?;
    localize(dt.timezone(), date.and_time(naive.time()))
}

pub fn minute_of_day(dt: &DateTime<Tz>) -> u32 {
    dt.hour() * 60 + dt.minute()
}

pub fn hours_between(start: &DateTime<Tz>, end: &DateTime<Tz>) -> f64 {
    (*end - *start).num_milliseconds() as f64 / 3_600_000.0
}

pub fn format_local(dt: &DateTime<Tz>) -> String {
    dt.format(OUTPUT_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Offset};
    use chrono_tz::Europe::Amsterdam;

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, min, 0))
            .expect("valid timestamp")
    }

    #[test]
    fn autumn_fold_takes_the_earlier_instant() {
        let dt = localize(Amsterdam, naive(2024, 10, 27, 2, 30)).expect("localized");
        assert_eq!(dt.offset().fix().local_minus_utc(), 7200);
    }

    #[test]
    fn spring_gap_moves_forward() {
        let dt = localize(Amsterdam, naive(2024, 3, 31, 2, 30)).expect("localized");
        assert_eq!(dt.naive_local(), naive(2024, 3, 31, 3, 30));
    }

    #[test]
    fn clock_changes_stay_on_the_local_day() {
        let dt = localize(Amsterdam, naive(2024, 6, 15, 22, 10)).expect("localized");
        let moved = with_clock(&dt, 23, 59).expect("moved");
        assert_eq!(moved.naive_local(), naive(2024, 6, 15, 23, 59));
        let next = next_calendar_day(&dt).expect("next day");
        assert_eq!(next.naive_local(), naive(2024, 6, 16, 22, 10));
        assert_eq!(minute_of_day(&dt), 22 * 60 + 10);
    }

    #[test]
    fn offset_values_keep_their_instant() {
        let fixed = chrono::DateTime::parse_from_rfc3339("2024-06-15T20:00:00Z").expect("parse");
        let dt = to_zone(ExportTimestamp::Offset(fixed), Amsterdam).expect("converted");
        assert_eq!(dt.naive_local(), naive(2024, 6, 15, 22, 0));
        assert_eq!(format_local(&dt), "2024-06-15 22:00:00+02:00");
    }
}
