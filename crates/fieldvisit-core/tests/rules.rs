use chrono::{DateTime, Duration, NaiveDate};
use chrono_tz::Europe::Amsterdam;
use chrono_tz::Tz;

use fieldvisit_core::naming::Period;
use fieldvisit_core::rules::{suggest, Protocol, WindowDraft, RULE_TABLE};
use fieldvisit_core::suntimes::SunTimes;
use fieldvisit_core::timestamps::localize;

fn at(d: u32, h: u32, min: u32) -> DateTime<Tz> {
    let naive = NaiveDate::from_ymd_opt(2024, 6, d)
        .and_then(|date| date.and_hms_opt(h, min, 0))
        .unwrap();
    localize(Amsterdam, naive).unwrap()
}

/// Sunrise 05:30 on the 16th, sunset 20:00 on the 15th.
fn sun() -> SunTimes {
    SunTimes {
        sunrise: at(16, 5, 30),
        sunset: at(15, 20, 0),
    }
}

fn window(start: DateTime<Tz>, end: DateTime<Tz>) -> WindowDraft {
    WindowDraft::new(Some(start), Some(end))
}

#[test]
fn vm01_evening_start_clamps_to_nearest_boundary() {
    let s = sun();
    let early = suggest(window(at(15, 18, 0), at(15, 23, 0)), Protocol::Vm01, Some(Period::Evening), Some(&s));
    assert_eq!(early.start, Some(s.sunset - Duration::hours(1)));

    let late = suggest(window(at(15, 20, 30), at(15, 23, 0)), Protocol::Vm01, Some(Period::Evening), Some(&s));
    assert_eq!(late.start, Some(s.sunset));

    let inside = suggest(window(at(15, 19, 30), at(15, 23, 30)), Protocol::Vm01, Some(Period::Evening), Some(&s));
    assert_eq!(inside.start, Some(at(15, 19, 30)));
    assert_eq!(inside.end, Some(at(15, 23, 30)));
    assert!(!inside.is_adjusted());
}

#[test]
fn vm01_evening_end_moves_to_three_hours_after_sunset() {
    let s = sun();
    let w = suggest(window(at(15, 19, 30), at(15, 22, 0)), Protocol::Vm01, Some(Period::Evening), Some(&s));
    assert_eq!(w.end, Some(s.sunset + Duration::hours(3)));
    assert_eq!(w.adjustments, vec!["vm01_evening_end"]);
}

#[test]
fn vm01_morning_window() {
    let s = sun();
    let w = suggest(window(at(16, 0, 30), at(16, 5, 0)), Protocol::Vm01, Some(Period::Morning), Some(&s));
    assert_eq!(w.end, Some(s.sunrise));
    assert_eq!(w.start, Some(s.sunrise - Duration::hours(3)));
    assert_eq!(w.adjustments, vec!["vm01_morning_end", "vm01_morning_start"]);

    let no_period = suggest(window(at(16, 0, 30), at(16, 5, 0)), Protocol::Vm01, None, Some(&s));
    assert!(!no_period.is_adjusted());
}

#[test]
fn vm02_start_moves_to_2359_same_day() {
    let s = sun();
    let w = suggest(window(at(15, 21, 0), at(16, 1, 0)), Protocol::Vm02, Some(Period::Evening), Some(&s));
    assert_eq!(w.start, Some(at(15, 23, 59)));
    assert_eq!(w.end, Some(at(16, 1, 0)));
}

#[test]
fn vm02_end_rolls_over_and_stays_before_two() {
    let s = sun();
    let w = suggest(window(at(15, 23, 30), at(15, 1, 0)), Protocol::Vm02, Some(Period::Evening), Some(&s));
    assert_eq!(w.start, Some(at(15, 23, 30)));
    assert_eq!(w.end, Some(at(16, 1, 0)));
    assert_eq!(w.duration_hours, Some(1.5));
}

#[test]
fn vm02_late_end_is_pulled_back_to_two() {
    let s = sun();
    let w = suggest(window(at(15, 23, 30), at(16, 4, 15)), Protocol::Vm02, Some(Period::Evening), Some(&s));
    assert_eq!(w.end, Some(at(16, 2, 0)));

    let edge = suggest(window(at(15, 23, 30), at(16, 2, 0)), Protocol::Vm02, Some(Period::Evening), Some(&s));
    assert_eq!(edge.end, Some(at(16, 2, 0)));
    assert!(!edge.is_adjusted());
}

#[test]
fn gz_start_clamps_to_ninety_minutes_before_sunset() {
    let s = sun();
    let w = suggest(window(at(15, 17, 0), at(15, 20, 45)), Protocol::Gz, None, Some(&s));
    assert_eq!(w.start, Some(at(15, 18, 30)));
    assert_eq!(w.end, Some(at(15, 20, 45)));

    let late_end = suggest(window(at(15, 18, 0), at(15, 22, 0)), Protocol::Gz, Some(Period::Evening), Some(&s));
    assert_eq!(late_end.start, Some(at(15, 18, 0)));
    assert_eq!(late_end.end, Some(at(15, 20, 30)));
}

#[test]
fn zr_window_around_sunrise() {
    let s = sun();
    let w = suggest(window(at(16, 2, 0), at(16, 8, 0)), Protocol::Zr, Some(Period::Morning), Some(&s));
    assert_eq!(w.start, Some(at(16, 4, 0)));
    assert_eq!(w.end, Some(at(16, 6, 0)));
}

#[test]
fn other_protocols_pass_through() {
    let s = sun();
    let recorded = window(at(15, 10, 0), at(15, 11, 0));
    let w = suggest(recorded, Protocol::Other, Some(Period::Evening), Some(&s));
    assert_eq!(w.draft(), recorded);
    assert!(w.rules_applied);
    assert_eq!(w.duration_hours, Some(1.0));
}

#[test]
fn missing_sun_times_pass_through_for_every_protocol() {
    let recorded = window(at(15, 21, 0), at(15, 1, 0));
    for protocol in [Protocol::Vm01, Protocol::Vm02, Protocol::Gz, Protocol::Zr] {
        let w = suggest(recorded, protocol, Some(Period::Evening), None);
        assert_eq!(w.draft(), recorded, "{protocol:?}");
        assert!(!w.rules_applied);
    }
}

#[test]
fn missing_end_leaves_duration_absent() {
    let s = sun();
    let w = suggest(
        WindowDraft::new(Some(at(15, 17, 0)), None),
        Protocol::Gz,
        None,
        Some(&s),
    );
    assert_eq!(w.start, Some(at(15, 18, 30)));
    assert_eq!(w.end, None);
    assert_eq!(w.duration_hours, None);
}

#[test]
fn duration_is_exactly_end_minus_start() {
    let s = sun();
    let w = suggest(window(at(15, 17, 0), at(15, 19, 0)), Protocol::Gz, None, Some(&s));
    let (start, end) = (w.start.unwrap(), w.end.unwrap());
    let expected = (end - start).num_milliseconds() as f64 / 3_600_000.0;
    assert_eq!(w.duration_hours, Some(expected));
}

#[test]
fn rules_are_idempotent() {
    let s = sun();
    let cases = [
        (Protocol::Vm01, Some(Period::Evening)),
        (Protocol::Vm01, Some(Period::Morning)),
        (Protocol::Vm02, Some(Period::Evening)),
        (Protocol::Gz, None),
        (Protocol::Zr, None),
    ];
    let recorded = [
        window(at(15, 12, 0), at(15, 13, 0)),
        window(at(15, 21, 0), at(15, 1, 0)),
        window(at(15, 23, 30), at(16, 5, 0)),
        window(at(16, 1, 0), at(16, 9, 0)),
        window(at(15, 19, 59), at(16, 0, 1)),
    ];
    for (protocol, period) in cases {
        for input in recorded {
            let first = suggest(input, protocol, period, Some(&s));
            let second = suggest(first.draft(), protocol, period, Some(&s));
            assert_eq!(second.draft(), first.draft(), "{protocol:?} {period:?} {input:?}");
            assert!(second.adjustments.is_empty(), "{protocol:?} {period:?}");
        }
    }
}

#[test]
fn rule_table_keeps_application_order() {
    let names: Vec<&str> = RULE_TABLE.iter().map(|r| r.name).collect();
    assert_eq!(
        names,
        vec![
            "vm01_evening_start",
            "vm01_evening_end",
            "vm01_morning_end",
            "vm01_morning_start",
            "vm02_evening_start",
            "vm02_end_rollover",
            "vm02_evening_end",
            "gz_start",
            "gz_end",
            "zr_start",
            "zr_end",
        ]
    );
}
