use chrono::Duration;
use serde::Serialize;

use super::{Window, WindowDraft, WindowRule};
use crate::naming::Period;
use crate::suntimes::SunTimes;
use crate::timestamps::{minute_of_day, next_calendar_day, with_clock};

/// Counting protocol a visit follows, taken from its project code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Protocol {
    /// `VM01`: bat roost count, either around dusk or before dawn.
    Vm01,
    /// `VM02`: late evening bat round, clock-time based.
    Vm02,
    /// `GZ`: dusk bird count.
    Gz,
    /// `ZR`: dawn bird count.
    Zr,
    Other,
}

impl Protocol {
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("VM01") => Protocol::Vm01,
            Some("VM02") => Protocol::Vm02,
            Some("GZ") => Protocol::Gz,
            Some("ZR") => Protocol::Zr,
            _ => Protocol::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Vm01 => "VM01",
            Protocol::Vm02 => "VM02",
            Protocol::Gz => "GZ",
            Protocol::Zr => "ZR",
            Protocol::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodFilter {
    Any,
    Only(Period),
}

impl PeriodFilter {
    fn matches(&self, period: Option<Period>) -> bool {
        match self {
            PeriodFilter::Any => true,
            PeriodFilter::Only(wanted) => period == Some(*wanted),
        }
    }
}

pub struct RuleEntry {
    pub protocol: Protocol,
    pub periods: PeriodFilter,
    pub name: &'static str,
    pub apply: WindowRule,
}

/// All rules in application order.
pub static RULE_TABLE: &[RuleEntry] = &[
    RuleEntry {
        protocol: Protocol::Vm01,
        periods: PeriodFilter::Only(Period::Evening),
        name: "vm01_evening_start",
        apply: vm01_evening_start,
    },
    RuleEntry {
        protocol: Protocol::Vm01,
        periods: PeriodFilter::Only(Period::Evening),
        name: "vm01_evening_end",
        apply: vm01_evening_end,
    },
    RuleEntry {
        protocol: Protocol::Vm01,
        periods: PeriodFilter::Only(Period::Morning),
        name: "vm01_morning_end",
        apply: vm01_morning_end,
    },
    RuleEntry {
        protocol: Protocol::Vm01,
        periods: PeriodFilter::Only(Period::Morning),
        name: "vm01_morning_start",
        apply: vm01_morning_start,
    },
    RuleEntry {
        protocol: Protocol::Vm02,
        periods: PeriodFilter::Only(Period::Evening),
        name: "vm02_evening_start",
        apply: vm02_evening_start,
    },
    RuleEntry {
        protocol: Protocol::Vm02,
        periods: PeriodFilter::Only(Period::Evening),
        name: "vm02_end_rollover",
        apply: vm02_end_rollover,
    },
    RuleEntry {
        protocol: Protocol::Vm02,
        periods: PeriodFilter::Only(Period::Evening),
        name: "vm02_evening_end",
        apply: vm02_evening_end,
    },
    RuleEntry {
        protocol: Protocol::Gz,
        periods: PeriodFilter::Any,
        name: "gz_start",
        apply: gz_start,
    },
    RuleEntry {
        protocol: Protocol::Gz,
        periods: PeriodFilter::Any,
        name: "gz_end",
        apply: gz_end,
    },
    RuleEntry {
        protocol: Protocol::Zr,
        periods: PeriodFilter::Any,
        name: "zr_start",
        apply: zr_start,
    },
    RuleEntry {
        protocol: Protocol::Zr,
        periods: PeriodFilter::Any,
        name: "zr_end",
        apply: zr_end,
    },
];

pub fn rules_for(
    protocol: Protocol,
    period: Option<Period>,
) -> impl Iterator<Item = &'static RuleEntry> {
    RULE_TABLE
        .iter()
        .filter(move |entry| entry.protocol == protocol && entry.periods.matches(period))
}

fn minutes(n: i64) -> Duration {
    Duration::minutes(n)
}

// VM01 evening: start within [sunset - 1h, sunset], pulled to the nearest edge.
fn vm01_evening_start(draft: WindowDraft, sun: &SunTimes) -> WindowDraft {
    let window = Window::around(sun.sunset, minutes(-60), minutes(0));
    WindowDraft {
        start: draft.start.map(|t| window.clamp(t)),
        ..draft
    }
}

fn vm01_evening_end(draft: WindowDraft, sun: &SunTimes) -> WindowDraft {
    let window = Window::around(sun.sunset, minutes(180), minutes(240));
    WindowDraft {
        end: draft.end.map(|t| window.snap(t, window.lower())),
        ..draft
    }
}

fn vm01_morning_end(draft: WindowDraft, sun: &SunTimes) -> WindowDraft {
    let window = Window::around(sun.sunrise, minutes(0), minutes(240));
    WindowDraft {
        end: draft.end.map(|t| window.snap(t, window.lower())),
        ..draft
    }
}

fn vm01_morning_start(draft: WindowDraft, sun: &SunTimes) -> WindowDraft {
    let window = Window::around(sun.sunrise, minutes(-240), minutes(-180));
    WindowDraft {
        start: draft.start.map(|t| window.snap(t, window.upper())),
        ..draft
    }
}

const VM02_START_EARLIEST: u32 = 22 * 60 + 59;
const VM02_START_LATEST: u32 = 23 * 60 + 59;
const VM02_END_LATEST: u32 = 2 * 60;

// VM02 runs on the clock, not the sun: start between 22:59 and 23:59.
fn vm02_evening_start(draft: WindowDraft, _sun: &SunTimes) -> WindowDraft {
    let start = draft.start.map(|t| {
        if (VM02_START_EARLIEST..=VM02_START_LATEST).contains(&minute_of_day(&t)) {
            t
        } else {
            with_clock(&t, 23, 59).unwrap_or(t)
        }
    });
    WindowDraft { start, ..draft }
}

fn vm02_end_rollover(draft: WindowDraft, _sun: &SunTimes) -> WindowDraft {
    match (draft.start, draft.end) {
        (Some(start), Some(end)) if end <= start => WindowDraft {
            end: Some(next_calendar_day(&end).unwrap_or(end)),
            ..draft
        },
        _ => draft,
    }
}

// End must fall in [00:00, 02:00); any later clock reading is pulled back to 02:00, which also
// covers readings past 03:00.
fn vm02_evening_end(draft: WindowDraft, _sun: &SunTimes) -> WindowDraft {
    let end = draft.end.map(|t| {
        if minute_of_day(&t) < VM02_END_LATEST {
            t
        } else {
            with_clock(&t, 2, 0).unwrap_or(t)
        }
    });
    WindowDraft { end, ..draft }
}

fn gz_start(draft: WindowDraft, sun: &SunTimes) -> WindowDraft {
    let window = Window::around(sun.sunset, minutes(-150), minutes(-90));
    WindowDraft {
        start: draft.start.map(|t| window.snap(t, window.upper())),
        ..draft
    }
}

fn gz_end(draft: WindowDraft, sun: &SunTimes) -> WindowDraft {
    let window = Window::around(sun.sunset, minutes(30), minutes(90));
    WindowDraft {
        end: draft.end.map(|t| window.snap(t, window.lower())),
        ..draft
    }
}

fn zr_start(draft: WindowDraft, sun: &SunTimes) -> WindowDraft {
    let window = Window::around(sun.sunrise, minutes(-150), minutes(-90));
    WindowDraft {
        start: draft.start.map(|t| window.snap(t, window.upper())),
        ..draft
    }
}

fn zr_end(draft: WindowDraft, sun: &SunTimes) -> WindowDraft {
    let window = Window::around(sun.sunrise, minutes(30), minutes(90));
    WindowDraft {
        end: draft.end.map(|t| window.snap(t, window.lower())),
        ..draft
    }
}
