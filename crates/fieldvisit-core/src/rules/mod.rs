//! Protocol time-window rules.
//!
//! Every rule is a pure function of the working window and the visit's sun times. Rules for a
//! protocol run in a fixed order and later rules see the output of earlier ones.

pub mod protocols;

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::trace;

use crate::naming::Period;
use crate::suntimes::SunTimes;
use crate::timestamps::hours_between;
use crate::types::FieldVisit;

pub use protocols::{rules_for, Protocol, RuleEntry, RULE_TABLE};

/// Start and end of a visit while rules are being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDraft {
    pub start: Option<DateTime<Tz>>,
    pub end: Option<DateTime<Tz>>,
}

impl WindowDraft {
    pub fn new(start: Option<DateTime<Tz>>, end: Option<DateTime<Tz>>) -> Self {
        Self { start, end }
    }

    pub fn duration_hours(&self) -> Option<f64> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(hours_between(&start, &end)),
            _ => None,
        }
    }
}

pub type WindowRule = fn(WindowDraft, &SunTimes) -> WindowDraft;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestedWindow {
    pub start: Option<DateTime<Tz>>,
    pub end: Option<DateTime<Tz>>,
    pub duration_hours: Option<f64>,
    /// False when the visit had no sun times and the recorded window was passed through.
    pub rules_applied: bool,
    /// Names of the rules that changed the window.
    pub adjustments: Vec<&'static str>,
}

impl SuggestedWindow {
    fn from_draft(draft: WindowDraft, rules_applied: bool, adjustments: Vec<&'static str>) -> Self {
        Self {
            start: draft.start,
            end: draft.end,
            duration_hours: draft.duration_hours(),
            rules_applied,
            adjustments,
        }
    }

    pub fn draft(&self) -> WindowDraft {
        WindowDraft::new(self.start, self.end)
    }

    pub fn is_adjusted(&self) -> bool {
        !self.adjustments.is_empty()
    }
}

/// Applies the rules for `protocol` and `period` to the recorded window. Without sun times the
/// recorded window is returned unchanged.
pub fn suggest(
    recorded: WindowDraft,
    protocol: Protocol,
    period: Option<Period>,
    sun: Option<&SunTimes>,
) -> SuggestedWindow {
    let Some(sun) = sun else {
        return SuggestedWindow::from_draft(recorded, false, Vec::new());
    };

    let mut adjustments = Vec::new();
    let draft = rules_for(protocol, period).fold(recorded, |draft, rule| {
        let next = (rule.apply)(draft, sun);
        if next != draft {
            trace!(rule = rule.name, "window adjusted");
            adjustments.push(rule.name);
        }
        next
    });
    SuggestedWindow::from_draft(draft, true, adjustments)
}

pub fn suggest_for_visit(visit: &FieldVisit) -> SuggestedWindow {
    let recorded = WindowDraft::new(visit.recorded_start, visit.recorded_end);
    let (protocol, period) = visit
        .classification
        .as_ref()
        .map(|c| (c.protocol, c.period()))
        .unwrap_or((Protocol::Other, None));
    suggest(recorded, protocol, period, visit.sun_times.as_ref())
}

/// Inclusive interval anchored on a sun event.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Window {
    lower: DateTime<Tz>,
    upper: DateTime<Tz>,
}

impl Window {
    pub(crate) fn around(anchor: DateTime<Tz>, from: Duration, to: Duration) -> Self {
        Self {
            lower: anchor + from,
            upper: anchor + to,
        }
    }

    pub(crate) fn lower(&self) -> DateTime<Tz> {
        self.lower
    }

    pub(crate) fn upper(&self) -> DateTime<Tz> {
        self.upper
    }

    pub(crate) fn contains(&self, t: &DateTime<Tz>) -> bool {
        *t >= self.lower && *t <= self.upper
    }

    pub(crate) fn clamp(&self, t: DateTime<Tz>) -> DateTime<Tz> {
        if t < self.lower {
            self.lower
        } else if t > self.upper {
            self.upper
        } else {
            t
        }
    }

    /// Leaves `t` alone inside the window, otherwise replaces it with `target`.
    pub(crate) fn snap(&self, t: DateTime<Tz>, target: DateTime<Tz>) -> DateTime<Tz> {
        if self.contains(&t) {
            t
        } else {
            target
        }
    }
}
