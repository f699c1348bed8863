use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use serde::Serialize;

use crate::rules::SuggestedWindow;
use crate::types::FieldVisit;

#[derive(Debug, Clone)]
pub struct ReviewSettings {
    pub time_tolerance: Duration,
    pub duration_tolerance_hours: f64,
    /// Codes whose visits always need a human look (prefix match, e.g. `VM03`).
    pub manual_review_codes: Vec<String>,
    pub flag_unrecognized_names: bool,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            time_tolerance: Duration::zero(),
            duration_tolerance_hours: 1e-6,
            manual_review_codes: vec!["VM03".to_string()],
            flag_unrecognized_names: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReviewReason {
    StartChanged,
    EndChanged,
    DurationChanged,
    NonPositiveDuration,
    ManualReviewProtocol,
    UnrecognizedName,
}

impl ReviewReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewReason::StartChanged => "start_changed",
            ReviewReason::EndChanged => "end_changed",
            ReviewReason::DurationChanged => "duration_changed",
            ReviewReason::NonPositiveDuration => "non_positive_duration",
            ReviewReason::ManualReviewProtocol => "manual_review_protocol",
            ReviewReason::UnrecognizedName => "unrecognized_name",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReviewOutcome {
    pub reasons: Vec<ReviewReason>,
}

impl ReviewOutcome {
    pub fn is_flagged(&self) -> bool {
        !self.reasons.is_empty()
    }

    pub fn label(&self) -> &'static str {
        if self.is_flagged() {
            "yes"
        } else {
            "no"
        }
    }

    /// Reasons joined with `|`, or `None` for an unflagged visit.
    pub fn explanation(&self) -> Option<String> {
        if self.reasons.is_empty() {
            None
        } else {
            Some(
                self.reasons
                    .iter()
                    .map(ReviewReason::as_str)
                    .collect::<Vec<_>>()
                    .join("|"),
            )
        }
    }
}

/// Decides whether a visit needs manual review. Visits whose window was passed through
/// without sun times are never flagged.
pub fn flag(visit: &FieldVisit, window: &SuggestedWindow, settings: &ReviewSettings) -> ReviewOutcome {
    let mut outcome = ReviewOutcome::default();
    if !window.rules_applied {
        return outcome;
    }

    if times_differ(visit.recorded_start, window.start, settings.time_tolerance) {
        outcome.reasons.push(ReviewReason::StartChanged);
    }
    if times_differ(visit.recorded_end, window.end, settings.time_tolerance) {
        outcome.reasons.push(ReviewReason::EndChanged);
    }

    let recorded_duration = visit.effective_recorded_duration();
    let duration_changed = match (recorded_duration, window.duration_hours) {
        (Some(recorded), Some(suggested)) => {
            (recorded - suggested).abs() > settings.duration_tolerance_hours
        }
        (None, None) => false,
        _ => true,
    };
    if duration_changed {
        outcome.reasons.push(ReviewReason::DurationChanged);
    }

    if matches!(window.duration_hours, Some(hours) if hours <= 0.0) {
        outcome.reasons.push(ReviewReason::NonPositiveDuration);
    }

    let classification = visit.classification.as_ref();
    let code = classification.and_then(|c| c.project_code.as_deref());
    if let Some(code) = code {
        let upper = code.to_uppercase();
        if settings
            .manual_review_codes
            .iter()
            .any(|manual| upper.starts_with(&manual.to_uppercase()))
        {
            outcome.reasons.push(ReviewReason::ManualReviewProtocol);
        }
    }

    let unrecognized = classification.map_or(true, |c| c.cleaned_name.is_none());
    if settings.flag_unrecognized_names && unrecognized {
        outcome.reasons.push(ReviewReason::UnrecognizedName);
    }

    outcome
}

fn times_differ(
    recorded: Option<DateTime<Tz>>,
    suggested: Option<DateTime<Tz>>,
    tolerance: Duration,
) -> bool {
    match (recorded, suggested) {
        (Some(a), Some(b)) => (a - b).abs() > tolerance,
        (None, None) => false,
        _ => true,
    }
}
