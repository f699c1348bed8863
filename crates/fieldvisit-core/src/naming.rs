use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::rules::Protocol;

static PROJECT_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([vw]m[- ]?\d+|gz|zr|hm|uitvliegtelling)").expect("valid project code pattern")
});

static DAY_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(avond|ochtend)\s*(?:([0-9]+)|(i{1,3})\b)?").expect("valid day part pattern")
});

static SINGLE_DIGIT_VM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^VM(\d)$").expect("valid vm padding pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Period {
    Evening,
    Morning,
}

impl Period {
    pub fn label(&self) -> &'static str {
        match self {
            Period::Evening => "avond",
            Period::Morning => "ochtend",
        }
    }
}

/// Time-of-day label of a visit, e.g. `avond 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayPart {
    pub period: Period,
    pub ordinal: Option<u32>,
}

impl fmt::Display for DayPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ordinal {
            Some(n) => write!(f, "{} {}", self.period.label(), n),
            None => f.write_str(self.period.label()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeepFlag {
    Keep,
    Remove,
}

impl KeepFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeepFlag::Keep => "keep",
            KeepFlag::Remove => "remove",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisitClassification {
    pub project_code: Option<String>,
    pub protocol: Protocol,
    pub day_part: Option<DayPart>,
    pub keep: KeepFlag,
    pub cleaned_name: Option<String>,
}

impl VisitClassification {
    pub fn period(&self) -> Option<Period> {
        self.day_part.map(|part| part.period)
    }
}

/// First protocol code in `name`, normalised: uppercase, no separators, `WM` read as `VM` and
/// single-digit VM codes zero-padded (`vm-1` becomes `VM01`).
pub fn extract_project_code(name: &str) -> Option<String> {
    let raw = PROJECT_CODE.find(name)?.as_str();
    let mut code: String = raw
        .to_uppercase()
        .chars()
        .filter(|c| *c != '-' && *c != ' ')
        .collect();
    if let Some(rest) = code.strip_prefix("WM") {
        code = format!("VM{rest}");
    }
    if let Some(caps) = SINGLE_DIGIT_VM.captures(&code) {
        code = format!("VM0{}", &caps[1]);
    }
    Some(code)
}

pub fn extract_day_part(name: &str) -> Option<DayPart> {
    let caps = DAY_PART.captures(name)?;
    let period = if caps[1].eq_ignore_ascii_case("avond") {
        Period::Evening
    } else {
        Period::Morning
    };
    let ordinal = caps
        .get(2)
        .or_else(|| caps.get(3))
        .and_then(|m| parse_ordinal(m.as_str()));
    Some(DayPart { period, ordinal })
}

fn parse_ordinal(value: &str) -> Option<u32> {
    match value.to_ascii_lowercase().as_str() {
        "i" => Some(1),
        "ii" => Some(2),
        "iii" => Some(3),
        digits => digits.parse().ok(),
    }
}

/// Case-insensitive substring match against the removal keywords.
pub fn matches_removal_keyword(name: &str, keywords: &[String]) -> bool {
    let lowered = name.to_lowercase();
    keywords
        .iter()
        .map(|keyword| keyword.trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .any(|keyword| lowered.contains(&keyword))
}

pub fn classify(name: Option<&str>, removal_keywords: &[String]) -> VisitClassification {
    let name = name.unwrap_or("");
    let project_code = extract_project_code(name);
    let day_part = extract_day_part(name);
    let keep = if matches_removal_keyword(name, removal_keywords) {
        KeepFlag::Remove
    } else {
        KeepFlag::Keep
    };
    let cleaned_name = project_code.as_ref().map(|code| match day_part {
        Some(part) => format!("{code} {part}"),
        None => code.clone(),
    });
    let protocol = Protocol::from_code(project_code.as_deref());

    VisitClassification {
        project_code,
        protocol,
        day_part,
        keep,
        cleaned_name,
    }
}
