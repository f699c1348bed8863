use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A timestamp as it appeared in an export: either a bare local clock reading or an instant
/// that carried its own UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportTimestamp {
    Local(NaiveDateTime),
    Offset(DateTime<FixedOffset>),
}

impl ExportTimestamp {
    /// Calendar date as written in the export.
    pub fn written_date(&self) -> NaiveDate {
        match self {
            ExportTimestamp::Local(naive) => naive.date(),
            ExportTimestamp::Offset(dt) => dt.date_naive(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportKind {
    FieldVisits,
    Observations,
    Projects,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::FieldVisits => "fieldvisits",
            ExportKind::Observations => "observations",
            ExportKind::Projects => "projects",
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the field-visit export (`veldbezoeken_export_*.csv`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldVisitRecord {
    pub visit_id: String,
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    pub name: Option<String>,
    pub start: Option<ExportTimestamp>,
    pub end: Option<ExportTimestamp>,
    pub duration_hours: Option<f64>,
}

/// One row of the observation export (`waarnemingen_export_*.csv`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub visit_id: Option<String>,
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    /// Raw `Coördinaten` cell, usually "lat, lon".
    pub coordinates: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub species: Option<String>,
    pub count: Option<f64>,
    pub behaviour: Option<String>,
    pub seen_at: Option<ExportTimestamp>,
    pub roost: Option<String>,
    pub sex: Option<String>,
    pub remark: Option<String>,
}

/// One row of the project export (`projecten_export_*.csv`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub project_id: String,
    pub name: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedExport {
    FieldVisits(Vec<FieldVisitRecord>),
    Observations(Vec<ObservationRecord>),
    Projects(Vec<ProjectRecord>),
}

impl ParsedExport {
    pub fn kind(&self) -> ExportKind {
        match self {
            ParsedExport::FieldVisits(_) => ExportKind::FieldVisits,
            ParsedExport::Observations(_) => ExportKind::Observations,
            ParsedExport::Projects(_) => ExportKind::Projects,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ParsedExport::FieldVisits(rows) => rows.len(),
            ParsedExport::Observations(rows) => rows.len(),
            ParsedExport::Projects(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
