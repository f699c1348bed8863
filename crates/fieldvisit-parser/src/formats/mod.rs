mod common;
mod fieldvisits;
mod observations;
mod projects;

pub use fieldvisits::FieldVisitExportParser;
pub use observations::ObservationExportParser;
pub use projects::ProjectExportParser;

pub(crate) use common::{
    cell, parse_decimal, parse_export_timestamp, parse_optional_text, parse_required_text,
    read_table,
};

use crate::errors::ParserError;
use crate::model::{FieldVisitRecord, ObservationRecord, ProjectRecord};

pub fn parse_fieldvisits(content: &str) -> Result<Vec<FieldVisitRecord>, ParserError> {
    FieldVisitExportParser.parse_records(content)
}

pub fn parse_observations(content: &str) -> Result<Vec<ObservationRecord>, ParserError> {
    ObservationExportParser.parse_records(content)
}

pub fn parse_projects(content: &str) -> Result<Vec<ProjectRecord>, ParserError> {
    ProjectExportParser.parse_records(content)
}
