pub mod errors;
pub mod formats;
pub mod model;
mod registry;

pub use errors::{ParserAttempt, ParserError};
pub use formats::{parse_fieldvisits, parse_observations, parse_projects};
pub use model::{
    ExportKind, ExportTimestamp, FieldVisitRecord, ObservationRecord, ParsedExport, ProjectRecord,
};
pub use registry::{detect_export, parse_with_parsers, ExportParser};
