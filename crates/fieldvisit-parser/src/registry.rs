use crate::errors::{ParserAttempt, ParserError};
use crate::formats::{FieldVisitExportParser, ObservationExportParser, ProjectExportParser};
use crate::model::ParsedExport;

pub trait ExportParser {
    fn name(&self) -> &'static str;
    fn parse(&self, content: &str) -> Result<ParsedExport, ParserError>;
}

/// Recognises which app export `content` is by trying each parser in turn.
pub fn detect_export(content: &str) -> Result<ParsedExport, ParserError> {
    let observations = ObservationExportParser;
    let fieldvisits = FieldVisitExportParser;
    let projects = ProjectExportParser;
    let parsers: [&dyn ExportParser; 3] = [&observations, &fieldvisits, &projects];
    parse_with_parsers(content, &parsers)
}

pub fn parse_with_parsers(
    content: &str,
    parsers: &[&dyn ExportParser],
) -> Result<ParsedExport, ParserError> {
    let mut attempts = Vec::new();

    for parser in parsers {
        match parser.parse(content) {
            Ok(parsed) => return Ok(parsed),
            Err(ParserError::FormatMismatch { reason, .. }) => {
                attempts.push(ParserAttempt::new(parser.name(), reason));
            }
            Err(err) => return Err(err),
        }
    }

    Err(ParserError::NoMatchingParser { attempts })
}
