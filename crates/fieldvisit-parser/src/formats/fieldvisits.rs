use crate::errors::ParserError;
use crate::model::{FieldVisitRecord, ParsedExport};
use crate::registry::ExportParser;

use super::{
    cell, parse_decimal, parse_export_timestamp, parse_optional_text, parse_required_text,
    read_table,
};

pub struct FieldVisitExportParser;

impl FieldVisitExportParser {
    const NAME: &'static str = "FIELDVISIT_EXPORT";

    pub fn parse_records(&self, content: &str) -> Result<Vec<FieldVisitRecord>, ParserError> {
        let (header, rows) = read_table(Self::NAME, content)?;

        let project_col = header.require(Self::NAME, &["project_id", "Project ID"])?;
        let start_col = header.require(Self::NAME, &["Startdatum"])?;
        // The app writes the visit ID as an unnamed or `ID` first column.
        let visit_col = header
            .find(&["ID", "Veldbezoek ID", "Veldbezoek_ID"])
            .or(if header.len() > 0 { Some(0) } else { None });
        let name_col = header.find(&["Naam"]);
        let end_col = header.find(&["Einddatum"]);
        let duration_col = header.find(&["Duur (uren)", "Duur"]);
        let project_name_col = header.find(&["Project Naam", "Projectnaam"]);

        if rows.is_empty() {
            return Err(ParserError::EmptyData { parser: Self::NAME });
        }

        let mut visits = Vec::with_capacity(rows.len());
        for (line_index, record) in rows {
            let visit_id =
                parse_required_text(Self::NAME, cell(&record, visit_col), line_index, "ID")?;
            let project_id = parse_optional_text(cell(&record, Some(project_col)));

            visits.push(FieldVisitRecord {
                visit_id,
                project_id,
                project_name: parse_optional_text(cell(&record, project_name_col)),
                name: parse_optional_text(cell(&record, name_col)),
                start: parse_export_timestamp(cell(&record, Some(start_col))),
                end: parse_export_timestamp(cell(&record, end_col)),
                duration_hours: parse_decimal(cell(&record, duration_col)),
            });
        }

        Ok(visits)
    }
}

impl ExportParser for FieldVisitExportParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, content: &str) -> Result<ParsedExport, ParserError> {
        self.parse_records(content).map(ParsedExport::FieldVisits)
    }
}
