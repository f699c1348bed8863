use crate::errors::ParserError;
use crate::model::{ParsedExport, ProjectRecord};
use crate::registry::ExportParser;

use super::{cell, parse_optional_text, parse_required_text, read_table};

pub struct ProjectExportParser;

impl ProjectExportParser {
    const NAME: &'static str = "PROJECT_EXPORT";

    pub fn parse_records(&self, content: &str) -> Result<Vec<ProjectRecord>, ParserError> {
        let (header, rows) = read_table(Self::NAME, content)?;

        let id_col = header.require(Self::NAME, &["ID", "Project ID", "project_id"])?;
        let city_col = header.require(Self::NAME, &["Stad", "Plaats"])?;
        let name_col = header.find(&["Naam", "Projectnaam"]);

        let mut projects = Vec::with_capacity(rows.len());
        for (line_index, record) in rows {
            projects.push(ProjectRecord {
                project_id: parse_required_text(
                    Self::NAME,
                    cell(&record, Some(id_col)),
                    line_index,
                    "ID",
                )?,
                name: parse_optional_text(cell(&record, name_col)),
                city: parse_optional_text(cell(&record, Some(city_col))),
            });
        }

        if projects.is_empty() {
            return Err(ParserError::EmptyData { parser: Self::NAME });
        }

        Ok(projects)
    }
}

impl ExportParser for ProjectExportParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, content: &str) -> Result<ParsedExport, ParserError> {
        self.parse_records(content).map(ParsedExport::Projects)
    }
}
