use crate::errors::ParserError;
use crate::model::{ObservationRecord, ParsedExport};
use crate::registry::ExportParser;

use super::{cell, parse_decimal, parse_export_timestamp, parse_optional_text, read_table};

pub struct ObservationExportParser;

impl ObservationExportParser {
    const NAME: &'static str = "OBSERVATION_EXPORT";

    pub fn parse_records(&self, content: &str) -> Result<Vec<ObservationRecord>, ParserError> {
        let (header, rows) = read_table(Self::NAME, content)?;

        let visit_col = header.require(
            Self::NAME,
            &["Veldbezoek ID", "Veldbezoek ID...23", "Veldbezoek_ID"],
        )?;
        let project_col = header.find(&["Project ID", "Project ID...24", "project_id"]);
        let project_name_col = header.find(&["Projectnaam", "Project Naam"]);
        let coord_col = header.find(&["Coördinaten", "Coordinaten", "Coordinates"]);
        let lat_col = header.find(&["Breedtegraad", "Latitude", "lat"]);
        let lon_col = header.find(&["Lengtegraad", "Longitude", "lon"]);

        if coord_col.is_none() && (lat_col.is_none() || lon_col.is_none()) {
            return Err(ParserError::FormatMismatch {
                parser: Self::NAME,
                reason: "missing coordinate columns (Coördinaten or Breedtegraad/Lengtegraad)"
                    .to_string(),
            });
        }

        let species_col = header.find(&["Soort"]);
        let count_col = header.find(&["Aantal"]);
        let behaviour_col = header.find(&["Gedrag"]);
        let seen_col = header.find(&["Gezien op"]);
        let roost_col = header.find(&["Verblijfplaats"]);
        let sex_col = header.find(&["Sekse"]);
        let remark_col = header.find(&["Opmerking"]);

        let mut observations = Vec::with_capacity(rows.len());
        for (_, record) in rows {
            observations.push(ObservationRecord {
                visit_id: parse_optional_text(cell(&record, Some(visit_col))),
                project_id: parse_optional_text(cell(&record, project_col)),
                project_name: parse_optional_text(cell(&record, project_name_col)),
                coordinates: parse_optional_text(cell(&record, coord_col)),
                latitude: parse_decimal(cell(&record, lat_col)),
                longitude: parse_decimal(cell(&record, lon_col)),
                species: parse_optional_text(cell(&record, species_col)),
                count: parse_decimal(cell(&record, count_col)),
                behaviour: parse_optional_text(cell(&record, behaviour_col)),
                seen_at: parse_export_timestamp(cell(&record, seen_col)),
                roost: parse_optional_text(cell(&record, roost_col)),
                sex: parse_optional_text(cell(&record, sex_col)),
                remark: parse_optional_text(cell(&record, remark_col)),
            });
        }

        if observations.is_empty() {
            return Err(ParserError::EmptyData { parser: Self::NAME });
        }

        Ok(observations)
    }
}

impl ExportParser for ObservationExportParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, content: &str) -> Result<ParsedExport, ParserError> {
        self.parse_records(content).map(ParsedExport::Observations)
    }
}
