use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::StringRecord;

use crate::errors::ParserError;
use crate::model::ExportTimestamp;

/// Header row of an export, with lookups that tolerate the column-name drift seen across
/// app versions (case, surrounding whitespace, `...23`-style suffixes from spreadsheet tools).
#[derive(Debug, Clone)]
pub(crate) struct HeaderIndex {
    normalized: Vec<String>,
}

impl HeaderIndex {
    pub(crate) fn new(header: &StringRecord) -> Self {
        let normalized = header.iter().map(normalize_header).collect();
        Self { normalized }
    }

    pub(crate) fn len(&self) -> usize {
        self.normalized.len()
    }

    pub(crate) fn find(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|alias| {
            let wanted = normalize_header(alias);
            self.normalized.iter().position(|name| *name == wanted)
        })
    }

    pub(crate) fn require(
        &self,
        parser: &'static str,
        aliases: &[&str],
    ) -> Result<usize, ParserError> {
        self.find(aliases).ok_or_else(|| ParserError::FormatMismatch {
            parser,
            reason: format!("missing column {}", aliases.first().copied().unwrap_or("?")),
        })
    }
}

fn normalize_header(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').to_lowercase()
}

/// Reads a semicolon-delimited export into its header and data rows. Data rows carry their
/// 1-based line number.
pub(crate) fn read_table(
    parser: &'static str,
    content: &str,
) -> Result<(HeaderIndex, Vec<(usize, StringRecord)>), ParserError> {
    let content = content.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();

    let header = records
        .next()
        .ok_or(ParserError::FormatMismatch {
            parser,
            reason: "file missing header row".to_string(),
        })?
        .map_err(|err| ParserError::Csv {
            parser,
            source: err,
        })?;
    let header = HeaderIndex::new(&header);

    let mut rows = Vec::new();
    for (row_idx, record) in records.enumerate() {
        let record = record.map_err(|err| ParserError::Csv {
            parser,
            source: err,
        })?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        rows.push((row_idx + 2, record));
    }

    Ok((header, rows))
}

pub(crate) fn cell<'a>(record: &'a StringRecord, column: Option<usize>) -> &'a str {
    column.and_then(|idx| record.get(idx)).unwrap_or("")
}

pub(crate) fn parse_optional_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") || trimmed == "NA" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub(crate) fn parse_required_text(
    parser: &'static str,
    value: &str,
    line_index: usize,
    column: &str,
) -> Result<String, ParserError> {
    parse_optional_text(value).ok_or_else(|| ParserError::DataRow {
        parser,
        line_index,
        message: format!("column '{column}' must not be empty"),
    })
}

/// Parses a number written with either a decimal point or a decimal comma. Anything that does
/// not read as a finite number is treated as missing.
pub(crate) fn parse_decimal(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = if trimmed.contains(',') && !trimmed.contains('.') {
        trimmed.replace(',', ".")
    } else {
        trimmed.to_string()
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

const LOCAL_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const LOCAL_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];

/// Parses an export timestamp. Values with an explicit offset keep it; everything else is a
/// local clock reading. Unparseable values are missing rather than errors, matching how the
/// app leaves half-filled visits in its exports.
pub(crate) fn parse_export_timestamp(value: &str) -> Option<ExportTimestamp> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ExportTimestamp::Offset(dt));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(trimmed, fmt) {
            return Some(ExportTimestamp::Offset(dt));
        }
    }

    for fmt in LOCAL_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(ExportTimestamp::Local(naive));
        }
    }
    for fmt in LOCAL_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return date.and_hms_opt(0, 0, 0).map(ExportTimestamp::Local);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_comma_is_accepted() {
        assert_eq!(parse_decimal("1,5"), Some(1.5));
        assert_eq!(parse_decimal(" 2.25 "), Some(2.25));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("abc"), None);
    }

    #[test]
    fn timestamps_keep_offsets_and_local_forms() {
        match parse_export_timestamp("2024-06-01T21:30:00+02:00") {
            Some(ExportTimestamp::Offset(dt)) => assert_eq!(dt.offset().local_minus_utc(), 7200),
            other => panic!("unexpected {other:?}"),
        }
        let expected = NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(21, 30, 0))
            .expect("valid");
        assert_eq!(
            parse_export_timestamp("01-06-2024 21:30"),
            Some(ExportTimestamp::Local(expected))
        );
        assert_eq!(
            parse_export_timestamp("2024-06-01 21:30:00"),
            Some(ExportTimestamp::Local(expected))
        );
        assert_eq!(parse_export_timestamp("gisteren"), None);
    }
}
