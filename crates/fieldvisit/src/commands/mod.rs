pub mod maps;
pub mod observations;
pub mod visits;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use fieldvisit_core::pipelines::read_export;
use fieldvisit_parser::parse_fieldvisits;

/// Two-column table of labelled counts.
pub(crate) fn summary_table(title: &str, rows: &[(&str, usize)]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![title, "count"]);
    for (label, count) in rows {
        table.add_row(vec![label.to_string(), count.to_string()]);
    }
    table
}

/// Project id to project name, taken from a field-visit export.
pub(crate) fn project_names_from_visits(path: Option<&Path>) -> Result<HashMap<String, String>> {
    let Some(path) = path else {
        return Ok(HashMap::new());
    };
    let visits = read_export(path, parse_fieldvisits)
        .with_context(|| format!("failed to read visits export {}", path.display()))?;
    Ok(visits
        .into_iter()
        .filter_map(|v| Some((v.project_id?, v.project_name?)))
        .collect())
}
