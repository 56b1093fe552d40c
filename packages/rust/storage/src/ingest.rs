//! Source ingestion: CSV and JSON files into records.
//!
//! Empty cells become absent keys. CSV cells holding `true`/`false` or a
//! number that prints back unchanged are typed; everything else stays text.
//! Identity columns are always text.

use std::fs::File;
use std::path::Path;

use indexmap::IndexMap;
use tracing::{info, instrument, warn};

use promptaudit_shared::{AuditError, FieldValue, IngestOptions, Record, Result};

type Row = IndexMap<String, FieldValue>;

/// Load every record of a `.csv` or `.json` source.
///
/// Rows without a unit id are skipped with a warning. A source yielding no
/// records at all is a parse error.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_records(path: &Path, options: &IngestOptions) -> Result<Vec<Record>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let rows = match ext.as_str() {
        "csv" => read_csv(path)?,
        "json" => read_json(path)?,
        other => {
            return Err(AuditError::parse(format!(
                "unsupported source format '{other}' for {}: expected .csv or .json",
                path.display()
            )));
        }
    };

    let identity: Vec<&str> = options
        .unit_id_columns
        .iter()
        .chain(&options.worker_id_columns)
        .map(String::as_str)
        .collect();

    let total = rows.len();
    let records: Vec<Record> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(i, mut fields)| {
            keep_identity_text(&mut fields, &identity);
            let record = Record::from_fields(fields, &options.unit_id_columns, &options.worker_id_columns);
            if record.is_none() {
                warn!(row = i + 1, "row has no unit id, skipping");
            }
            record
        })
        .collect();

    if records.is_empty() {
        return Err(AuditError::parse(format!(
            "{} contains no records with a unit id",
            path.display()
        )));
    }

    info!(records = records.len(), skipped = total - records.len(), "source loaded");
    Ok(records)
}

fn read_csv(path: &Path) -> Result<Vec<Row>> {
    let file = File::open(path).map_err(|e| AuditError::io(path, e))?;
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AuditError::parse(format!("{}: {e}", path.display())))?
        .clone();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| AuditError::parse(format!("{}: {e}", path.display())))?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .filter_map(|(header, cell)| parse_cell(cell).map(|v| (header.to_string(), v)))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn read_json(path: &Path) -> Result<Vec<Row>> {
    let content = std::fs::read_to_string(path).map_err(|e| AuditError::io(path, e))?;
    let objects: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_str(&content)
        .map_err(|e| AuditError::parse(format!("{}: expected an array of objects: {e}", path.display())))?;

    Ok(objects
        .into_iter()
        .map(|object| {
            object
                .into_iter()
                .filter_map(|(key, value)| FieldValue::from_json(value).map(|v| (key, v)))
                .filter(|(_, v)| !matches!(v, FieldValue::Text(s) if s.is_empty()))
                .collect()
        })
        .collect())
}

fn keep_identity_text(fields: &mut Row, identity: &[&str]) {
    for column in identity {
        if let Some(value) = fields.get_mut(*column) {
            if !matches!(value, FieldValue::Text(_)) {
                *value = FieldValue::Text(value.to_string());
            }
        }
    }
}

/// Type one CSV cell.
fn parse_cell(cell: &str) -> Option<FieldValue> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Some(FieldValue::Bool(true));
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Some(FieldValue::Bool(false));
    }

    match FieldValue::exact_number(trimmed) {
        number @ FieldValue::Number(_) => Some(number),
        _ => Some(FieldValue::Text(cell.to_string())),
    }
}
