//! Tabular export writers (XLSX via `rust_xlsxwriter`, CSV via `csv`).

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use indexmap::IndexMap;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use tracing::{info, instrument};

use promptaudit_core::export::{
    EXPORT_COLUMN_WIDTHS, EXPORT_COLUMNS, EXPORT_SHEET_NAME, export_file_name,
};
use promptaudit_core::flatten::{flat_headers, flatten_record};
use promptaudit_core::DisagreementRow;
use promptaudit_shared::{AuditError, ExportFormat, ExportOptions, FieldValue, Record, Result};

/// File stem of the full reviewed dump.
pub const FULL_DUMP_STEM: &str = "All_Reviewed_Prompts";

const FULL_DUMP_SHEET_NAME: &str = "Reviewed Prompts";

fn xlsx_err(e: XlsxError) -> AuditError {
    AuditError::Export(e.to_string())
}

fn csv_err(e: csv::Error) -> AuditError {
    AuditError::Export(e.to_string())
}

/// `All_Reviewed_Prompts.xlsx` or `.csv`.
pub fn full_dump_file_name(format: ExportFormat) -> String {
    format!("{FULL_DUMP_STEM}.{}", format.extension())
}

// ---------------------------------------------------------------------------
// Disagreement report
// ---------------------------------------------------------------------------

/// Write the disagreement report into `dir` and return the file path.
#[instrument(skip_all, fields(rows = rows.len(), dir = %dir.display()))]
pub fn write_disagreements(
    rows: &[DisagreementRow],
    dir: &Path,
    options: &ExportOptions,
    date: NaiveDate,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| AuditError::io(dir, e))?;
    let path = dir.join(export_file_name(options, date));

    match options.format {
        ExportFormat::Xlsx => write_disagreements_xlsx(rows, &path)?,
        ExportFormat::Csv => write_disagreements_csv(rows, &path)?,
    }

    info!(path = %path.display(), rows = rows.len(), "disagreement report written");
    Ok(path)
}

fn write_disagreements_xlsx(rows: &[DisagreementRow], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name(EXPORT_SHEET_NAME).map_err(xlsx_err)?;

    for (col, (name, width)) in EXPORT_COLUMNS.iter().zip(EXPORT_COLUMN_WIDTHS).enumerate() {
        let col = col as u16;
        sheet
            .write_string_with_format(0, col, *name, &header)
            .map_err(xlsx_err)?;
        sheet.set_column_width(col, width).map_err(xlsx_err)?;
    }

    let resolved_col = (EXPORT_COLUMNS.len() - 1) as u16;
    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, cell) in row.text_cells().into_iter().enumerate() {
            sheet.write_string(r, col as u16, cell).map_err(xlsx_err)?;
        }
        sheet
            .write_boolean(r, resolved_col, row.is_resolved)
            .map_err(xlsx_err)?;
    }

    workbook.save(path).map_err(xlsx_err)
}

fn write_disagreements_csv(rows: &[DisagreementRow], path: &Path) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_err)?;

    writer.write_record(EXPORT_COLUMNS).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| AuditError::io(path, e))
}

// ---------------------------------------------------------------------------
// Full reviewed dump
// ---------------------------------------------------------------------------

/// Write every record flattened with its review columns. The format follows
/// the file extension. Returns the number of rows written.
#[instrument(skip_all, fields(records = records.len(), path = %path.display()))]
pub fn write_flat_records(records: &[Record], path: &Path) -> Result<usize> {
    let format = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| AuditError::Export(format!("{} has no file extension", path.display())))?
        .parse::<ExportFormat>()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| AuditError::io(parent, e))?;
    }

    let rows: Vec<IndexMap<String, FieldValue>> = records.iter().map(flatten_record).collect();
    let headers = flat_headers(&rows);

    match format {
        ExportFormat::Xlsx => write_flat_xlsx(&headers, &rows, path)?,
        ExportFormat::Csv => write_flat_csv(&headers, &rows, path)?,
    }

    info!(rows = rows.len(), columns = headers.len(), "reviewed dump written");
    Ok(rows.len())
}

fn write_flat_xlsx(headers: &[String], rows: &[IndexMap<String, FieldValue>], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name(FULL_DUMP_SHEET_NAME).map_err(xlsx_err)?;

    for (col, header) in headers.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, header.as_str(), &bold)
            .map_err(xlsx_err)?;
    }
    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, header) in headers.iter().enumerate() {
            if let Some(value) = row.get(header) {
                write_cell(sheet, r, col as u16, value)?;
            }
        }
    }

    workbook.save(path).map_err(xlsx_err)
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, value: &FieldValue) -> Result<()> {
    match value {
        FieldValue::Bool(b) => sheet.write_boolean(row, col, *b),
        FieldValue::Number(n) => sheet.write_number(row, col, *n),
        other => sheet.write_string(row, col, other.to_string()),
    }
    .map(|_| ())
    .map_err(xlsx_err)
}

fn write_flat_csv(headers: &[String], rows: &[IndexMap<String, FieldValue>], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(headers).map_err(csv_err)?;
    for row in rows {
        let cells = headers
            .iter()
            .map(|h| row.get(h).map(ToString::to_string).unwrap_or_default());
        writer.write_record(cells).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| AuditError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptaudit_core::{ReviewAction, ReviewStore};
    use promptaudit_shared::{Decision, IngestOptions, UnitId, UnitKind, UnitRef};

    use crate::ingest::load_records;

    fn row(field_name: &str, resolved: bool) -> DisagreementRow {
        DisagreementRow {
            unit_id: "U1".into(),
            worker_id: "W1".into(),
            field_type: "goal_parameter".into(),
            group_label: "goal_1: Book a flight".into(),
            field_name: field_name.into(),
            original_value: "Paris".into(),
            annotator_value: "London".into(),
            annotator_decision: "dis".into(),
            reviewer_decision: "disagree".into(),
            reviewer_comment: "explicit, in context".into(),
            is_resolved: resolved,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).expect("date")
    }

    #[test]
    fn csv_report_has_contract_header() {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = ExportOptions {
            format: ExportFormat::Csv,
            ..ExportOptions::default()
        };
        let path = write_disagreements(&[row("destination", true)], dir.path(), &options, date())
            .expect("write");
        assert!(path.ends_with("disagreements_export_2026-03-01.csv"));

        let content = std::fs::read_to_string(&path).expect("read");
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some(EXPORT_COLUMNS.join(",").as_str()));
        assert_eq!(
            lines.next(),
            Some("U1,W1,goal_parameter,goal_1: Book a flight,destination,Paris,London,dis,disagree,\"explicit, in context\",true")
        );
    }

    #[test]
    fn xlsx_report_is_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = ExportOptions {
            add_timestamp: false,
            ..ExportOptions::default()
        };
        let path = write_disagreements(
            &[row("destination", true), row("date", false)],
            &dir.path().join("out"),
            &options,
            date(),
        )
        .expect("write");
        assert!(path.ends_with("out/disagreements_export.xlsx"));
        let bytes = std::fs::read(&path).expect("read");
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn csv_dump_reloads_with_progress() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("prompts.csv");
        std::fs::write(
            &source,
            "_unit_id,orig__worker_id,goal_1,goal_1_destination,g_1_destination_a_a\n\
             101,W1,Book a flight,Paris,dis\n",
        )
        .expect("write");

        let records = load_records(&source, &IngestOptions::default()).expect("load");
        let mut store = ReviewStore::new(records);
        store
            .apply(
                &UnitId::from("101"),
                &UnitRef::new(UnitKind::GoalParameter, "goal_1_destination"),
                &ReviewAction::save(Decision::Revert, "explicit"),
            )
            .expect("apply");

        let dump = dir.path().join(full_dump_file_name(ExportFormat::Csv));
        assert_eq!(write_flat_records(store.records(), &dump).expect("dump"), 1);

        let reloaded = ReviewStore::new(
            load_records(&dump, &IngestOptions::default()).expect("reload"),
        );
        let record = &reloaded.records()[0];
        assert!(record.flags.reviewed);
        let param = promptaudit_core::goals::find_parameter(record, "goal_1_destination")
            .expect("param");
        assert!(param.review.resolved);
        assert_eq!(param.review.comment, "explicit");
    }

    #[test]
    fn flat_dump_needs_known_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = write_flat_records(&[], &dir.path().join("dump.txt")).unwrap_err();
        assert!(err.to_string().contains("unknown export format"));
    }
}
