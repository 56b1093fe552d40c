//! Disagreement report rows.
//!
//! One row per individual disagreement, not per record. Units the reviewer
//! never saved still produce a row with `not_reviewed` so gaps stay visible.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, instrument};

use promptaudit_shared::keys::{AssertionSide, FLAG_DISAGREE};
use promptaudit_shared::{Decision, ExportOptions, Record, UnitReview};

use crate::rollup;
use crate::units::{self, ReviewUnit};

/// Report header, in contract order.
pub const EXPORT_COLUMNS: [&str; 11] = [
    "unit_id",
    "worker_id",
    "field_type",
    "group_label",
    "field_name",
    "original_value",
    "annotator_value",
    "annotator_decision",
    "reviewer_decision",
    "reviewer_comment",
    "is_resolved",
];

/// Spreadsheet column widths, aligned with [`EXPORT_COLUMNS`].
pub const EXPORT_COLUMN_WIDTHS: [f64; 11] = [
    15.0, 15.0, 18.0, 30.0, 25.0, 20.0, 20.0, 18.0, 18.0, 40.0, 12.0,
];

pub const EXPORT_SHEET_NAME: &str = "Disagreements";

/// Reviewer decision of a unit that was never saved.
pub const NOT_REVIEWED: &str = "not_reviewed";

const EXPORT_FILE_STEM: &str = "disagreements_export";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisagreementRow {
    pub unit_id: String,
    pub worker_id: String,
    pub field_type: String,
    pub group_label: String,
    pub field_name: String,
    pub original_value: String,
    pub annotator_value: String,
    pub annotator_decision: String,
    pub reviewer_decision: String,
    pub reviewer_comment: String,
    pub is_resolved: bool,
}

impl DisagreementRow {
    /// The ten text columns, in header order. `is_resolved` is left out.
    pub fn text_cells(&self) -> [&str; 10] {
        [
            &self.unit_id,
            &self.worker_id,
            &self.field_type,
            &self.group_label,
            &self.field_name,
            &self.original_value,
            &self.annotator_value,
            &self.annotator_decision,
            &self.reviewer_decision,
            &self.reviewer_comment,
        ]
    }
}

/// Why an export produced nothing. Not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyExport {
    NoQualifyingRecords,
    NoRows,
}

impl EmptyExport {
    pub fn message(self) -> &'static str {
        match self {
            Self::NoQualifyingRecords => "No reviewed prompts with disagreements found for export",
            Self::NoRows => "No disagreements found in reviewed prompts",
        }
    }
}

impl std::fmt::Display for EmptyExport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Empty(EmptyExport),
    Rows {
        rows: Vec<DisagreementRow>,
        record_count: usize,
    },
}

/// Records that go into the report: reviewed (unless overridden) and holding
/// at least one disagreement.
pub fn qualifying_records<'a>(records: &'a [Record], options: &ExportOptions) -> Vec<&'a Record> {
    records
        .iter()
        .filter(|r| options.include_non_reviewed || r.flags.reviewed)
        .filter(|r| rollup::has_any_disagreement(r))
        .collect()
}

/// Rows for one record: goal parameters, user assertions, agent assertions,
/// metadata, then background.
pub fn disagreement_rows(record: &Record, options: &ExportOptions) -> Vec<DisagreementRow> {
    let mut selected: Vec<ReviewUnit> = units::goal_units(record)
        .into_iter()
        .filter(|u| options.include_all_goals || goal_unit_disagrees(u))
        .collect();

    for side in [AssertionSide::User, AssertionSide::Agent] {
        selected.extend(
            units::assertion_units(record, side)
                .into_iter()
                .filter(|u| saved_revert(&u.review)),
        );
    }
    selected.extend(units::metadata_units(record));
    selected.extend(units::background_units(record));

    selected
        .into_iter()
        .map(|unit| to_row(record, unit, options))
        .collect()
}

/// Build the full report over a record collection.
#[instrument(skip_all, fields(records = records.len()))]
pub fn build_export(records: &[Record], options: &ExportOptions) -> ExportOutcome {
    let qualifying = qualifying_records(records, options);
    if qualifying.is_empty() {
        return ExportOutcome::Empty(EmptyExport::NoQualifyingRecords);
    }

    let rows: Vec<DisagreementRow> = qualifying
        .iter()
        .flat_map(|r| disagreement_rows(r, options))
        .collect();
    if rows.is_empty() {
        return ExportOutcome::Empty(EmptyExport::NoRows);
    }

    info!(
        records = qualifying.len(),
        rows = rows.len(),
        "disagreement report built"
    );
    ExportOutcome::Rows {
        rows,
        record_count: qualifying.len(),
    }
}

/// `disagreements_export_2026-03-01.xlsx`, or without the date.
pub fn export_file_name(options: &ExportOptions, date: NaiveDate) -> String {
    let ext = options.format.extension();
    if options.add_timestamp {
        format!("{EXPORT_FILE_STEM}_{}.{ext}", date.format("%Y-%m-%d"))
    } else {
        format!("{EXPORT_FILE_STEM}.{ext}")
    }
}

fn goal_unit_disagrees(unit: &ReviewUnit) -> bool {
    unit.annotator_flag.as_deref() == Some(FLAG_DISAGREE)
        || saved_or_drafted_revert(&unit.review)
}

fn saved_or_drafted_revert(review: &UnitReview) -> bool {
    review.decision() == Some(Decision::Revert)
}

fn saved_revert(review: &UnitReview) -> bool {
    review.resolved && saved_or_drafted_revert(review)
}

fn to_row(record: &Record, unit: ReviewUnit, options: &ExportOptions) -> DisagreementRow {
    let kind = unit.kind();
    let reviewer_decision = match (unit.review.resolved, unit.review.decision()) {
        (true, Some(decision)) => kind.decision_label(decision).to_string(),
        _ => NOT_REVIEWED.to_string(),
    };
    let reviewer_comment = if options.preserve_comments {
        unit.review.comment.clone()
    } else {
        String::new()
    };

    DisagreementRow {
        unit_id: record.unit_id.to_string(),
        worker_id: record.worker_id.clone(),
        field_type: kind.field_type().to_string(),
        group_label: unit.group_label,
        field_name: unit.field_name,
        original_value: unit.original_value,
        annotator_value: unit.annotator_value,
        annotator_decision: unit
            .annotator_flag
            .unwrap_or_else(|| FLAG_DISAGREE.to_string()),
        reviewer_decision,
        reviewer_comment,
        is_resolved: unit.review.resolved,
    }
}
