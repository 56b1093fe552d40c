//! Re-flatten a record into spreadsheet columns for the full reviewed dump.
//!
//! Every unit writes the canonical review columns; legacy spellings already
//! in the row are left as-is and lose to the canonical ones on reload.

use indexmap::IndexMap;

use promptaudit_shared::keys::{self, DEFAULT_UNIT_ID_COLUMNS, DEFAULT_WORKER_ID_COLUMNS, METADATA_REVIEWED_COLUMN};
use promptaudit_shared::{FieldValue, Record};

use crate::units;

pub const GOALS_REVIEWED_COLUMN: &str = "goals_reviewed";
pub const USA_REVIEWED_COLUMN: &str = "usa_reviewed";
pub const ASA_REVIEWED_COLUMN: &str = "asa_reviewed";
pub const BACKGROUND_REVIEWED_COLUMN: &str = "background_info_reviewed";
pub const REVIEWED_COLUMN: &str = "reviewed";

/// Original columns merged with every unit's review columns and the flags.
pub fn flatten_record(record: &Record) -> IndexMap<String, FieldValue> {
    let mut row = record.fields.clone();

    if !DEFAULT_UNIT_ID_COLUMNS.iter().any(|c| row.contains_key(*c)) {
        row.shift_insert(0, DEFAULT_UNIT_ID_COLUMNS[0].to_string(), record.unit_id.0.clone().into());
    }
    if !DEFAULT_WORKER_ID_COLUMNS.iter().any(|c| row.contains_key(*c)) {
        row.shift_insert(1, DEFAULT_WORKER_ID_COLUMNS[0].to_string(), record.worker_id.clone().into());
    }

    for unit in units::review_units(record) {
        let key = &unit.unit.key;
        let review = &unit.review;

        match review.decision() {
            Some(decision) => {
                row.insert(keys::decision_key(key), unit.kind().decision_label(decision).into());
            }
            None => {
                row.shift_remove(&keys::decision_key(key));
            }
        }
        if review.comment.is_empty() {
            row.shift_remove(&keys::comment_key(key));
        } else {
            row.insert(keys::comment_key(key), review.comment.clone().into());
        }
        row.insert(keys::resolved_key(key), review.resolved.into());
        match review.resolved_at {
            Some(at) => {
                row.insert(keys::resolved_at_key(key), at.to_rfc3339().into());
            }
            None => {
                row.shift_remove(&keys::resolved_at_key(key));
            }
        }
    }

    let flags = record.flags;
    for (column, value) in [
        (METADATA_REVIEWED_COLUMN, flags.metadata_reviewed),
        (GOALS_REVIEWED_COLUMN, flags.goals_reviewed),
        (USA_REVIEWED_COLUMN, flags.usa_reviewed),
        (ASA_REVIEWED_COLUMN, flags.asa_reviewed),
        (BACKGROUND_REVIEWED_COLUMN, flags.background_info_reviewed),
        (REVIEWED_COLUMN, flags.reviewed),
    ] {
        row.insert(column.to_string(), value.into());
    }

    row
}

/// Union of the flattened columns of many rows, in first-seen order.
pub fn flat_headers(rows: &[IndexMap<String, FieldValue>]) -> Vec<String> {
    let mut headers: IndexMap<&str, ()> = IndexMap::new();
    for row in rows {
        for key in row.keys() {
            headers.insert(key.as_str(), ());
        }
    }
    headers.into_keys().map(str::to_string).collect()
}
