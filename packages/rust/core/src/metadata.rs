//! Metadata fields: every flag column outside the goal, background and
//! assertion families. Reviewed one by one, then closed with a section save.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use promptaudit_shared::keys::{self, FLAG_DISAGREE};
use promptaudit_shared::{Decision, Record, ReviewStatus, UnitKind, UnitRef, UnitReview};

use crate::review::{self, ReviewError};
use crate::rollup;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataField {
    /// The flag base, also the review key.
    pub field_name: String,
    pub original_value: String,
    pub annotator_value: String,
    pub review: UnitReview,
}

impl MetadataField {
    pub fn unit_ref(&self) -> UnitRef {
        UnitRef::new(UnitKind::Metadata, &self.field_name)
    }
}

/// Metadata fields flagged `"dis"`, in column order.
pub fn extract_metadata(record: &Record) -> Vec<MetadataField> {
    record
        .fields
        .iter()
        .filter(|(key, value)| keys::is_metadata_flag_key(key) && value.is_flag(FLAG_DISAGREE))
        .filter_map(|(key, _)| keys::strip_flag_suffix(key))
        .filter(|base| !base.is_empty())
        .map(|base| MetadataField {
            field_name: base.to_string(),
            original_value: record.display(base),
            annotator_value: record.display(&keys::suggestion_key(base)),
            review: review::current_review(record, base, ReviewStatus::Pending),
        })
        .collect()
}

/// Resolve every metadata field and mark the section reviewed.
///
/// Undecided fields are saved as accept. If any field holds a revert without
/// a comment, nothing is changed and the first offending key is reported.
#[instrument(skip_all, fields(unit_id = %record.unit_id))]
pub fn save_metadata_section(record: &Record, now: DateTime<Utc>) -> Result<Record, ReviewError> {
    let fields = extract_metadata(record);

    for field in &fields {
        let decision = field.review.decision().unwrap_or(Decision::Accept);
        review::validate(&field.field_name, decision, &field.review.comment)?;
    }

    let mut updated = record.clone();
    for field in fields.iter().filter(|f| !f.review.resolved) {
        let decision = field.review.decision().unwrap_or(Decision::Accept);
        updated.units.insert(
            field.field_name.clone(),
            UnitReview {
                status: decision.into(),
                comment: field.review.comment.trim().to_string(),
                resolved: true,
                resolved_at: Some(now),
            },
        );
    }
    updated.flags.metadata_reviewed = true;
    rollup::recompute(&mut updated);

    info!(fields = fields.len(), reviewed = updated.flags.reviewed, "metadata section saved");
    Ok(updated)
}
