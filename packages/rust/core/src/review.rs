//! Reconciliation state machine for a single review unit.
//!
//! A unit moves from pending to a tentative decision, then to resolved once
//! the reviewer saves it. Reopening keeps the decision and comment. The only
//! failure is a revert saved without a comment, which never mutates state.

use chrono::{DateTime, Utc};
use tracing::debug;

use promptaudit_shared::keys;
use promptaudit_shared::{AuditError, Decision, Record, ReviewStatus, UnitKind, UnitRef, UnitReview};

use crate::{rollup, units};

/// Rejected review actions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReviewError {
    /// A revert was saved with an empty (or whitespace-only) comment.
    #[error("a comment is required to revert '{key}'")]
    MissingComment { key: String },

    /// The unit was marked resolved before any decision was selected.
    #[error("no decision selected for '{key}'")]
    NoDecision { key: String },

    /// The unit reference does not address a materialised unit of the record.
    #[error("unknown review unit '{key}'")]
    UnknownUnit { key: String },

    #[error("unknown record '{unit_id}'")]
    UnknownRecord { unit_id: String },
}

impl From<ReviewError> for AuditError {
    fn from(err: ReviewError) -> Self {
        AuditError::validation(err.to_string())
    }
}

/// A reviewer command against one unit.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewAction {
    /// Select a tentative decision and comment without resolving.
    Draft { decision: Decision, comment: String },
    /// Select a decision and resolve in one step.
    Save { decision: Decision, comment: String },
    /// Resolve with the unit's current decision and comment.
    MarkResolved,
    /// Return a resolved unit to editing.
    Reopen,
}

impl ReviewAction {
    pub fn draft(decision: Decision, comment: impl Into<String>) -> Self {
        Self::Draft {
            decision,
            comment: comment.into(),
        }
    }

    pub fn save(decision: Decision, comment: impl Into<String>) -> Self {
        Self::Save {
            decision,
            comment: comment.into(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Draft { .. } => "draft",
            Self::Save { .. } => "save",
            Self::MarkResolved => "mark_resolved",
            Self::Reopen => "reopen",
        }
    }
}

/// Check the save precondition for a decision/comment pair.
pub fn validate(key: &str, decision: Decision, comment: &str) -> Result<(), ReviewError> {
    if decision.requires_comment() && comment.trim().is_empty() {
        return Err(ReviewError::MissingComment {
            key: key.to_string(),
        });
    }
    Ok(())
}

/// Compute the next state of a unit. Pure: `current` is never modified.
pub fn transition(
    key: &str,
    current: &UnitReview,
    action: &ReviewAction,
    now: DateTime<Utc>,
) -> Result<UnitReview, ReviewError> {
    match action {
        ReviewAction::Draft { decision, comment } => Ok(UnitReview {
            status: (*decision).into(),
            comment: comment.clone(),
            resolved: false,
            resolved_at: None,
        }),
        ReviewAction::Save { decision, comment } => {
            validate(key, *decision, comment)?;
            Ok(UnitReview {
                status: (*decision).into(),
                comment: comment.trim().to_string(),
                resolved: true,
                resolved_at: Some(now),
            })
        }
        ReviewAction::MarkResolved => {
            let decision = current.decision().ok_or_else(|| ReviewError::NoDecision {
                key: key.to_string(),
            })?;
            validate(key, decision, &current.comment)?;
            Ok(UnitReview {
                status: decision.into(),
                comment: current.comment.trim().to_string(),
                resolved: true,
                resolved_at: Some(now),
            })
        }
        ReviewAction::Reopen => Ok(UnitReview {
            resolved: false,
            resolved_at: None,
            ..current.clone()
        }),
    }
}

// ---------------------------------------------------------------------------
// Seeding from flattened columns
// ---------------------------------------------------------------------------

/// Recover a unit's state from its flattened review columns.
///
/// Canonical spellings win over legacy ones. A resolved marker is honoured
/// only when the recovered decision would pass validation, so a reloaded
/// revert without a comment comes back unresolved.
pub fn seed_review(record: &Record, key: &str, default: ReviewStatus) -> UnitReview {
    let decision = [keys::decision_key(key), keys::legacy_decision_key(key)]
        .iter()
        .filter_map(|k| record.get(k))
        .find_map(|v| Decision::parse(&v.to_string()));

    let comment = [keys::comment_key(key), keys::legacy_comment_key(key)]
        .iter()
        .filter_map(|k| record.get(k))
        .map(ToString::to_string)
        .find(|c| !c.trim().is_empty())
        .unwrap_or_default();

    let status = decision.map(ReviewStatus::from).unwrap_or(default);

    let marked = record
        .get(&keys::resolved_key(key))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let resolved = marked
        && status
            .decision()
            .is_some_and(|d| validate(key, d, &comment).is_ok());

    let resolved_at = if resolved {
        record
            .get(&keys::resolved_at_key(key))
            .and_then(|v| DateTime::parse_from_rfc3339(v.to_string().trim()).ok())
            .map(|ts| ts.with_timezone(&Utc))
    } else {
        None
    };

    UnitReview {
        status,
        comment,
        resolved,
        resolved_at,
    }
}

/// The live state of a unit: the ledger entry if present, else seeded.
pub fn current_review(record: &Record, key: &str, default: ReviewStatus) -> UnitReview {
    record
        .units
        .get(key)
        .cloned()
        .unwrap_or_else(|| seed_review(record, key, default))
}

// ---------------------------------------------------------------------------
// Record-level command
// ---------------------------------------------------------------------------

/// Apply an action to one unit and return the updated record.
///
/// The input record is left untouched. Section and record flags of the
/// returned snapshot are recomputed before it is handed back.
pub fn apply_decision(
    record: &Record,
    unit_ref: &UnitRef,
    action: &ReviewAction,
    now: DateTime<Utc>,
) -> Result<Record, ReviewError> {
    let unit = units::find_unit(record, unit_ref).ok_or_else(|| ReviewError::UnknownUnit {
        key: unit_ref.to_string(),
    })?;

    let next = transition(&unit_ref.key, &unit.review, action, now)?;

    let mut updated = record.clone();
    if unit_ref.kind == UnitKind::Metadata && !next.resolved {
        updated.flags.metadata_reviewed = false;
    }
    updated.units.insert(unit_ref.key.clone(), next);
    rollup::recompute(&mut updated);

    debug!(
        unit_id = %record.unit_id,
        unit = %unit_ref,
        action = action.name(),
        reviewed = updated.flags.reviewed,
        "review action applied"
    );

    Ok(updated)
}
