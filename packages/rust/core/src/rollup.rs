//! Section and record completion flags.
//!
//! A section is applicable when it holds at least one disagreement. The
//! record is reviewed when every applicable section is complete; a record
//! with no applicable section is vacuously reviewed.

use serde::Serialize;
use tracing::trace;

use promptaudit_shared::keys::{AssertionSide, METADATA_REVIEWED_COLUMN};
use promptaudit_shared::{Record, ReviewFlags, UnitReview};

use crate::units::{self, ReviewUnit};
use crate::{assertions, background, goals, metadata};

struct Section {
    applicable: bool,
    complete: bool,
}

impl Section {
    fn satisfied(&self) -> bool {
        !self.applicable || self.complete
    }
}

fn all_resolved<'a>(reviews: impl IntoIterator<Item = &'a UnitReview>) -> bool {
    reviews
        .into_iter()
        .all(|r| r.resolved && r.decision().is_some())
}

/// Recompute every derived flag of the record in place.
///
/// `metadata_reviewed` is an explicit flag and is only read here; the
/// metadata section also needs all of its fields resolved to count.
pub fn recompute(record: &mut Record) {
    let params = goals::record_parameters(record);
    let goals_section = Section {
        applicable: params.iter().any(|p| p.has_disagreement()),
        complete: all_resolved(params.iter().map(|p| &p.review)),
    };

    let side_section = |side| {
        let criteria = assertions::side_criteria(record, side);
        Section {
            applicable: !criteria.is_empty(),
            complete: all_resolved(criteria.iter().map(|c| &c.review)),
        }
    };
    let usa_section = side_section(AssertionSide::User);
    let asa_section = side_section(AssertionSide::Agent);

    let background = background::extract_background(record);
    let background_section = Section {
        applicable: !background.is_empty(),
        complete: all_resolved(background.iter().map(|b| &b.review)),
    };

    let meta = metadata::extract_metadata(record);
    let metadata_section = Section {
        applicable: !meta.is_empty(),
        complete: record.flags.metadata_reviewed && all_resolved(meta.iter().map(|m| &m.review)),
    };

    let reviewed = [
        &goals_section,
        &usa_section,
        &asa_section,
        &background_section,
        &metadata_section,
    ]
    .iter()
    .all(|s| s.satisfied());

    record.flags = ReviewFlags {
        metadata_reviewed: record.flags.metadata_reviewed,
        goals_reviewed: goals_section.complete,
        usa_reviewed: usa_section.complete,
        asa_reviewed: asa_section.complete,
        background_info_reviewed: background_section.complete,
        reviewed,
    };

    trace!(unit_id = %record.unit_id, flags = ?record.flags, "rollup recomputed");
}

/// Restore the explicit metadata flag from a flattened column, then recompute.
pub fn hydrate(record: &mut Record) {
    if let Some(flag) = record.get(METADATA_REVIEWED_COLUMN).and_then(|v| v.as_bool()) {
        record.flags.metadata_reviewed = flag;
    }
    recompute(record);
}

/// True when any section of the record holds a disagreement.
pub fn has_any_disagreement(record: &Record) -> bool {
    goals::record_parameters(record)
        .iter()
        .any(|p| p.has_disagreement())
        || !assertions::side_criteria(record, AssertionSide::User).is_empty()
        || !assertions::side_criteria(record, AssertionSide::Agent).is_empty()
        || !background::extract_background(record).is_empty()
        || !metadata::extract_metadata(record).is_empty()
}

/// Resolved/total review-unit counts for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReviewProgress {
    pub total: usize,
    pub resolved: usize,
}

impl ReviewProgress {
    pub fn of(record: &Record) -> Self {
        Self::from_units(&units::review_units(record))
    }

    pub fn from_units(units: &[ReviewUnit]) -> Self {
        Self {
            total: units.len(),
            resolved: units.iter().filter(|u| u.is_resolved()).count(),
        }
    }

    /// Whole-number completion percentage; an empty record is complete.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.resolved * 100) / self.total) as u8
    }
}
