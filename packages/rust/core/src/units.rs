//! A uniform view over every review unit of a record.

use serde::Serialize;

use promptaudit_shared::keys::{AssertionSide, FLAG_DISAGREE};
use promptaudit_shared::{Record, UnitKind, UnitRef, UnitReview};

use crate::{assertions, background, goals, metadata};

/// Group label used for units that belong to no goal or assertion.
pub const NO_GROUP: &str = "N/A";

/// One reviewable unit, whatever its kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewUnit {
    pub unit: UnitRef,
    pub group_label: String,
    pub field_name: String,
    pub original_value: String,
    pub annotator_value: String,
    /// The annotator flag, when the unit has one.
    pub annotator_flag: Option<String>,
    pub review: UnitReview,
}

impl ReviewUnit {
    pub fn kind(&self) -> UnitKind {
        self.unit.kind
    }

    pub fn is_resolved(&self) -> bool {
        self.review.resolved
    }
}

/// Every unit of the record: goal parameters, user assertions, agent
/// assertions, metadata, then background.
pub fn review_units(record: &Record) -> Vec<ReviewUnit> {
    let mut units = goal_units(record);
    units.extend(assertion_units(record, AssertionSide::User));
    units.extend(assertion_units(record, AssertionSide::Agent));
    units.extend(metadata_units(record));
    units.extend(background_units(record));
    units
}

/// Resolve a unit reference against the record's materialised units.
pub fn find_unit(record: &Record, unit_ref: &UnitRef) -> Option<ReviewUnit> {
    let candidates = match unit_ref.kind {
        UnitKind::GoalParameter => goal_units(record),
        UnitKind::UserAssertion => assertion_units(record, AssertionSide::User),
        UnitKind::AgentAssertion => assertion_units(record, AssertionSide::Agent),
        UnitKind::Metadata => metadata_units(record),
        UnitKind::BackgroundInfo => background_units(record),
    };
    candidates.into_iter().find(|u| u.unit.key == unit_ref.key)
}

pub(crate) fn goal_units(record: &Record) -> Vec<ReviewUnit> {
    goals::extract_goals(record)
        .into_iter()
        .flat_map(|goal| {
            let label = goal.group_label();
            goal.parameters.into_iter().map(move |p| ReviewUnit {
                unit: p.unit_ref(),
                group_label: label.clone(),
                field_name: p.name,
                original_value: p.user_answer,
                annotator_value: p.annotator_value,
                annotator_flag: p.annotator_answer,
                review: p.review,
            })
        })
        .collect()
}

pub(crate) fn assertion_units(record: &Record, side: AssertionSide) -> Vec<ReviewUnit> {
    assertions::extract_assertions(record, side)
        .into_iter()
        .flat_map(|assertion| {
            let label = assertion.group_label().to_string();
            assertion.criteria.into_iter().map(move |c| ReviewUnit {
                unit: c.unit_ref(),
                group_label: label.clone(),
                field_name: c.display_name(),
                original_value: c.user_answer,
                annotator_value: c.annotator_answer,
                annotator_flag: Some(FLAG_DISAGREE.to_string()),
                review: c.review,
            })
        })
        .collect()
}

pub(crate) fn metadata_units(record: &Record) -> Vec<ReviewUnit> {
    metadata::extract_metadata(record)
        .into_iter()
        .map(|m| ReviewUnit {
            unit: m.unit_ref(),
            group_label: NO_GROUP.to_string(),
            field_name: m.field_name,
            original_value: m.original_value,
            annotator_value: m.annotator_value,
            annotator_flag: Some(FLAG_DISAGREE.to_string()),
            review: m.review,
        })
        .collect()
}

pub(crate) fn background_units(record: &Record) -> Vec<ReviewUnit> {
    background::extract_background(record)
        .into_iter()
        .map(|b| ReviewUnit {
            unit: b.unit_ref(),
            group_label: NO_GROUP.to_string(),
            field_name: b.display_name(),
            original_value: b.user_answer,
            annotator_value: b.annotator_answer,
            annotator_flag: Some(FLAG_DISAGREE.to_string()),
            review: b.review,
        })
        .collect()
}
