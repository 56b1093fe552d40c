//! User-side and agent-side assertion extraction.
//!
//! Unlike goals, assertions are filter-then-group: only criteria whose
//! annotator flag is exactly `"dis"` are materialised, and an assertion exists
//! only if at least one of its criteria does.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::instrument;

use promptaudit_shared::keys::{self, AssertionSide, FLAG_DISAGREE};
use promptaudit_shared::{Record, ReviewStatus, UnitKind, UnitRef, UnitReview};

use crate::review;

/// One disagreeing criterion of an assertion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Criterion {
    pub side: AssertionSide,
    pub assertion_number: u32,
    pub criteria_type: String,
    /// `{long_prefix}_{n}_{criteria}`, also the review key.
    pub full_key: String,
    pub user_answer: String,
    /// The annotator's suggestion.
    pub annotator_answer: String,
    pub review: UnitReview,
}

impl Criterion {
    pub fn unit_ref(&self) -> UnitRef {
        UnitRef::new(self.side.into(), &self.full_key)
    }

    /// Criteria type with underscores as spaces, used as the export field name.
    pub fn display_name(&self) -> String {
        self.criteria_type.replace('_', " ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assertion {
    pub side: AssertionSide,
    pub number: u32,
    pub description: String,
    pub criteria: Vec<Criterion>,
}

impl Assertion {
    pub fn group_label(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> UnitKind {
        self.side.into()
    }
}

/// Extract the assertions of one side, in order of first appearance.
#[instrument(skip_all, fields(unit_id = %record.unit_id, side = side.short_prefix()))]
pub fn extract_assertions(record: &Record, side: AssertionSide) -> Vec<Assertion> {
    let mut grouped: IndexMap<u32, Assertion> = IndexMap::new();

    for (key, value) in &record.fields {
        if !value.is_flag(FLAG_DISAGREE) {
            continue;
        }
        let Some((number, criteria_type)) = keys::parse_assertion_flag(side, key) else {
            continue;
        };

        let assertion = grouped.entry(number).or_insert_with(|| Assertion {
            side,
            number,
            description: assertion_description(record, side, number),
            criteria: Vec::new(),
        });

        let full_key = keys::assertion_value_key(side, number, criteria_type);
        let flag_base = keys::assertion_flag_base(side, number, criteria_type);
        assertion.criteria.push(Criterion {
            side,
            assertion_number: number,
            criteria_type: criteria_type.to_string(),
            user_answer: record.display(&full_key),
            annotator_answer: record.display(&keys::suggestion_key(&flag_base)),
            review: review::current_review(record, &full_key, ReviewStatus::Pending),
            full_key,
        });
    }

    grouped.into_values().collect()
}

/// All criteria of one side, flattened.
pub fn side_criteria(record: &Record, side: AssertionSide) -> Vec<Criterion> {
    extract_assertions(record, side)
        .into_iter()
        .flat_map(|a| a.criteria)
        .collect()
}

fn assertion_description(record: &Record, side: AssertionSide, number: u32) -> String {
    record
        .get(&keys::assertion_description_key(side, number))
        .map(ToString::to_string)
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| format!("{} Assertion {number}", side.label()))
}
