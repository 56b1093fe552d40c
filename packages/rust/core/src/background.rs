//! Background-information extraction over the four fixed criteria.

use serde::Serialize;

use promptaudit_shared::keys::{self, BACKGROUND_CRITERIA, FLAG_DISAGREE};
use promptaudit_shared::{Record, ReviewStatus, UnitKind, UnitRef, UnitReview};

use crate::review;

/// A flagged background-information criterion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackgroundCriterion {
    pub key: &'static str,
    pub label: &'static str,
    /// `u_b_i_{key}`, the base of the flag and review columns.
    pub review_key: String,
    pub user_answer: String,
    /// The annotator's suggestion.
    pub annotator_answer: String,
    pub review: UnitReview,
}

impl BackgroundCriterion {
    pub fn unit_ref(&self) -> UnitRef {
        UnitRef::new(UnitKind::BackgroundInfo, &self.review_key)
    }

    /// The criterion key with underscores as spaces (`clarity coherence`).
    pub fn display_name(&self) -> String {
        self.key.replace('_', " ")
    }
}

/// Materialise the criteria flagged `"dis"`, in fixed table order.
pub fn extract_background(record: &Record) -> Vec<BackgroundCriterion> {
    BACKGROUND_CRITERIA
        .iter()
        .filter_map(|def| {
            let review_key = keys::background_flag_base(def.key);
            if !record.has_flag(&keys::flag_key(&review_key), FLAG_DISAGREE) {
                return None;
            }
            Some(BackgroundCriterion {
                key: def.key,
                label: def.label,
                user_answer: record.display(&keys::background_value_key(def.key)),
                annotator_answer: record.display(&keys::suggestion_key(&review_key)),
                review: review::current_review(record, &review_key, ReviewStatus::Pending),
                review_key,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_flagged_criteria_are_returned() {
        let record = Record::new("U1", "W1")
            .with_field("user_background_information_formatting", "bullets")
            .with_field("u_b_i_formatting_a_a", "agr")
            .with_field("user_background_information_clarity_coherence", "clear")
            .with_field("u_b_i_clarity_coherence_a_a", "dis")
            .with_field("u_b_i_clarity_coherence_u_a", "confusing");

        let criteria = extract_background(&record);
        assert_eq!(criteria.len(), 1);
        let c = &criteria[0];
        assert_eq!(c.label, "Clarity & Coherence");
        assert_eq!(c.review_key, "u_b_i_clarity_coherence");
        assert_eq!(c.user_answer, "clear");
        assert_eq!(c.annotator_answer, "confusing");
        assert_eq!(c.display_name(), "clarity coherence");
        assert_eq!(c.review.status, ReviewStatus::Pending);
    }

    #[test]
    fn prior_review_is_recovered_from_legacy_columns() {
        let record = Record::new("U1", "W1")
            .with_field("u_b_i_attributes_to_add_a_a", "dis")
            .with_field("u_b_i_attributes_to_add_status", "rejected")
            .with_field("u_b_i_attributes_to_add_comment", "nothing missing")
            .with_field("u_b_i_attributes_to_add_resolved", true);

        let criteria = extract_background(&record);
        assert_eq!(criteria[0].review.status, ReviewStatus::Reverted);
        assert_eq!(criteria[0].review.comment, "nothing missing");
        assert!(criteria[0].review.resolved);
    }
}
