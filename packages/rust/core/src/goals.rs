//! Goal/parameter extraction.
//!
//! Goals are enumerated from exact `goal_<n>` headers and every parameter
//! under a goal is materialised, whether or not the annotator disagreed.
//! Reviewer state is read from the record's unit ledger, so re-extracting
//! after a mutation returns the mutated parameter.

use serde::Serialize;
use tracing::{debug, instrument};

use promptaudit_shared::keys::{self, FLAG_DISAGREE};
use promptaudit_shared::{Decision, Record, ReviewStatus, UnitId, UnitKind, UnitRef, UnitReview};

use crate::review;

/// One field under a goal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    /// Base name (the part after `goal_<n>_`).
    pub name: String,
    /// The originating flat key, also the review key.
    pub full_key: String,
    pub user_answer: String,
    /// The annotator's flag: `"agr"`, `"dis"` or absent.
    pub annotator_answer: Option<String>,
    /// The annotator's suggested value.
    pub annotator_value: String,
    pub review: UnitReview,
}

impl Parameter {
    pub fn unit_ref(&self) -> UnitRef {
        UnitRef::new(UnitKind::GoalParameter, &self.full_key)
    }

    pub fn annotator_disagreed(&self) -> bool {
        self.annotator_answer.as_deref() == Some(FLAG_DISAGREE)
    }

    /// Either the annotator flagged it or the reviewer chose to revert.
    pub fn has_disagreement(&self) -> bool {
        self.annotator_disagreed() || self.review.status == ReviewStatus::Reverted
    }

    pub fn is_complete(&self) -> bool {
        self.review.resolved && self.review.decision().is_some()
    }
}

/// Agreed/disagreed/pending tallies for one goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GoalProgress {
    pub agreed: usize,
    pub disagreed: usize,
    pub pending: usize,
}

/// A goal with its parameters, ordered by key position in the record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Goal {
    /// The owning record. Used only to address updates.
    pub unit_id: UnitId,
    pub index: u32,
    /// The header key, `goal_<n>`.
    pub name: String,
    pub description: String,
    pub parameters: Vec<Parameter>,
}

impl Goal {
    /// `goal_<n>: <description>`, the export group label.
    pub fn group_label(&self) -> String {
        format!("{}: {}", self.name, self.description)
    }

    pub fn progress(&self) -> GoalProgress {
        self.parameters
            .iter()
            .fold(GoalProgress::default(), |mut acc, param| {
                match (param.review.resolved, param.review.decision()) {
                    (true, Some(Decision::Accept)) => acc.agreed += 1,
                    (true, Some(Decision::Revert)) => acc.disagreed += 1,
                    _ => acc.pending += 1,
                }
                acc
            })
    }
}

/// Extract every goal with a non-blank description, sorted by goal index.
#[instrument(skip_all, fields(unit_id = %record.unit_id))]
pub fn extract_goals(record: &Record) -> Vec<Goal> {
    let mut goals: Vec<Goal> = record
        .fields
        .iter()
        .filter_map(|(key, value)| {
            let index = keys::parse_goal_key(key)?;
            let description = value.to_string();
            if description.trim().is_empty() {
                debug!(goal = %key, "skipping goal without description");
                return None;
            }
            Some(Goal {
                unit_id: record.unit_id.clone(),
                index,
                name: key.clone(),
                description,
                parameters: goal_parameters(record, index),
            })
        })
        .collect();

    goals.sort_by_key(|g| g.index);
    goals
}

/// The flat, record-level projection of all parameters across goals.
pub fn record_parameters(record: &Record) -> Vec<Parameter> {
    extract_goals(record)
        .into_iter()
        .flat_map(|g| g.parameters)
        .collect()
}

/// Look up one parameter by its full key.
pub fn find_parameter(record: &Record, full_key: &str) -> Option<Parameter> {
    record_parameters(record)
        .into_iter()
        .find(|p| p.full_key == full_key)
}

fn goal_parameters(record: &Record, index: u32) -> Vec<Parameter> {
    let prefix = keys::goal_param_prefix(index);
    let task_prefix = keys::goal_task_prefix(index);

    record
        .fields
        .iter()
        .filter_map(|(key, value)| {
            let name = key.strip_prefix(&prefix)?;
            if name.is_empty()
                || key.contains(&task_prefix)
                || key.ends_with(keys::GOLD_SUFFIX)
                || is_review_companion(record, key, &prefix)
            {
                return None;
            }

            let flag_base = keys::goal_flag_base(index, name);
            let annotator_answer = record
                .get(&keys::flag_key(&flag_base))
                .map(ToString::to_string)
                .filter(|a| !a.trim().is_empty());
            let default = if annotator_answer.as_deref() == Some(FLAG_DISAGREE) {
                ReviewStatus::Reverted
            } else {
                ReviewStatus::Accepted
            };

            Some(Parameter {
                name: name.to_string(),
                full_key: key.clone(),
                user_answer: value.to_string(),
                annotator_value: record.display(&keys::suggestion_key(&flag_base)),
                annotator_answer,
                review: review::current_review(record, key, default),
            })
        })
        .collect()
}

/// Reviewer columns written next to a parameter are not parameters.
///
/// A suffixed column only counts as a companion when its base column exists,
/// so parameters genuinely named e.g. `shipping_status` or `issue_resolved`
/// survive.
fn is_review_companion(record: &Record, key: &str, prefix: &str) -> bool {
    keys::strip_review_suffix(key).is_some_and(|base| {
        base.len() > prefix.len() && base.starts_with(prefix) && record.fields.contains_key(base)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::review::{ReviewAction, apply_decision};

    fn flight_record() -> Record {
        Record::new("U1", "W1")
            .with_field("goal_1", "Book a flight")
            .with_field("goal_1_destination", "Paris")
            .with_field("g_1_destination_a_a", "dis")
            .with_field("g_1_destination_u_a", "London")
    }

    #[test]
    fn extracts_flight_scenario() {
        let goals = extract_goals(&flight_record());
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].name, "goal_1");
        assert_eq!(goals[0].group_label(), "goal_1: Book a flight");

        let param = &goals[0].parameters[0];
        assert_eq!(param.name, "destination");
        assert_eq!(param.full_key, "goal_1_destination");
        assert_eq!(param.annotator_answer.as_deref(), Some("dis"));
        assert_eq!(param.annotator_value, "London");
        assert_eq!(param.review.status, ReviewStatus::Reverted);
        assert!(!param.review.resolved);
    }

    #[test]
    fn blank_goals_are_dropped_and_order_is_numeric() {
        let record = Record::new("U1", "W1")
            .with_field("goal_10", "Pay the bill")
            .with_field("goal_2", "   ")
            .with_field("goal_1", "Book a flight")
            .with_field("goal_1_task_step", "search")
            .with_field("my_goal_3", "not a goal");
        let goals = extract_goals(&record);
        let indices: Vec<u32> = goals.iter().map(|g| g.index).collect();
        assert_eq!(indices, vec![1, 10]);
        assert!(goals[0].parameters.is_empty());
    }

    #[test]
    fn parameters_skip_gold_task_and_review_columns() {
        let record = flight_record()
            .with_field("goal_1_destination_gold", "Paris")
            .with_field("goal_1_task_1", "search flights")
            .with_field("goal_1_destination_review_decision", "disagree")
            .with_field("goal_1_destination_comment", "explicit")
            .with_field("goal_1_shipping_status", "express")
            .with_field("goal_1_date", "2026-05-01");

        let names: Vec<String> = extract_goals(&record)[0]
            .parameters
            .iter()
            .map(|p| p.name.clone())
            .collect();
        assert_eq!(names, vec!["destination", "shipping_status", "date"]);
    }

    #[test]
    fn suffix_named_parameters_without_base_are_kept() {
        let record = Record::new("U1", "W1")
            .with_field("goal_1", "Report an outage")
            .with_field("goal_1_issue_resolved", "no")
            .with_field("g_1_issue_resolved_a_a", "dis")
            .with_field("goal_1_eta_review_comment", "tomorrow");

        let params = record_parameters(&record);
        let keys: Vec<&str> = params.iter().map(|p| p.full_key.as_str()).collect();
        assert_eq!(keys, vec!["goal_1_issue_resolved", "goal_1_eta_review_comment"]);
        assert!(params[0].annotator_disagreed());
        assert_eq!(params[0].review.status, ReviewStatus::Reverted);
        assert!(!params[0].review.resolved);
    }

    #[test]
    fn agreeing_parameter_defaults_to_agree() {
        let record = flight_record()
            .with_field("goal_1_date", "2026-05-01")
            .with_field("g_1_date_a_a", "agr");
        let param = find_parameter(&record, "goal_1_date").expect("param");
        assert_eq!(param.review.status, ReviewStatus::Accepted);
        assert!(!param.has_disagreement());
    }

    #[test]
    fn re_extraction_keeps_reviewer_progress() {
        let record = flight_record();
        let first = find_parameter(&record, "goal_1_destination").expect("param");

        let updated = apply_decision(
            &record,
            &first.unit_ref(),
            &ReviewAction::draft(Decision::Accept, "annotator is right"),
            Utc::now(),
        )
        .expect("draft");

        let again = find_parameter(&updated, "goal_1_destination").expect("param");
        let third = find_parameter(&updated, "goal_1_destination").expect("param");
        assert_eq!(again.review.status, ReviewStatus::Accepted);
        assert_eq!(again.review.comment, "annotator is right");
        assert_eq!(again, third);
    }

    #[test]
    fn goal_progress_counts() {
        let record = flight_record()
            .with_field("goal_1_date", "2026-05-01")
            .with_field("goal_1_date_review_decision", "agree")
            .with_field("goal_1_date_resolved", true);
        let progress = extract_goals(&record)[0].progress();
        assert_eq!(
            progress,
            GoalProgress {
                agreed: 1,
                disagreed: 0,
                pending: 1
            }
        );
    }
}
