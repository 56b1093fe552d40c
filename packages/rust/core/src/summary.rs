//! Per-record listing summaries.

use std::cmp::Ordering;

use serde::Serialize;

use promptaudit_shared::keys::{self, FLAG_DISAGREE, FLAG_SUFFIX};
use promptaudit_shared::{Record, UnitId};

use crate::rollup::ReviewProgress;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSummary {
    pub unit_id: UnitId,
    pub worker_id: String,
    /// `"dis"` flags, quality-control columns excluded.
    pub disagreements: usize,
    pub progress: ReviewProgress,
    pub reviewed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Case-insensitive substring of the worker id.
    pub worker: Option<String>,
    pub disagreements_only: bool,
}

impl ListFilter {
    fn accepts(&self, summary: &RecordSummary) -> bool {
        if self.disagreements_only && summary.disagreements == 0 {
            return false;
        }
        match &self.worker {
            Some(needle) => summary
                .worker_id
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            None => true,
        }
    }
}

pub fn count_disagreements(record: &Record) -> usize {
    record
        .fields
        .iter()
        .filter(|(key, value)| {
            key.ends_with(FLAG_SUFFIX)
                && value.is_flag(FLAG_DISAGREE)
                && keys::counts_toward_listing(key)
        })
        .count()
}

pub fn summarize_record(record: &Record) -> RecordSummary {
    RecordSummary {
        unit_id: record.unit_id.clone(),
        worker_id: record.worker_id.clone(),
        disagreements: count_disagreements(record),
        progress: ReviewProgress::of(record),
        reviewed: record.flags.reviewed,
    }
}

/// Filtered summaries sorted by unit id, numerically when both ids are numbers.
pub fn summarize(records: &[Record], filter: &ListFilter) -> Vec<RecordSummary> {
    let mut summaries: Vec<RecordSummary> = records
        .iter()
        .map(summarize_record)
        .filter(|s| filter.accepts(s))
        .collect();
    summaries.sort_by(|a, b| compare_unit_ids(&a.unit_id, &b.unit_id));
    summaries
}

fn compare_unit_ids(a: &UnitId, b: &UnitId) -> Ordering {
    match (a.0.parse::<u64>(), b.0.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(unit: &str, worker: &str, flags: &[(&str, &str)]) -> Record {
        flags
            .iter()
            .fold(Record::new(unit, worker), |r, (k, v)| r.with_field(*k, *v))
    }

    #[test]
    fn quality_control_flags_are_not_counted() {
        let r = record(
            "1",
            "W1",
            &[
                ("g_1_destination_a_a", "dis"),
                ("is_pmpt_intentful_qc_a_a", "dis"),
                ("pmpt_style_eval_qc_a_a", "dis"),
                ("domain_a_a", "dis"),
                ("tone_a_a", "agr"),
            ],
        );
        assert_eq!(count_disagreements(&r), 2);
    }

    #[test]
    fn filters_and_sorts() {
        let records = vec![
            record("10", "alice-7", &[("domain_a_a", "dis")]),
            record("9", "bob-2", &[("domain_a_a", "dis")]),
            record("2", "Alice-3", &[]),
        ];

        let all = summarize(&records, &ListFilter::default());
        let ids: Vec<&str> = all.iter().map(|s| s.unit_id.0.as_str()).collect();
        assert_eq!(ids, vec!["2", "9", "10"]);

        let filter = ListFilter {
            worker: Some("alice".into()),
            disagreements_only: true,
        };
        let ids: Vec<String> = summarize(&records, &filter)
            .into_iter()
            .map(|s| s.unit_id.to_string())
            .collect();
        assert_eq!(ids, vec!["10"]);
    }
}
