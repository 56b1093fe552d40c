//! The in-memory record store.
//!
//! One store owns every record of a session. Mutations go through
//! [`ReviewStore::apply`] and friends, which replace the stored record with
//! the updated snapshot and notify subscribers.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{debug, info, instrument, warn};

use promptaudit_shared::{Record, ReviewFlags, UnitId, UnitRef, UnitReview};

use crate::metadata;
use crate::review::{self, ReviewAction, ReviewError};
use crate::rollup;

/// Receives every record replaced in the store.
pub trait StoreObserver: Send + Sync {
    fn record_updated(&self, record: &Record);
}

/// Observer that ignores updates.
pub struct SilentObserver;

impl StoreObserver for SilentObserver {
    fn record_updated(&self, _record: &Record) {}
}

pub struct ReviewStore {
    records: Vec<Record>,
    index: HashMap<UnitId, usize>,
    observers: Vec<Arc<dyn StoreObserver>>,
}

impl ReviewStore {
    /// Build a store from ingested records, restoring derived flags.
    ///
    /// A later record with an already-seen unit id replaces the earlier one.
    #[instrument(skip_all, fields(records = records.len()))]
    pub fn new(records: Vec<Record>) -> Self {
        let mut store = Self {
            records: Vec::with_capacity(records.len()),
            index: HashMap::new(),
            observers: Vec::new(),
        };

        for mut record in records {
            rollup::hydrate(&mut record);
            match store.index.get(&record.unit_id) {
                Some(&pos) => {
                    warn!(unit_id = %record.unit_id, "duplicate unit id, keeping the later row");
                    store.records[pos] = record;
                }
                None => {
                    store.index.insert(record.unit_id.clone(), store.records.len());
                    store.records.push(record);
                }
            }
        }

        info!(records = store.records.len(), "review store loaded");
        store
    }

    pub fn subscribe(&mut self, observer: Arc<dyn StoreObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, unit_id: &UnitId) -> Option<&Record> {
        self.index.get(unit_id).map(|&pos| &self.records[pos])
    }

    /// Position of a record in load order.
    pub fn position(&self, unit_id: &UnitId) -> Option<usize> {
        self.index.get(unit_id).copied()
    }

    /// All records in load order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Apply a review action using the current time.
    pub fn apply(
        &mut self,
        unit_id: &UnitId,
        unit_ref: &UnitRef,
        action: &ReviewAction,
    ) -> Result<&Record, ReviewError> {
        self.apply_at(unit_id, unit_ref, action, Utc::now())
    }

    pub fn apply_at(
        &mut self,
        unit_id: &UnitId,
        unit_ref: &UnitRef,
        action: &ReviewAction,
        now: DateTime<Utc>,
    ) -> Result<&Record, ReviewError> {
        let current = self.require(unit_id)?;
        let updated = review::apply_decision(current, unit_ref, action, now)?;
        Ok(self.replace(updated))
    }

    pub fn save_metadata_section(&mut self, unit_id: &UnitId) -> Result<&Record, ReviewError> {
        let current = self.require(unit_id)?;
        let updated = metadata::save_metadata_section(current, Utc::now())?;
        Ok(self.replace(updated))
    }

    /// Replace (never merge) the stored record with the same unit id.
    /// Unknown ids are appended.
    pub fn replace(&mut self, record: Record) -> &Record {
        for observer in &self.observers {
            observer.record_updated(&record);
        }

        let pos = match self.index.get(&record.unit_id) {
            Some(&pos) => {
                self.records[pos] = record;
                pos
            }
            None => {
                let pos = self.records.len();
                self.index.insert(record.unit_id.clone(), pos);
                self.records.push(record);
                pos
            }
        };
        debug!(unit_id = %self.records[pos].unit_id, "record replaced");
        &self.records[pos]
    }

    /// Overlay previously saved reviewer state onto a record.
    ///
    /// Saved units are untrusted: one marked resolved without a decision, or
    /// as a revert without a comment, comes back unresolved.
    pub fn restore(
        &mut self,
        unit_id: &UnitId,
        units: IndexMap<String, UnitReview>,
        flags: ReviewFlags,
    ) -> Result<&Record, ReviewError> {
        let mut updated = self.require(unit_id)?.clone();
        updated.units = units
            .into_iter()
            .map(|(key, unit)| {
                let unit = checked_unit(unit_id, &key, unit);
                (key, unit)
            })
            .collect();
        updated.flags.metadata_reviewed = flags.metadata_reviewed;
        rollup::recompute(&mut updated);
        Ok(self.replace(updated))
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    fn require(&self, unit_id: &UnitId) -> Result<&Record, ReviewError> {
        self.get(unit_id).ok_or_else(|| ReviewError::UnknownRecord {
            unit_id: unit_id.to_string(),
        })
    }
}

fn checked_unit(unit_id: &UnitId, key: &str, mut unit: UnitReview) -> UnitReview {
    if !unit.resolved {
        return unit;
    }
    let valid = unit
        .decision()
        .is_some_and(|d| review::validate(key, d, &unit.comment).is_ok());
    if !valid {
        warn!(%unit_id, key, "saved unit fails validation, reopening");
        unit.resolved = false;
        unit.resolved_at = None;
    }
    unit
}

impl std::fmt::Debug for ReviewStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewStore")
            .field("records", &self.records.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use promptaudit_shared::{Decision, UnitKind};

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl StoreObserver for Recorder {
        fn record_updated(&self, record: &Record) {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(record.unit_id.to_string());
            }
        }
    }

    fn flight(unit: &str) -> Record {
        Record::new(unit, "W1")
            .with_field("goal_1", "Book a flight")
            .with_field("goal_1_destination", "Paris")
            .with_field("g_1_destination_a_a", "dis")
    }

    fn destination() -> UnitRef {
        UnitRef::new(UnitKind::GoalParameter, "goal_1_destination")
    }

    #[test]
    fn duplicates_are_replaced() {
        let store = ReviewStore::new(vec![
            flight("U1"),
            flight("U2"),
            flight("U1").with_field("note", "later"),
        ]);
        assert_eq!(store.len(), 2);
        let u1 = store.get(&UnitId::from("U1")).expect("U1");
        assert_eq!(u1.display("note"), "later");
        assert_eq!(store.position(&UnitId::from("U2")), Some(1));
    }

    #[test]
    fn apply_updates_record_and_notifies() {
        let recorder = Arc::new(Recorder::default());
        let mut store = ReviewStore::new(vec![flight("U1")]);
        store.subscribe(recorder.clone());

        let record = store
            .apply(
                &UnitId::from("U1"),
                &destination(),
                &ReviewAction::save(Decision::Revert, "Paris was explicit"),
            )
            .expect("apply");
        assert!(record.flags.reviewed);

        let seen = recorder.seen.lock().expect("lock");
        assert_eq!(*seen, vec!["U1".to_string()]);
    }

    #[test]
    fn failed_apply_leaves_store_untouched() {
        let mut store = ReviewStore::new(vec![flight("U1")]);
        let err = store
            .apply(
                &UnitId::from("U1"),
                &destination(),
                &ReviewAction::save(Decision::Revert, " "),
            )
            .unwrap_err();
        assert!(matches!(err, ReviewError::MissingComment { .. }));
        assert!(store.get(&UnitId::from("U1")).expect("U1").units.is_empty());

        let err = store
            .apply(&UnitId::from("U9"), &destination(), &ReviewAction::MarkResolved)
            .unwrap_err();
        assert_eq!(err, ReviewError::UnknownRecord { unit_id: "U9".into() });
    }

    #[test]
    fn restore_overlays_units() {
        let mut store = ReviewStore::new(vec![flight("U1")]);
        let mut units = IndexMap::new();
        units.insert(
            "goal_1_destination".to_string(),
            UnitReview {
                resolved: true,
                ..UnitReview::decided(Decision::Accept)
            },
        );
        let record = store
            .restore(&UnitId::from("U1"), units, ReviewFlags::default())
            .expect("restore");
        assert!(record.flags.goals_reviewed);
        assert!(record.flags.reviewed);
    }

    #[test]
    fn restore_reopens_revert_without_comment() {
        let mut store = ReviewStore::new(vec![flight("U1")]);
        let mut units = IndexMap::new();
        units.insert(
            "goal_1_destination".to_string(),
            UnitReview {
                resolved: true,
                resolved_at: Some(Utc::now()),
                ..UnitReview::decided(Decision::Revert)
            },
        );
        let record = store
            .restore(&UnitId::from("U1"), units, ReviewFlags::default())
            .expect("restore");

        let unit = &record.units["goal_1_destination"];
        assert_eq!(unit.decision(), Some(Decision::Revert));
        assert!(!unit.resolved);
        assert!(unit.resolved_at.is_none());
        assert!(!record.flags.reviewed);
    }

    #[test]
    fn restore_reopens_resolved_unit_without_decision() {
        let mut store = ReviewStore::new(vec![flight("U1")]);
        let mut units = IndexMap::new();
        units.insert(
            "goal_1_destination".to_string(),
            UnitReview {
                resolved: true,
                ..UnitReview::default()
            },
        );
        let record = store
            .restore(&UnitId::from("U1"), units, ReviewFlags::default())
            .expect("restore");
        assert!(!record.units["goal_1_destination"].resolved);
        assert!(!record.flags.goals_reviewed);
    }
}
