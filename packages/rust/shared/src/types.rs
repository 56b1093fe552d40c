//! Core domain types for annotated prompt records and their review state.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::keys::AssertionSide;

/// Current schema version for session snapshots.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// FieldValue
// ---------------------------------------------------------------------------

/// A single spreadsheet cell. Empty cells are represented by an absent key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Borrow the text content, if this is a text cell.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the cell as a boolean (`true`/`false` cells or text).
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// True when the cell is exactly the given flag text (e.g. `"dis"`).
    pub fn is_flag(&self, flag: &str) -> bool {
        matches!(self, Self::Text(s) if s == flag)
    }

    /// Whitespace-only text and empty lists count as blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// A `Number` when the parsed value prints back as exactly `text`,
    /// otherwise `Text`. Keeps `1.50`, `007` and ids beyond 2^53 intact.
    pub fn exact_number(text: &str) -> Self {
        if let Some(n) = text.parse::<f64>().ok().filter(|n| n.is_finite()) {
            let number = Self::Number(n);
            if number.to_string() == text {
                return number;
            }
        }
        Self::Text(text.to_string())
    }

    /// Convert a JSON value, dropping `null`s and nested objects.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null | serde_json::Value::Object(_) => None,
            serde_json::Value::Bool(b) => Some(Self::Bool(b)),
            serde_json::Value::Number(n) => Some(Self::exact_number(&n.to_string())),
            serde_json::Value::String(s) => Some(Self::Text(s)),
            serde_json::Value::Array(items) => Some(Self::List(
                items.into_iter().filter_map(Self::from_json).collect(),
            )),
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => {
                let joined = items
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                f.write_str(&joined)
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

// ---------------------------------------------------------------------------
// UnitId
// ---------------------------------------------------------------------------

/// The `_unit_id` of a record, normalised to text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub String);

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::str::FromStr for UnitId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Review vocabulary
// ---------------------------------------------------------------------------

/// The kind of a reviewable unit. Doubles as the export `field_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Metadata,
    GoalParameter,
    BackgroundInfo,
    UserAssertion,
    AgentAssertion,
}

impl UnitKind {
    /// Value of the `field_type` export column.
    pub fn field_type(self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::GoalParameter => "goal_parameter",
            Self::BackgroundInfo => "background_info",
            Self::UserAssertion => "user_assertion",
            Self::AgentAssertion => "agent_assertion",
        }
    }

    /// The kind-specific word for a decision at the export boundary.
    ///
    /// | kind | accept | revert |
    /// |---|---|---|
    /// | metadata | `accept` | `revert` |
    /// | goal parameter, assertions | `agree` | `disagree` |
    /// | background info | `accepted` | `rejected` |
    pub fn decision_label(self, decision: Decision) -> &'static str {
        match (self, decision) {
            (Self::Metadata, Decision::Accept) => "accept",
            (Self::Metadata, Decision::Revert) => "revert",
            (Self::BackgroundInfo, Decision::Accept) => "accepted",
            (Self::BackgroundInfo, Decision::Revert) => "rejected",
            (_, Decision::Accept) => "agree",
            (_, Decision::Revert) => "disagree",
        }
    }
}

impl From<AssertionSide> for UnitKind {
    fn from(side: AssertionSide) -> Self {
        match side {
            AssertionSide::User => Self::UserAssertion,
            AssertionSide::Agent => Self::AgentAssertion,
        }
    }
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field_type())
    }
}

/// A reviewer decision on one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Keep the annotator's value.
    Accept,
    /// Keep the original submitter's value. Requires a comment to save.
    Revert,
}

impl Decision {
    /// Parse any of the per-kind spellings.
    pub fn parse(word: &str) -> Option<Self> {
        match word.trim().to_ascii_lowercase().as_str() {
            "agree" | "accept" | "accepted" => Some(Self::Accept),
            "disagree" | "revert" | "reject" | "rejected" => Some(Self::Revert),
            _ => None,
        }
    }

    pub fn requires_comment(self) -> bool {
        matches!(self, Self::Revert)
    }
}

/// Lifecycle status of a unit before and after a decision is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Accepted,
    Reverted,
}

impl ReviewStatus {
    pub fn decision(self) -> Option<Decision> {
        match self {
            Self::Pending => None,
            Self::Accepted => Some(Decision::Accept),
            Self::Reverted => Some(Decision::Revert),
        }
    }
}

impl From<Decision> for ReviewStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accept => Self::Accepted,
            Decision::Revert => Self::Reverted,
        }
    }
}

/// Reviewer state of one unit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UnitReview {
    pub status: ReviewStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl UnitReview {
    /// A fresh unit with a pre-selected decision and nothing saved.
    pub fn decided(decision: Decision) -> Self {
        Self {
            status: decision.into(),
            ..Self::default()
        }
    }

    pub fn decision(&self) -> Option<Decision> {
        self.status.decision()
    }
}

/// Addresses one reviewable unit inside a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitRef {
    pub kind: UnitKind,
    /// The review key: the base used for the unit's flattened review columns.
    pub key: String,
}

impl UnitRef {
    pub fn new(kind: UnitKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}

impl std::fmt::Display for UnitRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.key)
    }
}

/// Section and record completion flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewFlags {
    pub metadata_reviewed: bool,
    pub goals_reviewed: bool,
    pub usa_reviewed: bool,
    pub asa_reviewed: bool,
    pub background_info_reviewed: bool,
    pub reviewed: bool,
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One spreadsheet row: identity, raw columns, and reviewer state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub unit_id: UnitId,
    pub worker_id: String,
    /// Raw columns in source order.
    pub fields: IndexMap<String, FieldValue>,
    /// Reviewer state keyed by review key. The only owned copy of unit state.
    #[serde(default)]
    pub units: IndexMap<String, UnitReview>,
    #[serde(default)]
    pub flags: ReviewFlags,
}

impl Record {
    pub fn new(unit_id: impl Into<String>, worker_id: impl Into<String>) -> Self {
        Self {
            unit_id: UnitId(unit_id.into()),
            worker_id: worker_id.into(),
            fields: IndexMap::new(),
            units: IndexMap::new(),
            flags: ReviewFlags::default(),
        }
    }

    /// Builder-style field insertion.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Build a record from raw columns, reading identity from the first
    /// non-blank candidate column. Returns `None` without a unit id.
    pub fn from_fields(
        fields: IndexMap<String, FieldValue>,
        unit_id_columns: &[String],
        worker_id_columns: &[String],
    ) -> Option<Self> {
        let pick = |columns: &[String]| {
            columns
                .iter()
                .filter_map(|c| fields.get(c))
                .find(|v| !v.is_blank())
                .map(ToString::to_string)
        };

        let unit_id = pick(unit_id_columns)?;
        let worker_id = pick(worker_id_columns).unwrap_or_default();

        Some(Self {
            unit_id: UnitId(unit_id),
            worker_id,
            fields,
            units: IndexMap::new(),
            flags: ReviewFlags::default(),
        })
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Text rendering of a column, or an empty string when absent.
    pub fn display(&self, key: &str) -> String {
        self.fields.get(key).map(ToString::to_string).unwrap_or_default()
    }

    /// True when the column holds exactly `flag`.
    pub fn has_flag(&self, key: &str, flag: &str) -> bool {
        self.fields.get(key).is_some_and(|v| v.is_flag(flag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_value_display() {
        assert_eq!(FieldValue::Number(3.0).to_string(), "3");
        assert_eq!(FieldValue::Number(2.5).to_string(), "2.5");
        assert_eq!(FieldValue::Bool(true).to_string(), "true");
        let list = FieldValue::List(vec!["en".into(), "fr".into()]);
        assert_eq!(list.to_string(), "en, fr");
    }

    #[test]
    fn field_value_blank_and_flags() {
        assert!(FieldValue::from("   ").is_blank());
        assert!(FieldValue::List(vec![]).is_blank());
        assert!(!FieldValue::Bool(false).is_blank());
        assert!(FieldValue::from("dis").is_flag("dis"));
        assert!(!FieldValue::from("dis ").is_flag("dis"));
    }

    #[test]
    fn field_value_from_json_drops_nulls() {
        let value = serde_json::json!(["a", null, 2]);
        let parsed = FieldValue::from_json(value).expect("list");
        assert_eq!(parsed, FieldValue::List(vec!["a".into(), FieldValue::Number(2.0)]));
        assert!(FieldValue::from_json(serde_json::Value::Null).is_none());
    }

    #[test]
    fn exact_number_keeps_lossy_text() {
        assert_eq!(FieldValue::exact_number("42"), FieldValue::Number(42.0));
        assert_eq!(FieldValue::exact_number("-2.5"), FieldValue::Number(-2.5));
        assert_eq!(FieldValue::exact_number("1.50"), FieldValue::from("1.50"));
        assert_eq!(FieldValue::exact_number("007"), FieldValue::from("007"));
        assert_eq!(
            FieldValue::exact_number("12345678901234567"),
            FieldValue::from("12345678901234567")
        );
        let big = serde_json::from_str::<serde_json::Value>("12345678901234567").expect("json");
        assert_eq!(FieldValue::from_json(big), Some(FieldValue::from("12345678901234567")));
    }

    #[test]
    fn decision_parses_every_vocabulary() {
        for word in ["agree", "accept", "Accepted"] {
            assert_eq!(Decision::parse(word), Some(Decision::Accept));
        }
        for word in ["disagree", "revert", "reject", "rejected"] {
            assert_eq!(Decision::parse(word), Some(Decision::Revert));
        }
        assert_eq!(Decision::parse("pending"), None);
    }

    #[test]
    fn decision_labels_are_kind_specific() {
        assert_eq!(UnitKind::Metadata.decision_label(Decision::Revert), "revert");
        assert_eq!(UnitKind::GoalParameter.decision_label(Decision::Revert), "disagree");
        assert_eq!(UnitKind::BackgroundInfo.decision_label(Decision::Accept), "accepted");
        assert_eq!(UnitKind::AgentAssertion.decision_label(Decision::Accept), "agree");
    }

    #[test]
    fn record_identity_from_candidate_columns() {
        let mut fields = IndexMap::new();
        fields.insert("unit_id".to_string(), FieldValue::Number(42.0));
        fields.insert("orig__worker_id".to_string(), FieldValue::from("W9"));
        let units = vec!["_unit_id".to_string(), "unit_id".to_string()];
        let workers = vec!["orig__worker_id".to_string()];

        let record = Record::from_fields(fields, &units, &workers).expect("record");
        assert_eq!(record.unit_id, UnitId::from("42"));
        assert_eq!(record.worker_id, "W9");
    }

    #[test]
    fn record_without_unit_id_is_rejected() {
        let mut fields = IndexMap::new();
        fields.insert("goal_1".to_string(), FieldValue::from("Book a flight"));
        assert!(Record::from_fields(fields, &["_unit_id".to_string()], &[]).is_none());
    }

    #[test]
    fn record_serialization() {
        let record = Record::new("U1", "W1").with_field("goal_1", "Book a flight");
        let json = serde_json::to_string(&record).expect("serialize");
        let parsed: Record = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, record);
    }
}
