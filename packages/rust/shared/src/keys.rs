//! The flat-column key convention.
//!
//! Upstream spreadsheets encode one logical field as a family of sibling
//! columns: the submitter's value under the bare key, the annotator's flag and
//! suggestion under suffixed keys, and the reviewer's decision under further
//! suffixes. Every producer and consumer in the workspace derives keys through
//! the functions in this module; call sites never concatenate suffixes inline.
//!
//! | Suffix | Meaning |
//! |---|---|
//! | `F` | original submitter value |
//! | `F_a_a` | annotator flag, `"agr"` or `"dis"` |
//! | `F_u_a` | annotator suggestion |
//! | `F_review_decision` | reviewer decision (legacy spelling `F_status`) |
//! | `F_review_comment` | reviewer comment (legacy spelling `F_comment`) |
//! | `F_resolved` / `F_resolved_at` | saved marker and timestamp |

use std::sync::LazyLock;

use regex::Regex;

/// Annotator agree/disagree flag suffix.
pub const FLAG_SUFFIX: &str = "_a_a";
/// Annotator suggested-value suffix.
pub const SUGGESTION_SUFFIX: &str = "_u_a";
/// Canonical reviewer decision suffix.
pub const DECISION_SUFFIX: &str = "_review_decision";
/// Canonical reviewer comment suffix.
pub const COMMENT_SUFFIX: &str = "_review_comment";
/// Saved marker suffix.
pub const RESOLVED_SUFFIX: &str = "_resolved";
/// Saved timestamp suffix.
pub const RESOLVED_AT_SUFFIX: &str = "_resolved_at";
/// Older decision spelling, read but never written.
pub const LEGACY_DECISION_SUFFIX: &str = "_status";
/// Older comment spelling, read but never written.
pub const LEGACY_COMMENT_SUFFIX: &str = "_comment";
/// Marker for gold-standard reference columns.
pub const GOLD_SUFFIX: &str = "_gold";

/// Flag value meaning the annotator disagreed with the submitter.
pub const FLAG_DISAGREE: &str = "dis";
/// Flag value meaning the annotator agreed with the submitter.
pub const FLAG_AGREE: &str = "agr";

/// Default columns searched for the record identity.
pub const DEFAULT_UNIT_ID_COLUMNS: [&str; 2] = ["_unit_id", "unit_id"];
/// Default columns searched for the submitting worker.
pub const DEFAULT_WORKER_ID_COLUMNS: [&str; 2] = ["orig__worker_id", "worker_id"];

/// Column holding the explicit metadata-section flag in flattened dumps.
pub const METADATA_REVIEWED_COLUMN: &str = "metadata_reviewed";

const REVIEW_SUFFIXES: [&str; 6] = [
    DECISION_SUFFIX,
    COMMENT_SUFFIX,
    RESOLVED_AT_SUFFIX,
    RESOLVED_SUFFIX,
    LEGACY_DECISION_SUFFIX,
    LEGACY_COMMENT_SUFFIX,
];

// ---------------------------------------------------------------------------
// Generic suffix derivation
// ---------------------------------------------------------------------------

/// `base_a_a`: the annotator flag column.
pub fn flag_key(base: &str) -> String {
    format!("{base}{FLAG_SUFFIX}")
}

/// `base_u_a`: the annotator suggestion column.
pub fn suggestion_key(base: &str) -> String {
    format!("{base}{SUGGESTION_SUFFIX}")
}

/// `base_review_decision`: the canonical decision column.
pub fn decision_key(base: &str) -> String {
    format!("{base}{DECISION_SUFFIX}")
}

/// `base_review_comment`: the canonical comment column.
pub fn comment_key(base: &str) -> String {
    format!("{base}{COMMENT_SUFFIX}")
}

/// `base_resolved`: the saved marker column.
pub fn resolved_key(base: &str) -> String {
    format!("{base}{RESOLVED_SUFFIX}")
}

/// `base_resolved_at`: the saved timestamp column.
pub fn resolved_at_key(base: &str) -> String {
    format!("{base}{RESOLVED_AT_SUFFIX}")
}

/// `base_status`: the older decision column, read only.
pub fn legacy_decision_key(base: &str) -> String {
    format!("{base}{LEGACY_DECISION_SUFFIX}")
}

/// `base_comment`: the older comment column, read only.
pub fn legacy_comment_key(base: &str) -> String {
    format!("{base}{LEGACY_COMMENT_SUFFIX}")
}

/// The base of a flag key (`foo_a_a` -> `foo`), or `None` for other keys.
pub fn strip_flag_suffix(key: &str) -> Option<&str> {
    key.strip_suffix(FLAG_SUFFIX)
}

/// If `key` is a reviewer companion column, return the base it belongs to.
pub fn strip_review_suffix(key: &str) -> Option<&str> {
    REVIEW_SUFFIXES
        .iter()
        .find_map(|suffix| key.strip_suffix(suffix))
        .filter(|base| !base.is_empty())
}

// ---------------------------------------------------------------------------
// Goals
// ---------------------------------------------------------------------------

pub fn goal_key(index: u32) -> String {
    format!("goal_{index}")
}

/// Parse a goal header key. Only exact `goal_<digits>` keys qualify.
pub fn parse_goal_key(key: &str) -> Option<u32> {
    static GOAL_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^goal_(\d+)$").expect("valid regex"));

    GOAL_RE
        .captures(key)
        .and_then(|caps| caps[1].parse::<u32>().ok())
}

/// Prefix shared by all parameter columns of a goal (`goal_3_`).
pub fn goal_param_prefix(index: u32) -> String {
    format!("goal_{index}_")
}

/// Prefix of task columns nested under a goal, which are not parameters.
pub fn goal_task_prefix(index: u32) -> String {
    format!("goal_{index}_task_")
}

pub fn goal_param_key(index: u32, base: &str) -> String {
    format!("goal_{index}_{base}")
}

/// Base for a parameter's annotator columns (`g_3_destination`).
pub fn goal_flag_base(index: u32, base: &str) -> String {
    format!("g_{index}_{base}")
}

// ---------------------------------------------------------------------------
// Assertions
// ---------------------------------------------------------------------------

/// Which side of the conversation an assertion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssertionSide {
    User,
    Agent,
}

impl AssertionSide {
    /// Prefix of the annotator flag/suggestion columns.
    pub fn short_prefix(self) -> &'static str {
        match self {
            Self::User => "usa",
            Self::Agent => "asa",
        }
    }

    /// Prefix of the submitter-visible columns.
    pub fn long_prefix(self) -> &'static str {
        match self {
            Self::User => "user_side_assertion",
            Self::Agent => "agent_side_assertion",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Agent => "Agent",
        }
    }
}

pub fn assertion_description_key(side: AssertionSide, number: u32) -> String {
    format!("{}_{number}", side.long_prefix())
}

pub fn assertion_value_key(side: AssertionSide, number: u32, criteria: &str) -> String {
    format!("{}_{number}_{criteria}", side.long_prefix())
}

pub fn assertion_flag_base(side: AssertionSide, number: u32, criteria: &str) -> String {
    format!("{}_{number}_{criteria}", side.short_prefix())
}

/// Parse `usa_<n>_<criteria>_a_a` (or the agent equivalent) into its parts.
pub fn parse_assertion_flag(side: AssertionSide, key: &str) -> Option<(u32, &str)> {
    static USA_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^usa_(\d+)_(.+)_a_a$").expect("valid regex"));
    static ASA_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^asa_(\d+)_(.+)_a_a$").expect("valid regex"));

    let re = match side {
        AssertionSide::User => &USA_RE,
        AssertionSide::Agent => &ASA_RE,
    };

    let caps = re.captures(key)?;
    let number = caps.get(1)?.as_str().parse::<u32>().ok()?;
    let criteria = caps.get(2)?.as_str();
    Some((number, criteria))
}

// ---------------------------------------------------------------------------
// Background information
// ---------------------------------------------------------------------------

/// One of the fixed background-information criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundCriterionDef {
    pub key: &'static str,
    pub label: &'static str,
}

pub const BACKGROUND_CRITERIA: [BackgroundCriterionDef; 4] = [
    BackgroundCriterionDef {
        key: "formatting",
        label: "Formatting",
    },
    BackgroundCriterionDef {
        key: "clarity_coherence",
        label: "Clarity & Coherence",
    },
    BackgroundCriterionDef {
        key: "attributes_to_add",
        label: "Attributes to Add",
    },
    BackgroundCriterionDef {
        key: "attributes_to_remove",
        label: "Attributes to Remove",
    },
];

const BACKGROUND_FLAG_PREFIX: &str = "u_b_i_";

pub fn background_value_key(key: &str) -> String {
    format!("user_background_information_{key}")
}

/// Base for a background criterion's annotator and review columns.
pub fn background_flag_base(key: &str) -> String {
    format!("{BACKGROUND_FLAG_PREFIX}{key}")
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Flag families owned by another unit kind. Bases under the long `goal_`
/// and assertion prefixes are review keys of parameters and criteria.
const NON_METADATA_FLAG_PREFIXES: [&str; 7] = [
    "g_",
    "goal_",
    BACKGROUND_FLAG_PREFIX,
    "usa_",
    "asa_",
    "user_side_assertion_",
    "agent_side_assertion_",
];

/// True for flag columns that belong to no goal/background/assertion family.
pub fn is_metadata_flag_key(key: &str) -> bool {
    key.ends_with(FLAG_SUFFIX)
        && !NON_METADATA_FLAG_PREFIXES
            .iter()
            .any(|prefix| key.starts_with(prefix))
}

/// Whether a `"dis"` flag counts toward the per-record listing badge.
///
/// Quality-control columns (`is_pmpt_*`, `*_qc*`) are excluded.
pub fn counts_toward_listing(key: &str) -> bool {
    !key.contains("is_pmpt_") && !key.contains("_qc")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_functions_share_one_spelling() {
        assert_eq!(flag_key("pmpt_style_eval_qc"), "pmpt_style_eval_qc_a_a");
        assert_eq!(suggestion_key("g_1_destination"), "g_1_destination_u_a");
        assert_eq!(decision_key("goal_1_destination"), "goal_1_destination_review_decision");
        assert_eq!(comment_key("goal_1_destination"), "goal_1_destination_review_comment");
        assert_eq!(resolved_key("u_b_i_formatting"), "u_b_i_formatting_resolved");
        assert_eq!(legacy_decision_key("u_b_i_formatting"), "u_b_i_formatting_status");
    }

    #[test]
    fn goal_key_must_match_exactly() {
        assert_eq!(parse_goal_key("goal_1"), Some(1));
        assert_eq!(parse_goal_key("goal_12"), Some(12));
        assert_eq!(parse_goal_key("goal_1_task_x"), None);
        assert_eq!(parse_goal_key("goal_"), None);
        assert_eq!(parse_goal_key("my_goal_1"), None);
    }

    #[test]
    fn review_suffix_is_stripped() {
        assert_eq!(
            strip_review_suffix("goal_1_destination_review_decision"),
            Some("goal_1_destination")
        );
        assert_eq!(
            strip_review_suffix("goal_1_destination_resolved_at"),
            Some("goal_1_destination")
        );
        assert_eq!(strip_review_suffix("goal_1_destination"), None);
        assert_eq!(strip_review_suffix("_status"), None);
    }

    #[test]
    fn assertion_flags_parse_with_gaps() {
        assert_eq!(
            parse_assertion_flag(AssertionSide::User, "usa_7_factual_accuracy_a_a"),
            Some((7, "factual_accuracy"))
        );
        assert_eq!(
            parse_assertion_flag(AssertionSide::Agent, "asa_2_tone_a_a"),
            Some((2, "tone"))
        );
        assert_eq!(parse_assertion_flag(AssertionSide::User, "asa_2_tone_a_a"), None);
        assert_eq!(parse_assertion_flag(AssertionSide::User, "usa_x_tone_a_a"), None);
    }

    #[test]
    fn metadata_flags_exclude_other_families() {
        assert!(is_metadata_flag_key("pmpt_style_eval_qc_a_a"));
        assert!(!is_metadata_flag_key("g_1_destination_a_a"));
        assert!(!is_metadata_flag_key("u_b_i_formatting_a_a"));
        assert!(!is_metadata_flag_key("usa_1_tone_a_a"));
        assert!(!is_metadata_flag_key("asa_1_tone_a_a"));
        assert!(!is_metadata_flag_key("pmpt_style_eval_qc_u_a"));
        assert!(!is_metadata_flag_key("goal_1_destination_a_a"));
        assert!(!is_metadata_flag_key("user_side_assertion_1_tone_a_a"));
        assert!(!is_metadata_flag_key("agent_side_assertion_2_tone_a_a"));
        assert!(is_metadata_flag_key("domain_a_a"));
    }

    #[test]
    fn listing_count_skips_quality_control_columns() {
        assert!(counts_toward_listing("g_1_destination_a_a"));
        assert!(!counts_toward_listing("is_pmpt_intentful_qc_a_a"));
        assert!(!counts_toward_listing("pmpt_style_eval_qc_a_a"));
    }
}
