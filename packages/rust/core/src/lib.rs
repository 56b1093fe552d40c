//! Review model for annotated prompt records.
//!
//! Extractors derive goals, assertions, background criteria and metadata
//! fields from a record's flat columns. The state machine in [`review`]
//! applies reviewer actions, [`rollup`] recomputes completion flags, and
//! [`export`] flattens decisions into the disagreement report.

pub mod assertions;
pub mod background;
pub mod export;
pub mod flatten;
pub mod goals;
pub mod metadata;
pub mod review;
pub mod rollup;
pub mod store;
pub mod summary;
pub mod units;

pub use assertions::{Assertion, Criterion, extract_assertions};
pub use background::{BackgroundCriterion, extract_background};
pub use export::{DisagreementRow, EmptyExport, ExportOutcome, build_export, export_file_name};
pub use flatten::flatten_record;
pub use goals::{Goal, GoalProgress, Parameter, extract_goals, record_parameters};
pub use metadata::{MetadataField, extract_metadata, save_metadata_section};
pub use review::{ReviewAction, ReviewError, apply_decision};
pub use rollup::ReviewProgress;
pub use store::{ReviewStore, SilentObserver, StoreObserver};
pub use summary::{ListFilter, RecordSummary, summarize};
pub use units::{ReviewUnit, review_units};
