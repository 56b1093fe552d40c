//! Shared types, error model, key convention, and configuration for promptaudit.
//!
//! This crate is the foundation depended on by all other promptaudit crates.
//! It provides:
//! - [`AuditError`]: the unified error type
//! - Domain types ([`Record`], [`FieldValue`], [`UnitReview`], [`ReviewFlags`])
//! - The flat-column key convention ([`keys`])
//! - Configuration ([`AppConfig`], [`ExportOptions`], config loading)

pub mod config;
pub mod error;
pub mod keys;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, ExportFormat, ExportOptions, ExportPoliciesConfig, IngestConfig,
    IngestOptions, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{AuditError, Result};
pub use keys::AssertionSide;
pub use types::{
    CURRENT_SCHEMA_VERSION, Decision, FieldValue, Record, ReviewFlags, ReviewStatus, UnitId,
    UnitKind, UnitRef, UnitReview,
};
