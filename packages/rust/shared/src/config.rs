//! Application configuration for promptaudit.
//!
//! User config lives at `~/.promptaudit/promptaudit.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};
use crate::keys::{DEFAULT_UNIT_ID_COLUMNS, DEFAULT_WORKER_ID_COLUMNS};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "promptaudit.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".promptaudit";

// ---------------------------------------------------------------------------
// Config structs (matching promptaudit.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Disagreement export policies.
    #[serde(default)]
    pub export: ExportPoliciesConfig,

    /// Spreadsheet ingestion settings.
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Tabular format of written exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "xlsx" => Ok(Self::Xlsx),
            "csv" => Ok(Self::Csv),
            other => Err(AuditError::config(format!(
                "unknown export format '{other}': expected 'xlsx' or 'csv'"
            ))),
        }
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory exports are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Export file format.
    #[serde(default)]
    pub export_format: ExportFormat,

    /// Append the ISO date to export file names.
    #[serde(default = "default_true")]
    pub add_timestamp: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            export_format: ExportFormat::default(),
            add_timestamp: true,
        }
    }
}

fn default_output_dir() -> String {
    ".".into()
}
fn default_true() -> bool {
    true
}

/// `[export]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportPoliciesConfig {
    /// Export records that are not yet fully reviewed.
    #[serde(default)]
    pub include_non_reviewed: bool,

    /// Keep reviewer comments in the report.
    #[serde(default = "default_true")]
    pub preserve_comments: bool,

    /// Emit every goal parameter, not only disagreements.
    #[serde(default)]
    pub include_all_goals: bool,
}

impl Default for ExportPoliciesConfig {
    fn default() -> Self {
        Self {
            include_non_reviewed: false,
            preserve_comments: true,
            include_all_goals: false,
        }
    }
}

/// `[ingest]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Columns searched, in order, for the record identity.
    #[serde(default = "default_unit_id_columns")]
    pub unit_id_columns: Vec<String>,

    /// Columns searched, in order, for the submitting worker.
    #[serde(default = "default_worker_id_columns")]
    pub worker_id_columns: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            unit_id_columns: default_unit_id_columns(),
            worker_id_columns: default_worker_id_columns(),
        }
    }
}

fn default_unit_id_columns() -> Vec<String> {
    DEFAULT_UNIT_ID_COLUMNS.iter().map(|c| c.to_string()).collect()
}
fn default_worker_id_columns() -> Vec<String> {
    DEFAULT_WORKER_ID_COLUMNS.iter().map(|c| c.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Runtime options (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime export options.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Output format.
    pub format: ExportFormat,
    /// Append `_YYYY-MM-DD` to the file name.
    pub add_timestamp: bool,
    /// Skip the `reviewed` filter on records.
    pub include_non_reviewed: bool,
    /// Keep the reviewer comment column populated.
    pub preserve_comments: bool,
    /// Emit goal parameters without any disagreement.
    pub include_all_goals: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ExportOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            format: config.defaults.export_format,
            add_timestamp: config.defaults.add_timestamp,
            include_non_reviewed: config.export.include_non_reviewed,
            preserve_comments: config.export.preserve_comments,
            include_all_goals: config.export.include_all_goals,
        }
    }
}

/// Runtime ingestion options.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub unit_id_columns: Vec<String>,
    pub worker_id_columns: Vec<String>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for IngestOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            unit_id_columns: config.ingest.unit_id_columns.clone(),
            worker_id_columns: config.ingest.worker_id_columns.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.promptaudit/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AuditError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.promptaudit/promptaudit.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AuditError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| AuditError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AuditError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| AuditError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AuditError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("output_dir"));
        assert!(toml_str.contains("_unit_id"));
        assert!(toml_str.contains("export_format = \"xlsx\""));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert!(parsed.defaults.add_timestamp);
        assert!(parsed.export.preserve_comments);
        assert_eq!(parsed.ingest.worker_id_columns[0], "orig__worker_id");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
export_format = "csv"

[export]
include_all_goals = true
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.export_format, ExportFormat::Csv);
        assert!(config.defaults.add_timestamp);
        assert!(config.export.include_all_goals);
        assert!(config.export.preserve_comments);
        assert_eq!(config.ingest.unit_id_columns.len(), 2);
    }

    #[test]
    fn export_options_from_app_config() {
        let mut app = AppConfig::default();
        app.export.include_non_reviewed = true;
        let opts = ExportOptions::from(&app);
        assert_eq!(opts.format, ExportFormat::Xlsx);
        assert!(opts.add_timestamp);
        assert!(opts.include_non_reviewed);
    }

    #[test]
    fn export_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().expect("csv"), ExportFormat::Csv);
        let err = "pdf".parse::<ExportFormat>().unwrap_err();
        assert!(err.to_string().contains("unknown export format"));
    }

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[defaults]\noutput_dir = \"/tmp/exports\"\n").expect("write");
        let config = load_config_from(&path).expect("load");
        assert_eq!(config.defaults.output_dir, "/tmp/exports");

        std::fs::write(&path, "[defaults\n").expect("write");
        assert!(load_config_from(&path).is_err());
    }
}
