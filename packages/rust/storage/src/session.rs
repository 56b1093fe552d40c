//! Session snapshots: reviewer progress saved next to the source file.
//!
//! A snapshot holds only reviewer state keyed by unit id, never the source
//! columns. It is written atomically (temp file, then rename).

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use promptaudit_core::ReviewStore;
use promptaudit_shared::{AuditError, CURRENT_SCHEMA_VERSION, Result, ReviewFlags, UnitId, UnitReview};

const SESSION_SUFFIX: &str = ".session.json";

/// Saved reviewer state of one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordReviewData {
    #[serde(default)]
    pub units: IndexMap<String, UnitReview>,
    #[serde(default)]
    pub flags: ReviewFlags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub version: u32,
    /// SHA-256 of the source file the session was recorded against.
    pub source_fingerprint: String,
    #[serde(default)]
    pub selected_index: usize,
    #[serde(default)]
    pub review_data: IndexMap<UnitId, RecordReviewData>,
}

impl SessionSnapshot {
    /// Capture every record that carries reviewer state.
    pub fn capture(store: &ReviewStore, source_fingerprint: impl Into<String>, selected_index: usize) -> Self {
        let review_data = store
            .records()
            .iter()
            .filter(|r| !r.units.is_empty() || r.flags.metadata_reviewed)
            .map(|r| {
                (
                    r.unit_id.clone(),
                    RecordReviewData {
                        units: r.units.clone(),
                        flags: r.flags,
                    },
                )
            })
            .collect();

        Self {
            version: CURRENT_SCHEMA_VERSION,
            source_fingerprint: source_fingerprint.into(),
            selected_index,
            review_data,
        }
    }

    /// Overlay the snapshot onto a store, matching records by unit id.
    ///
    /// A fingerprint mismatch is logged and the snapshot is still applied.
    /// Returns the number of records restored.
    pub fn apply_to(&self, store: &mut ReviewStore, source_fingerprint: &str) -> usize {
        if self.source_fingerprint != source_fingerprint {
            warn!(
                saved = %self.source_fingerprint,
                current = %source_fingerprint,
                "session was recorded against a different source file"
            );
        }

        let mut restored = 0;
        for (unit_id, data) in &self.review_data {
            match store.restore(unit_id, data.units.clone(), data.flags) {
                Ok(_) => restored += 1,
                Err(e) => warn!(%unit_id, error = %e, "skipping saved review state"),
            }
        }

        info!(restored, saved = self.review_data.len(), "session restored");
        restored
    }
}

/// Hex SHA-256 of a file's bytes.
pub fn source_fingerprint(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| AuditError::io(path, e))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// `prompts.csv` -> `prompts.csv.session.json`, next to the source.
pub fn default_session_path(input: &Path) -> PathBuf {
    let mut name = input
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(SESSION_SUFFIX);
    input.with_file_name(name)
}

/// Write a snapshot atomically.
pub fn save_session(snapshot: &SessionSnapshot, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot)
        .map_err(|e| AuditError::Storage(format!("failed to serialize session: {e}")))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AuditError::Storage(format!("invalid session path {}", path.display())))?;
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, json).map_err(|e| AuditError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| AuditError::io(path, e))?;

    debug!(path = %path.display(), records = snapshot.review_data.len(), "session saved");
    Ok(())
}

/// Read a snapshot. A missing file is `Ok(None)`.
pub fn load_session(path: &Path) -> Result<Option<SessionSnapshot>> {
    if !path.exists() {
        debug!(path = %path.display(), "no session file");
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| AuditError::io(path, e))?;
    let snapshot: SessionSnapshot = serde_json::from_str(&content)
        .map_err(|e| AuditError::Storage(format!("failed to parse {}: {e}", path.display())))?;

    if snapshot.version > CURRENT_SCHEMA_VERSION {
        return Err(AuditError::Storage(format!(
            "session version {} is newer than supported version {CURRENT_SCHEMA_VERSION}",
            snapshot.version
        )));
    }
    Ok(Some(snapshot))
}
