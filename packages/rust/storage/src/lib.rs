//! File boundaries for promptaudit.
//!
//! - [`ingest`]: CSV/JSON sources into records
//! - [`writer`]: disagreement report and full reviewed dump (XLSX/CSV)
//! - [`session`]: reviewer progress snapshots next to the source

pub mod ingest;
pub mod session;
pub mod writer;

pub use ingest::load_records;
pub use session::{
    RecordReviewData, SessionSnapshot, default_session_path, load_session, save_session,
    source_fingerprint,
};
pub use writer::{full_dump_file_name, write_disagreements, write_flat_records};
