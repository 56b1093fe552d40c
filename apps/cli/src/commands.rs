//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use promptaudit_core::{
    ExportOutcome, ListFilter, ReviewAction, ReviewProgress, ReviewStore, ReviewUnit,
    build_export, extract_goals, review_units, summarize,
};
use promptaudit_shared::{
    AppConfig, Decision, ExportFormat, ExportOptions, IngestOptions, Record, UnitId, UnitRef,
    init_config, load_config,
};
use promptaudit_storage::{
    SessionSnapshot, default_session_path, full_dump_file_name, load_records, load_session,
    save_session, source_fingerprint, write_disagreements, write_flat_records,
};
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// promptaudit: review annotator disagreements on prompt records.
#[derive(Parser)]
#[command(
    name = "promptaudit",
    version,
    about = "Review annotator disagreements in labeled prompt records and export a reconciliation report.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Session file holding review progress (defaults to <input>.session.json).
    #[arg(long, global = true)]
    pub session: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// List records with their disagreement counts and progress.
    List {
        /// Source spreadsheet (.csv or .json).
        input: PathBuf,

        /// Only records whose worker id contains this text.
        #[arg(long)]
        worker: Option<String>,

        /// Hide records without disagreements.
        #[arg(long)]
        disagreements_only: bool,
    },

    /// Show every review unit of one record.
    Show {
        input: PathBuf,

        /// Unit id of the record.
        #[arg(long)]
        unit: String,

        /// Print the units as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Record a decision on one unit.
    Decide {
        input: PathBuf,

        #[arg(long)]
        unit: String,

        /// Review key of the unit (e.g. goal_1_destination, u_b_i_formatting).
        #[arg(long)]
        key: String,

        /// agree/accept/accepted or disagree/revert/reject/rejected.
        #[arg(long, value_parser = parse_decision)]
        decision: Decision,

        /// Justification; required to save a revert.
        #[arg(long, default_value = "")]
        comment: String,

        /// Keep the decision as a draft instead of resolving the unit.
        #[arg(long)]
        draft: bool,
    },

    /// Resolve a unit with its current decision.
    Resolve {
        input: PathBuf,
        #[arg(long)]
        unit: String,
        #[arg(long)]
        key: String,
    },

    /// Reopen a resolved unit for editing.
    Reopen {
        input: PathBuf,
        #[arg(long)]
        unit: String,
        #[arg(long)]
        key: String,
    },

    /// Resolve all metadata fields of a record and mark the section reviewed.
    SaveMetadata {
        input: PathBuf,
        #[arg(long)]
        unit: String,
    },

    /// Write the disagreement report (or the full reviewed dump).
    Export {
        input: PathBuf,

        /// Output directory (defaults to the configured output_dir).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Output format: xlsx or csv.
        #[arg(long)]
        format: Option<ExportFormat>,

        /// Leave the date out of the file name.
        #[arg(long)]
        no_timestamp: bool,

        /// Include records that are not fully reviewed.
        #[arg(long)]
        include_non_reviewed: bool,

        /// Emit every goal parameter, not only disagreements.
        #[arg(long)]
        all_goals: bool,

        /// Write all reviewed records with their review columns instead.
        #[arg(long)]
        full: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

fn parse_decision(word: &str) -> std::result::Result<Decision, String> {
    Decision::parse(word).ok_or_else(|| {
        format!("unknown decision '{word}': expected agree, accept, disagree, revert or reject")
    })
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "promptaudit=info",
        1 => "promptaudit=debug",
        _ => "promptaudit=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let session = cli.session.as_deref();
    match cli.command {
        Command::List {
            input,
            worker,
            disagreements_only,
        } => cmd_list(&input, session, worker, disagreements_only),
        Command::Show { input, unit, json } => cmd_show(&input, session, &unit, json),
        Command::Decide {
            input,
            unit,
            key,
            decision,
            comment,
            draft,
        } => {
            let action = if draft {
                ReviewAction::draft(decision, comment)
            } else {
                ReviewAction::save(decision, comment)
            };
            cmd_apply(&input, session, &unit, &key, action)
        }
        Command::Resolve { input, unit, key } => {
            cmd_apply(&input, session, &unit, &key, ReviewAction::MarkResolved)
        }
        Command::Reopen { input, unit, key } => {
            cmd_apply(&input, session, &unit, &key, ReviewAction::Reopen)
        }
        Command::SaveMetadata { input, unit } => cmd_save_metadata(&input, session, &unit),
        Command::Export {
            input,
            out,
            format,
            no_timestamp,
            include_non_reviewed,
            all_goals,
            full,
        } => {
            let flags = ExportFlags {
                format,
                no_timestamp,
                include_non_reviewed,
                all_goals,
            };
            cmd_export(&input, session, out, &flags, full)
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Review session
// ---------------------------------------------------------------------------

/// A loaded source plus the review progress saved against it.
struct Session {
    store: ReviewStore,
    path: PathBuf,
    fingerprint: String,
    selected_index: usize,
}

impl Session {
    fn open(input: &Path, session: Option<&Path>) -> Result<Self> {
        let config = load_config()?;
        let records = load_records(input, &IngestOptions::from(&config))?;
        let mut store = ReviewStore::new(records);

        let fingerprint = source_fingerprint(input)?;
        let path = session
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_session_path(input));

        let mut selected_index = 0;
        if let Some(snapshot) = load_session(&path)? {
            snapshot.apply_to(&mut store, &fingerprint);
            selected_index = snapshot.selected_index;
        }
        debug!(session = %path.display(), records = store.len(), "session opened");

        Ok(Self {
            store,
            path,
            fingerprint,
            selected_index,
        })
    }

    fn record(&self, unit: &str) -> Result<&Record> {
        self.store
            .get(&UnitId::from(unit))
            .ok_or_else(|| eyre!("no record with unit id '{unit}'"))
    }

    fn select(&mut self, unit: &str) {
        if let Some(pos) = self.store.position(&UnitId::from(unit)) {
            self.selected_index = pos;
        }
    }

    fn persist(&self) -> Result<()> {
        let snapshot = SessionSnapshot::capture(&self.store, &self.fingerprint, self.selected_index);
        save_session(&snapshot, &self.path)?;
        Ok(())
    }
}

/// Find the unit addressed by a bare review key.
fn unit_ref_for(record: &Record, key: &str) -> Result<UnitRef> {
    review_units(record)
        .into_iter()
        .find(|u| u.unit.key == key)
        .map(|u| u.unit)
        .ok_or_else(|| eyre!("record '{}' has no review unit '{key}'", record.unit_id))
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_list(
    input: &Path,
    session: Option<&Path>,
    worker: Option<String>,
    disagreements_only: bool,
) -> Result<()> {
    let session = Session::open(input, session)?;
    let filter = ListFilter {
        worker,
        disagreements_only,
    };
    let summaries = summarize(session.store.records(), &filter);

    println!(
        "{:<14} {:<20} {:>13} {:>9} {:>9}",
        "UNIT", "WORKER", "DISAGREEMENTS", "PROGRESS", "REVIEWED"
    );
    for s in &summaries {
        println!(
            "{:<14} {:<20} {:>13} {:>8}% {:>9}",
            s.unit_id.to_string(),
            s.worker_id,
            s.disagreements,
            s.progress.percent(),
            yes_no(s.reviewed)
        );
    }
    println!();
    println!("  {} of {} records shown", summaries.len(), session.store.len());
    Ok(())
}

fn cmd_show(input: &Path, session: Option<&Path>, unit: &str, json: bool) -> Result<()> {
    let session = Session::open(input, session)?;
    let record = session.record(unit)?;
    let units = review_units(record);

    if json {
        println!("{}", serde_json::to_string_pretty(&units)?);
        return Ok(());
    }

    let progress = ReviewProgress::from_units(&units);
    let flags = record.flags;
    println!();
    println!("  Record:   {} (worker {})", record.unit_id, record.worker_id);
    println!(
        "  Progress: {}/{} units resolved ({}%)",
        progress.resolved,
        progress.total,
        progress.percent()
    );
    println!(
        "  Sections: goals {} | user assertions {} | agent assertions {} | metadata {} | background {}",
        yes_no(flags.goals_reviewed),
        yes_no(flags.usa_reviewed),
        yes_no(flags.asa_reviewed),
        yes_no(flags.metadata_reviewed),
        yes_no(flags.background_info_reviewed),
    );
    println!("  Reviewed: {}", yes_no(flags.reviewed));

    for goal in extract_goals(record) {
        let p = goal.progress();
        println!();
        println!(
            "  {} [{} agreed, {} disagreed, {} pending]",
            goal.group_label(),
            p.agreed,
            p.disagreed,
            p.pending
        );
    }

    let mut current_group: Option<String> = None;
    for unit in &units {
        let group = format!("{} / {}", unit.kind(), unit.group_label);
        if current_group.as_deref() != Some(group.as_str()) {
            println!();
            println!("  {group}");
            current_group = Some(group);
        }
        print_unit(unit);
    }
    println!();
    Ok(())
}

fn print_unit(unit: &ReviewUnit) {
    let decision = unit
        .review
        .decision()
        .map(|d| unit.kind().decision_label(d))
        .unwrap_or("pending");
    let state = if unit.review.resolved { "resolved" } else { "open" };
    println!(
        "    {:<40} {:<10} {:<8} original={:?} annotator={:?} flag={}",
        unit.unit.key,
        decision,
        state,
        unit.original_value,
        unit.annotator_value,
        unit.annotator_flag.as_deref().unwrap_or("-"),
    );
    if !unit.review.comment.is_empty() {
        println!("    {:<40} comment: {}", "", unit.review.comment);
    }
}

fn cmd_apply(
    input: &Path,
    session: Option<&Path>,
    unit: &str,
    key: &str,
    action: ReviewAction,
) -> Result<()> {
    let mut session = Session::open(input, session)?;
    let unit_ref = unit_ref_for(session.record(unit)?, key)?;

    let record = session
        .store
        .apply(&UnitId::from(unit), &unit_ref, &action)?;
    let resolved = record.units.get(key).is_some_and(|u| u.resolved);
    let reviewed = record.flags.reviewed;

    session.select(unit);
    session.persist()?;

    info!(unit, key, resolved, reviewed, "review updated");
    println!(
        "  {unit_ref}: {} | record reviewed: {}",
        if resolved { "resolved" } else { "open" },
        yes_no(reviewed)
    );
    Ok(())
}

fn cmd_save_metadata(input: &Path, session: Option<&Path>, unit: &str) -> Result<()> {
    let mut session = Session::open(input, session)?;
    let reviewed = session
        .store
        .save_metadata_section(&UnitId::from(unit))?
        .flags
        .reviewed;

    session.select(unit);
    session.persist()?;

    println!("  metadata saved | record reviewed: {}", yes_no(reviewed));
    Ok(())
}

/// Export flags that override the config file.
struct ExportFlags {
    format: Option<ExportFormat>,
    no_timestamp: bool,
    include_non_reviewed: bool,
    all_goals: bool,
}

impl ExportFlags {
    fn apply(&self, config: &AppConfig) -> ExportOptions {
        let mut options = ExportOptions::from(config);
        if let Some(format) = self.format {
            options.format = format;
        }
        if self.no_timestamp {
            options.add_timestamp = false;
        }
        if self.include_non_reviewed {
            options.include_non_reviewed = true;
        }
        if self.all_goals {
            options.include_all_goals = true;
        }
        options
    }
}

fn cmd_export(
    input: &Path,
    session: Option<&Path>,
    out: Option<PathBuf>,
    flags: &ExportFlags,
    full: bool,
) -> Result<()> {
    let config = load_config()?;
    let options = flags.apply(&config);
    let out_dir = out.unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir));
    let session = Session::open(input, session)?;

    if full {
        let reviewed: Vec<Record> = session
            .store
            .records()
            .iter()
            .filter(|r| r.flags.reviewed)
            .cloned()
            .collect();
        if reviewed.is_empty() {
            println!("No reviewed prompts to export");
            return Ok(());
        }
        let path = out_dir.join(full_dump_file_name(options.format));
        let count = write_flat_records(&reviewed, &path)?;
        println!("Exported {count} reviewed prompts to {}", path.display());
        return Ok(());
    }

    match build_export(session.store.records(), &options) {
        ExportOutcome::Empty(reason) => {
            println!("{reason}");
        }
        ExportOutcome::Rows { rows, record_count } => {
            let path = write_disagreements(&rows, &out_dir, &options, Utc::now().date_naive())?;
            println!(
                "Export completed! {} disagreements from {record_count} records exported to {}",
                rows.len(),
                path.display()
            );
        }
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn decide_parses_decision_vocabulary() {
        let cli = Cli::try_parse_from([
            "promptaudit",
            "decide",
            "prompts.csv",
            "--unit",
            "U1",
            "--key",
            "goal_1_destination",
            "--decision",
            "reject",
            "--comment",
            "explicit",
        ])
        .expect("parse");
        match cli.command {
            Command::Decide {
                decision, draft, ..
            } => {
                assert_eq!(decision, Decision::Revert);
                assert!(!draft);
            }
            _ => panic!("expected decide"),
        }

        let err = Cli::try_parse_from([
            "promptaudit", "decide", "p.csv", "--unit", "U1", "--key", "k", "--decision", "maybe",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn export_flags_override_config() {
        let cli = Cli::try_parse_from([
            "promptaudit",
            "--session",
            "s.json",
            "export",
            "prompts.csv",
            "--format",
            "csv",
            "--no-timestamp",
            "--all-goals",
        ])
        .expect("parse");
        assert_eq!(cli.session, Some(PathBuf::from("s.json")));

        let Command::Export {
            format,
            no_timestamp,
            include_non_reviewed,
            all_goals,
            ..
        } = cli.command
        else {
            panic!("expected export");
        };
        let flags = ExportFlags {
            format,
            no_timestamp,
            include_non_reviewed,
            all_goals,
        };
        let options = flags.apply(&AppConfig::default());
        assert_eq!(options.format, ExportFormat::Csv);
        assert!(!options.add_timestamp);
        assert!(options.include_all_goals);
        assert!(!options.include_non_reviewed);
        assert!(options.preserve_comments);
    }
}
