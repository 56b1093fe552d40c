//! promptaudit CLI: review annotator disagreements in labeled prompt records.
//!
//! Loads a CSV/JSON source, keeps reviewer progress in a session file next
//! to it, and exports the reconciliation report.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
