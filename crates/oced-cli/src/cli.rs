use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "oced",
    about = "Object-Centric Event Data store: apply, revert and inspect event histories",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply a JSON batch of events to a store snapshot
    Apply(ApplyArgs),
    /// Revert the latest live events of a snapshot
    Revert(RevertArgs),
    /// Summarize the contents of a snapshot
    Inspect(InspectArgs),
    /// Check a snapshot's digest and integrity
    Verify(VerifyArgs),
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Event batch: one event object or an array of them
    pub events: PathBuf,
    /// Snapshot to start from; created if it does not exist
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
    /// Where to write the resulting snapshot (defaults to --snapshot)
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Store configuration in TOML
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Report failed events and continue with the rest
    #[arg(long)]
    pub keep_going: bool,
}

#[derive(Args)]
pub struct RevertArgs {
    pub snapshot: PathBuf,
    /// Number of events to revert, newest first
    #[arg(short = 'n', long, default_value = "1")]
    pub count: usize,
    /// Where to write the result (defaults to overwriting the snapshot)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct InspectArgs {
    pub snapshot: PathBuf,
    /// Also list every log record
    #[arg(long)]
    pub log: bool,
}

#[derive(Args)]
pub struct VerifyArgs {
    pub snapshot: PathBuf,
}
