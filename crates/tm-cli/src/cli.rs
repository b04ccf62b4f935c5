//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};
use tm_core::Target;

/// Tidemark - linear schema migrations for DuckDB
#[derive(Parser, Debug)]
#[command(name = "tm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Named target from tidemark.yml (database connection and environment)
    #[arg(short, long, global = true)]
    pub target: Option<String>,

    /// Override the execution environment passed to migrations
    #[arg(long = "env", global = true, env = "TIDEMARK_ENV")]
    pub environment: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply migrations up to a target (default: head)
    Upgrade(UpgradeArgs),

    /// Revert migrations down to a target (default: one step)
    Downgrade(DowngradeArgs),

    /// Show the applied revision
    Current(CurrentArgs),

    /// List migrations in resolved order
    History(HistoryArgs),

    /// List revisions with no successor
    Heads(HeadsArgs),

    /// Set the applied revision without running migrations
    Stamp(StampArgs),

    /// Create a new migration definition file
    Revision(RevisionArgs),
}

/// Arguments for the upgrade command
#[derive(Args, Debug)]
pub struct UpgradeArgs {
    /// head, a revision (or unique prefix), or +N
    #[arg(default_value = "head", allow_hyphen_values = true)]
    pub revision: Target,

    /// Print the plan without executing it
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the downgrade command
#[derive(Args, Debug)]
pub struct DowngradeArgs {
    /// base, a revision (or unique prefix), or -N
    #[arg(default_value = "-1", allow_hyphen_values = true)]
    pub revision: Target,

    /// Print the plan without executing it
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the current command
#[derive(Args, Debug)]
pub struct CurrentArgs {}

/// Arguments for the history command
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: HistoryOutput,
}

/// History output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOutput {
    /// Table format
    Table,
    /// JSON output
    Json,
}

/// Arguments for the heads command
#[derive(Args, Debug)]
pub struct HeadsArgs {}

/// Arguments for the stamp command
#[derive(Args, Debug)]
pub struct StampArgs {
    /// head, base, a revision (or unique prefix), or +N / -N
    #[arg(allow_hyphen_values = true)]
    pub revision: Target,
}

/// Arguments for the revision command
#[derive(Args, Debug)]
pub struct RevisionArgs {
    /// Description of the change; also used for the file name
    #[arg(short, long)]
    pub message: String,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
