use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use enactor::RollbackScope;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "infrakit")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Deploy node-based infrastructures with automatic rollback", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check an infrastructure file against the registered plugins
    Validate {
        /// Infrastructure file (TOML or JSON)
        file: PathBuf,
    },

    /// Show the execution waves an infrastructure would run in
    Plan {
        /// Infrastructure file (TOML or JSON)
        file: PathBuf,
    },

    /// Create, configure and health-check every node
    Apply(ApplyArgs),

    /// Delete nodes recorded by a previous `apply --save`
    Destroy(DestroyArgs),

    /// List registered plugins and their configuration keys
    Plugins,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Apply / Destroy
// ============================================================================

#[derive(Parser)]
pub struct ApplyArgs {
    /// Infrastructure file (TOML or JSON)
    pub file: PathBuf,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Parallel instructions per wave
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Per-instruction timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// What to undo when the run fails
    #[arg(long, value_enum)]
    pub rollback_scope: Option<ScopeArg>,

    /// Write the nodes left alive to this file (JSON)
    #[arg(long)]
    pub save: Option<PathBuf>,
}

#[derive(Parser)]
pub struct DestroyArgs {
    /// Node state written by `apply --save`
    pub state: PathBuf,

    /// Infrastructure file, to delete dependent families first
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Parallel deletions per wave
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    /// Undo everything the run did
    WholeRun,
    /// Undo only nodes with a failing instruction
    FailedNodes,
}

impl From<ScopeArg> for RollbackScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::WholeRun => Self::WholeRun,
            ScopeArg::FailedNodes => Self::FailedNodes,
        }
    }
}
