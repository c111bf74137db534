//! CLI argument parsing and command definitions.

use clap::{Parser, Subcommand, ValueEnum};
use warden_deploy::Stage;

// ============================================================================
// CLI argument types
// ============================================================================

/// Top-level arguments.
#[derive(Parser, Debug)]
#[command(name = "warden", author, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file.
    #[arg(short, long, env = "WARDEN_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress per-rule progress lines.
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate the catalog and install it on the target.
    Deploy(DeployArgs),

    /// Validate the catalog without touching any target.
    Validate {
        /// Print findings as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the statements a deployment would send, in order.
    Plan {
        /// Only this stage.
        #[arg(short, long, value_enum)]
        stage: Option<StageArg>,
    },

    /// Configuration operations.
    Config(ConfigCommand),

    /// Print version information.
    Version,
}

/// Options for `deploy`.
#[derive(Parser, Debug, Default)]
pub struct DeployArgs {
    /// Log statements instead of sending them.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the final report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Target project, overriding `target.project_id`.
    #[arg(long)]
    pub project_id: Option<String>,

    /// Per-rule timeout in seconds, overriding the configured one.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Do not retry transient failures.
    #[arg(long)]
    pub no_retry: bool,
}

/// Deployment stage selector.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageArg {
    /// Bucket upserts.
    Buckets,
    /// Object access rules.
    Storage,
    /// Row policies.
    Policies,
}

impl From<StageArg> for Stage {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Buckets => Stage::Buckets,
            StageArg::Storage => Stage::StorageAcl,
            StageArg::Policies => Stage::Policies,
        }
    }
}

/// Config-specific subcommands.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    /// Config subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigAction,
}

/// Available config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config file path.
    Path,

    /// Create a default configuration file.
    Init {
        /// Output file path (defaults to XDG config path).
        #[arg(short, long)]
        file: Option<String>,

        /// Overwrite existing file.
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration.
    Show {
        /// Print as `WARDEN_*` environment variables instead of TOML.
        #[arg(long)]
        env: bool,
    },
}

// ============================================================================
// Tests
// ============================================================================
