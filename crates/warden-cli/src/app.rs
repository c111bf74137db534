//! The Warden application: logging setup and command dispatch.

use tracing_subscriber::EnvFilter;
use warden_core::Result;

use crate::cli::{CliArgs, Command};
use crate::config::WardenConfig;
use crate::{config_handlers, deploy_handlers};

// ============================================================================
// WardenCli
// ============================================================================

/// The CLI application.
pub struct WardenCli {
    name: String,
    config: WardenConfig,
    version: String,
}

impl WardenCli {
    /// Create from CLI args, loading config from file/env.
    pub fn from_args(name: impl Into<String>, args: &CliArgs) -> Result<Self> {
        let config = WardenConfig::load(args.config.as_deref())?;
        Ok(Self::new(name, config))
    }

    /// Create with an already loaded config.
    pub fn new(name: impl Into<String>, config: WardenConfig) -> Self {
        Self {
            name: name.into(),
            config,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    /// Initialise tracing-based logging.
    ///
    /// Uses `RUST_LOG` if set, otherwise defaults based on verbosity flags.
    /// Library crates log through `log`; the subscriber picks those records up.
    pub fn init_logging(&self, verbose: bool, quiet: bool) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else if quiet {
            EnvFilter::new("warn")
        } else if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        };

        // A subscriber may already be set (e.g. in tests).
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Run the CLI with the given arguments.
    pub async fn run(&self, args: CliArgs) -> Result<()> {
        self.init_logging(args.verbose, args.quiet);
        tracing::debug!(config = ?args.config, "{} {} starting", self.name, self.version);

        match args.command {
            Some(Command::Deploy(deploy)) => {
                deploy_handlers::handle_deploy(&self.config, deploy, args.quiet).await
            }
            Some(Command::Validate { json }) => deploy_handlers::handle_validate(json),
            Some(Command::Plan { stage }) => deploy_handlers::handle_plan(stage),
            Some(Command::Config(config_cmd)) => {
                config_handlers::handle_config_command(args.config.as_deref(), config_cmd.command)
            }
            Some(Command::Version) => {
                println!("{} {}", self.name, self.version);
                Ok(())
            }
            None => {
                println!("{} {}, use --help for usage", self.name, self.version);
                Ok(())
            }
        }
    }
}

/// Process exit status for a finished run.
///
/// `0` on success, `1` when a deployment ran with failed statements, `2`
/// when the run stopped before deploying (bad configuration, invalid
/// catalog, I/O).
pub fn exit_code(result: &Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) if e.is_fatal_before_deploy() => 2,
        Err(_) => 1,
    }
}

// ============================================================================
// Tests
// ============================================================================
