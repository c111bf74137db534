//! The `warden` binary.

use std::process::ExitCode;

use clap::Parser;
use warden_cli::{CliArgs, WardenCli, exit_code};

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    let result = match WardenCli::from_args("warden", &args) {
        Ok(app) => app.run(args).await,
        Err(e) => Err(e),
    };
    if let Err(e) = &result {
        eprintln!("error: {e}");
    }
    ExitCode::from(exit_code(&result))
}
