//! Command-line front end for Warden.
//!
//! Validates the built-in catalog, prints deployment plans and installs the
//! catalog on a target database through an external SQL bridge.
//!
//! # Commands
//!
//! - `warden deploy [--dry-run] [--json] [--project-id ID]`
//! - `warden validate [--json]`
//! - `warden plan [--stage buckets|storage|policies]`
//! - `warden config {path,init,show}`
//! - `warden version`

pub mod app;
pub mod cli;
pub mod config;
pub mod config_handlers;
pub mod deploy_handlers;

pub use app::{WardenCli, exit_code};
pub use cli::{CliArgs, Command};
pub use config::WardenConfig;
