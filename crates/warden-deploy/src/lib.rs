//! Warden Deploy: idempotent, sequential installation of access rules.
//!
//! A deployment validates the catalog, upserts buckets, installs object
//! rules for the buckets that now exist, and finally installs row policies.
//! Statements go out one at a time through a [`Target`]; every outcome is
//! recorded and no single failure stops the batch.
//!
//! # Modules
//!
//! - [`error`]: [`ApplyError`] and its classification
//! - [`statement`]: [`Statement`] and deployment [`Stage`]s
//! - [`target`]: The [`Target`] trait
//! - [`command`], [`memory`], [`dry_run`], [`retry`]: Target implementations
//! - [`engine`]: Sequential execution with per-statement timeouts
//! - [`provisioner`]: Bucket upserts gating the object-rule stage
//! - [`deployer`]: Validation plus the three stages
//! - [`report`]: Per-rule results and summaries

pub mod command;
pub mod deployer;
pub mod dry_run;
pub mod engine;
pub mod error;
pub mod memory;
pub mod provisioner;
pub mod report;
pub mod retry;
pub mod statement;
pub mod target;

pub use command::CommandTarget;
pub use deployer::{Deployer, plan};
pub use dry_run::DryRunTarget;
pub use engine::{Engine, EngineOptions, Observer, Silent};
pub use error::ApplyError;
pub use memory::MemoryTarget;
pub use provisioner::{BucketProvisioner, Provisioned};
pub use report::{DeploymentReport, ItemResult, StageReport, truncate};
pub use retry::RetryTarget;
pub use statement::{Stage, Statement};
pub use target::Target;
