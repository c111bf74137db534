//! End-to-end catalog deployment.

use std::sync::Arc;

use warden_catalog::Catalog;
use warden_core::Result;

use crate::engine::{Engine, EngineOptions, Observer};
use crate::provisioner::BucketProvisioner;
use crate::report::DeploymentReport;
use crate::statement::{Stage, Statement};
use crate::target::Target;

/// Every statement a catalog deploys, in execution order.
pub fn plan(catalog: &Catalog) -> Vec<Statement> {
    catalog
        .buckets
        .iter()
        .cloned()
        .map(Statement::from)
        .chain(catalog.storage_policies.iter().cloned().map(Statement::from))
        .chain(catalog.policies.iter().cloned().map(Statement::from))
        .collect()
}

/// Validates a catalog and installs it stage by stage.
#[derive(Clone)]
pub struct Deployer {
    engine: Engine,
}

impl Deployer {
    /// A deployer for `target` with default engine options.
    pub fn new(target: Arc<dyn Target>) -> Self {
        Self {
            engine: Engine::new(target),
        }
    }

    /// Replaces the engine options.
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.engine = self.engine.with_options(options);
        self
    }

    /// Validates `catalog`, then provisions buckets, object rules and row
    /// policies in that order.
    ///
    /// Validation errors abort before anything is sent. Apply failures are
    /// recorded in the report; the caller decides what they mean.
    pub async fn deploy(
        &self,
        catalog: &Catalog,
        observer: &mut dyn Observer,
    ) -> Result<DeploymentReport> {
        let validation = catalog.validate().into_result()?;
        let warnings: Vec<String> = validation.warnings.iter().map(ToString::to_string).collect();
        for warning in &warnings {
            log::warn!("{warning}");
        }

        let provisioned = BucketProvisioner::new(&self.engine)
            .provision(&catalog.buckets, observer)
            .await;

        let storage: Vec<Statement> = catalog
            .storage_policies
            .iter()
            .cloned()
            .map(Statement::from)
            .collect();
        let storage = self
            .engine
            .run_gated(Stage::StorageAcl, &storage, &provisioned.buckets, observer)
            .await;

        let policies: Vec<Statement> = catalog.policies.iter().cloned().map(Statement::from).collect();
        let policies = self.engine.run(Stage::Policies, &policies, observer).await;

        let report = DeploymentReport {
            stages: vec![provisioned.report, storage, policies],
            warnings,
        };
        log::info!(
            "Deployment finished: {}/{} succeeded",
            report.succeeded(),
            report.total()
        );
        Ok(report)
    }
}
