//! Bucket provisioning.

use std::collections::BTreeSet;

use warden_core::Bucket;

use crate::engine::{Engine, Observer};
use crate::report::StageReport;
use crate::statement::{Stage, Statement};

/// Outcome of the bucket stage.
#[derive(Debug, Clone)]
pub struct Provisioned {
    /// Per-bucket results.
    pub report: StageReport,
    /// Buckets that exist on the target after this run.
    pub buckets: BTreeSet<String>,
}

/// Upserts bucket declarations ahead of any object rule.
pub struct BucketProvisioner<'a> {
    engine: &'a Engine,
}

impl<'a> BucketProvisioner<'a> {
    /// A provisioner that sends upserts through `engine`.
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Upserts every bucket, in order, and reports which ones now exist.
    pub async fn provision(&self, buckets: &[Bucket], observer: &mut dyn Observer) -> Provisioned {
        let statements: Vec<Statement> = buckets.iter().cloned().map(Statement::from).collect();
        let report = self.engine.run(Stage::Buckets, &statements, observer).await;
        let buckets = report.succeeded_names().map(String::from).collect();
        Provisioned { report, buckets }
    }
}
