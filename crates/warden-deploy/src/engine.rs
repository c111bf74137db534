//! Sequential statement execution.
//!
//! The engine sends one statement at a time, in order, and never lets one
//! failure stop the rest of the batch. Each apply is bounded by a timeout;
//! running out of time counts as a transient failure.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ApplyError;
use crate::report::{DEFAULT_MAX_ERROR_LEN, ItemResult, StageReport, truncate};
use crate::statement::{Stage, Statement};
use crate::target::Target;

// ============================================================================
// Options
// ============================================================================

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Upper bound on a single apply.
    pub timeout: Duration,
    /// Characters of error text kept per failure.
    pub max_error_len: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_error_len: DEFAULT_MAX_ERROR_LEN,
        }
    }
}

// ============================================================================
// Progress reporting
// ============================================================================

/// Receives progress as a batch runs.
pub trait Observer {
    /// A stage with `total` statements is starting.
    fn stage_started(&mut self, _stage: Stage, _total: usize) {}

    /// Statement `index` of `total` is about to be sent.
    fn item_started(&mut self, _index: usize, _total: usize, _name: &str) {}

    /// A statement finished.
    fn item_finished(&mut self, _result: &ItemResult) {}

    /// A stage finished.
    fn stage_finished(&mut self, _report: &StageReport) {}
}

/// Ignores all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Observer for Silent {}

// ============================================================================
// Engine
// ============================================================================

/// Applies statements to a target one by one.
#[derive(Clone)]
pub struct Engine {
    target: Arc<dyn Target>,
    options: EngineOptions,
}

impl Engine {
    /// An engine with default options.
    pub fn new(target: Arc<dyn Target>) -> Self {
        Self {
            target,
            options: EngineOptions::default(),
        }
    }

    /// Replaces the options.
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Current options.
    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Runs `statements` in order.
    pub async fn run(
        &self,
        stage: Stage,
        statements: &[Statement],
        observer: &mut dyn Observer,
    ) -> StageReport {
        self.run_inner(stage, statements, None, observer).await
    }

    /// Runs `statements` in order, failing any object rule that names a
    /// bucket outside `provisioned` without sending it to the target.
    pub async fn run_gated(
        &self,
        stage: Stage,
        statements: &[Statement],
        provisioned: &BTreeSet<String>,
        observer: &mut dyn Observer,
    ) -> StageReport {
        self.run_inner(stage, statements, Some(provisioned), observer)
            .await
    }

    async fn run_inner(
        &self,
        stage: Stage,
        statements: &[Statement],
        provisioned: Option<&BTreeSet<String>>,
        observer: &mut dyn Observer,
    ) -> StageReport {
        let total = statements.len();
        let mut report = StageReport::new(stage);
        log::info!("Applying {total} {}", stage.label());
        observer.stage_started(stage, total);

        for (i, statement) in statements.iter().enumerate() {
            let index = i + 1;
            let name = statement.name();
            observer.item_started(index, total, name);

            let outcome = match provisioned.and_then(|p| missing_bucket(statement, p)) {
                Some(bucket) => Err(ApplyError::permanent(format!(
                    "bucket \"{bucket}\" was not provisioned"
                ))),
                None => self.apply_one(statement).await,
            };

            let result = match outcome {
                Ok(()) => {
                    log::debug!("[{index}/{total}] {name}: applied");
                    ItemResult::applied(index, name)
                }
                Err(e) if e.is_already_exists() => {
                    log::debug!("[{index}/{total}] {name}: already present");
                    ItemResult::already_present(index, name)
                }
                Err(e) => {
                    log::warn!("[{index}/{total}] {name}: {e}");
                    let error = truncate(&e.to_string(), self.options.max_error_len);
                    ItemResult::failed(index, name, error)
                }
            };
            observer.item_finished(&result);
            report.items.push(result);
        }

        log::info!(
            "{}: {}/{} succeeded",
            stage.label(),
            report.succeeded(),
            report.total()
        );
        observer.stage_finished(&report);
        report
    }

    async fn apply_one(&self, statement: &Statement) -> Result<(), ApplyError> {
        match tokio::time::timeout(self.options.timeout, self.target.apply(statement)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ApplyError::transient(format!(
                "timed out after {:?}",
                self.options.timeout
            ))),
        }
    }
}

fn missing_bucket<'a>(statement: &'a Statement, provisioned: &BTreeSet<String>) -> Option<&'a str> {
    statement
        .referenced_buckets()
        .into_iter()
        .find(|b| !provisioned.contains(*b))
}

// ============================================================================
// Tests
// ============================================================================
