//! Per-rule outcomes and batch summaries.

use serde::Serialize;
use warden_core::{Error, Result};

use crate::statement::Stage;

/// Default cap on error text kept per failed rule.
pub const DEFAULT_MAX_ERROR_LEN: usize = 200;

/// Cuts `text` to at most `max` characters.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// Outcome of one statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemResult {
    /// 1-based position within its stage.
    pub index: usize,
    /// Bucket or policy name.
    pub name: String,
    /// Whether the statement took effect (or already had).
    pub success: bool,
    /// The target already held the object.
    pub already_present: bool,
    /// Truncated error text for failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemResult {
    /// A success.
    pub fn applied(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            success: true,
            already_present: false,
            error: None,
        }
    }

    /// A success on an object that was already there.
    pub fn already_present(index: usize, name: impl Into<String>) -> Self {
        Self {
            already_present: true,
            ..Self::applied(index, name)
        }
    }

    /// A failure.
    pub fn failed(index: usize, name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            success: false,
            already_present: false,
            error: Some(error.into()),
        }
    }
}

/// Outcomes of one stage, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// Which stage ran.
    pub stage: Stage,
    /// One entry per statement.
    pub items: Vec<ItemResult>,
}

impl StageReport {
    /// An empty report for `stage`.
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            items: Vec::new(),
        }
    }

    /// Statements attempted.
    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// Statements that succeeded.
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.success).count()
    }

    /// Statements that failed.
    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// Failed items.
    pub fn failures(&self) -> impl Iterator<Item = &ItemResult> {
        self.items.iter().filter(|i| !i.success)
    }

    /// Names of items that succeeded.
    pub fn succeeded_names(&self) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .filter(|i| i.success)
            .map(|i| i.name.as_str())
    }
}

/// Summary of a whole deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeploymentReport {
    /// Stage reports in execution order.
    pub stages: Vec<StageReport>,
    /// Validation warnings raised before deploying.
    pub warnings: Vec<String>,
}

impl DeploymentReport {
    /// Statements attempted across all stages.
    pub fn total(&self) -> usize {
        self.stages.iter().map(StageReport::total).sum()
    }

    /// Statements that succeeded.
    pub fn succeeded(&self) -> usize {
        self.stages.iter().map(StageReport::succeeded).sum()
    }

    /// Statements that failed.
    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// Whether every statement succeeded.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Report for `stage`, if it ran.
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Every failed item with its stage.
    pub fn failures(&self) -> impl Iterator<Item = (Stage, &ItemResult)> {
        self.stages
            .iter()
            .flat_map(|s| s.failures().map(move |i| (s.stage, i)))
    }

    /// Passes the report through when nothing failed, otherwise
    /// [`Error::Deployment`].
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::Deployment {
                failed: self.failed(),
                total: self.total(),
            })
        }
    }
}
