//! Target that logs statements instead of running them.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::ApplyError;
use crate::statement::Statement;
use crate::target::Target;

/// Accepts every statement without side effects.
///
/// Each statement's SQL is logged at info level and kept for inspection.
#[derive(Clone, Default)]
pub struct DryRunTarget {
    seen: Arc<Mutex<Vec<String>>>,
}

impl DryRunTarget {
    /// A fresh dry run.
    pub fn new() -> Self {
        Self::default()
    }

    /// SQL of every statement received, in order.
    pub async fn statements(&self) -> Vec<String> {
        self.seen.lock().await.clone()
    }
}

#[async_trait]
impl Target for DryRunTarget {
    async fn apply(&self, statement: &Statement) -> Result<(), ApplyError> {
        let sql = statement.to_sql();
        log::info!("[dry-run] {sql}");
        self.seen.lock().await.push(sql);
        Ok(())
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}
