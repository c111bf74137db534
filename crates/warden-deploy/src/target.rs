//! Deployment target abstraction.

use async_trait::async_trait;

use crate::error::ApplyError;
use crate::statement::Statement;

/// Something that executes statements: a database bridge, an in-memory
/// store, a logger.
///
/// Implementations must be safe to call again with a statement that already
/// succeeded: bucket upserts overwrite, policy creation reports
/// [`ApplyError::AlreadyExists`].
#[async_trait]
pub trait Target: Send + Sync {
    /// Executes one statement.
    async fn apply(&self, statement: &Statement) -> Result<(), ApplyError>;

    /// Short name used in log lines.
    fn name(&self) -> &str {
        "target"
    }
}
