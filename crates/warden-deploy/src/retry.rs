//! Retry wrapper for deployment targets.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use std::sync::Arc;
use std::time::Duration;

use crate::error::ApplyError;
use crate::statement::Statement;
use crate::target::Target;

/// Wraps a target, retrying transient failures with exponential backoff.
pub struct RetryTarget {
    inner: Arc<dyn Target>,
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl RetryTarget {
    /// Creates a new retry wrapper with default settings.
    ///
    /// Default settings:
    /// - Max attempts: 3
    /// - Initial delay: 500 milliseconds
    /// - Max delay: 10 seconds
    pub fn new(target: Arc<dyn Target>) -> Self {
        Self {
            inner: target,
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }

    /// Sets the maximum number of attempts, the first one included.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the initial delay between retries.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay between retries.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    fn should_retry(error: &ApplyError) -> bool {
        error.is_retryable()
    }
}

#[async_trait]
impl Target for RetryTarget {
    async fn apply(&self, statement: &Statement) -> Result<(), ApplyError> {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize);

        let target = self.inner.clone();

        (|| async { target.apply(statement).await })
            .retry(backoff)
            .when(Self::should_retry)
            .notify(|err: &ApplyError, dur: Duration| {
                log::warn!("Retrying {} in {dur:?}: {err}", statement.name());
            })
            .await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
