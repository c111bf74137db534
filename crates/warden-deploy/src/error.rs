//! Failures reported by a deployment target.

use thiserror::Error;

/// Outcome of a failed apply call.
///
/// Apply errors never escape the engine: each one is folded into the
/// per-rule report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// The object is already installed. Counts as success.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Network trouble, timeouts, overload. Worth retrying.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Malformed statement, unknown table or bucket, rejected credentials.
    #[error("{0}")]
    Permanent(String),
}

impl ApplyError {
    /// Create an already-exists error.
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// Create a transient error.
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Create a permanent error.
    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    /// Whether the target already held the object.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    /// Whether a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classify raw error text from a target.
    pub fn classify(text: &str) -> Self {
        let lower = text.to_ascii_lowercase();
        if lower.contains("already exists") {
            return Self::AlreadyExists(text.trim().to_string());
        }
        const TRANSIENT: [&str; 8] = [
            "timeout",
            "timed out",
            "connection",
            "network",
            "temporarily unavailable",
            "rate limit",
            "503",
            "502",
        ];
        if TRANSIENT.iter().any(|needle| lower.contains(needle)) {
            Self::Transient(text.trim().to_string())
        } else {
            Self::Permanent(text.trim().to_string())
        }
    }
}
