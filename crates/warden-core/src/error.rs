//! Error types for Warden operations.
//!
//! This module provides a common `Error` type and `Result<T>` alias used across
//! all Warden crates. Uses `thiserror` for derive macros.
//!
//! Errors raised while applying a single rule to the target are not part of
//! this type; they live next to the deployment engine and are folded into
//! its report instead of being propagated.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur in Warden operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error tied to a specific path.
    #[error("I/O error at {path}: {source}")]
    IoWithPath {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A report or validation result could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The catalog failed structural validation; nothing was deployed.
    #[error("Catalog validation failed: {0}")]
    Validation(String),

    /// At least one rule failed to apply.
    #[error("Deployment finished with {failed} of {total} rule(s) failed")]
    Deployment {
        /// Number of failed rules.
        failed: usize,
        /// Number of rules attempted.
        total: usize,
    },
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Wrap an I/O error with the path it occurred on.
    pub fn io_with_path(source: std::io::Error, path: impl AsRef<Path>) -> Self {
        Self::IoWithPath {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Whether this error aborted the run before anything was deployed.
    pub fn is_fatal_before_deploy(&self) -> bool {
        !matches!(self, Self::Deployment { .. })
    }
}

/// Result type alias using Warden's Error type.
pub type Result<T> = std::result::Result<T, Error>;
