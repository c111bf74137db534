//! Warden Core: subjects, resources, predicates and policies.
//!
//! This crate holds the declarative authorization model shared by every
//! Warden crate. It has no internal Warden dependencies.
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias
//! - [`subject`]: The acting identity and its capabilities
//! - [`resource`]: Resource types, the type registry and row values
//! - [`predicate`]: Composable capability checks with SQL rendering
//! - [`policy`]: Named rules and their OR-combined evaluation
//! - [`bucket`]: Blob-storage container metadata

pub mod bucket;
pub mod error;
pub mod policy;
pub mod predicate;
pub mod resource;
pub mod subject;

// Re-export key types at crate root for convenience
pub use bucket::{Bucket, UploadScope};
pub use error::{Error, Result};
pub use policy::{AccessRequest, Action, Decision, Policy, PolicySet};
pub use predicate::{Evaluation, Predicate};
pub use resource::{
    RelatedRows, Resource, ResourceSpec, ResourceType, StorageObject, TypeRegistry, Value,
};
pub use subject::{Capabilities, Role, Subject, VerificationStatus};
