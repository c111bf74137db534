//! Warden Catalog: the platform's access rules and their validator.
//!
//! # Modules
//!
//! - [`catalog`]: The [`Catalog`] type and its deployment order
//! - [`tables`]: Row policies for every platform table
//! - [`storage`]: Bucket declarations and object access rules
//! - [`validation`]: Structural checks run before any deployment
//!
//! # Example
//!
//! ```
//! use warden_catalog::Catalog;
//!
//! let catalog = Catalog::standard();
//! let result = catalog.validate();
//! assert!(result.valid);
//! ```

pub mod catalog;
pub mod storage;
pub mod tables;
pub mod validation;

pub use catalog::Catalog;
pub use validation::{ValidationIssue, ValidationResult, is_valid, validate_catalog};
