//! Catalog validation.
//!
//! Runs before anything is deployed. Errors abort the batch; warnings are
//! reported and deployment continues.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use warden_core::{Action, Error, Policy, Predicate, ResourceType, Result, UploadScope};

use crate::Catalog;

// ============================================================================
// Types
// ============================================================================

/// Result of catalog validation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the catalog is deployable (no errors).
    pub valid: bool,
    /// Issues that block deployment.
    pub errors: Vec<ValidationIssue>,
    /// Suspicious but deployable findings.
    pub warnings: Vec<ValidationIssue>,
    /// Informational findings.
    pub info: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Create a new empty (valid) result.
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            info: Vec::new(),
        }
    }

    /// Add an error (marks the catalog as invalid).
    pub fn add_error(&mut self, issue: ValidationIssue) {
        self.valid = false;
        self.errors.push(issue);
    }

    /// Add a warning.
    pub fn add_warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    /// Add an informational finding.
    pub fn add_info(&mut self, issue: ValidationIssue) {
        self.info.push(issue);
    }

    /// Total issue count (errors + warnings).
    pub fn total_issues(&self) -> usize {
        self.errors.len() + self.warnings.len()
    }

    /// Whether any error carries `code`.
    pub fn has_error(&self, code: &str) -> bool {
        self.errors.iter().any(|i| i.code == code)
    }

    /// Whether any warning carries `code`.
    pub fn has_warning(&self, code: &str) -> bool {
        self.warnings.iter().any(|i| i.code == code)
    }

    /// Pass the result through when valid, otherwise fail with
    /// [`Error::Validation`] listing every error.
    pub fn into_result(self) -> Result<Self> {
        if self.valid {
            return Ok(self);
        }
        let summary: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        Err(Error::validation(summary.join("; ")))
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// A validation issue found in the catalog.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Issue code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Affected policy names.
    pub policies: Vec<String>,
    /// Affected bucket names.
    pub buckets: Vec<String>,
}

impl ValidationIssue {
    /// Create a new issue.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            policies: Vec::new(),
            buckets: Vec::new(),
        }
    }

    /// Attach affected policies.
    pub fn with_policies(mut self, policies: Vec<String>) -> Self {
        self.policies = policies;
        self
    }

    /// Attach affected buckets.
    pub fn with_buckets(mut self, buckets: Vec<String>) -> Self {
        self.buckets = buckets;
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        let affected: Vec<&str> = self
            .policies
            .iter()
            .chain(&self.buckets)
            .map(String::as_str)
            .collect();
        if !affected.is_empty() {
            write!(f, " [{}]", affected.join(", "))?;
        }
        Ok(())
    }
}

// ============================================================================
// Validation functions
// ============================================================================

/// Validate a catalog.
///
/// Errors:
/// - `DUPLICATE_NAME`: two policies on one table, or two buckets, share a name
/// - `UNKNOWN_RESOURCE_TYPE`: a policy targets a type missing from the registry
/// - `MISSING_TENANT_CLAUSE`: a rule on a tenant-bound type can match another tenant's rows
/// - `MISSING_SELF_ASSIGNMENT`: a write on an owned type does not pin the owner
/// - `MISSING_CHECK`: an insert rule without a check predicate
/// - `VISIBILITY_IN_MUTATION`: a write rule consults the visibility column
/// - `UNKNOWN_BUCKET`: an object rule names an undeclared bucket
/// - `UPLOAD_SCOPE_MISMATCH`: an upload rule is looser than its bucket's scope
///
/// Warnings:
/// - `WIDENED_ACCESS`: a tenant-global read rule sits next to tenant-scoped ones
///
/// Info:
/// - `UNGUARDED_TYPE`: a registered type has no rule at all (every access denied)
pub fn validate_catalog(catalog: &Catalog) -> ValidationResult {
    let mut result = ValidationResult::new();

    check_duplicate_names(catalog, &mut result);
    check_resource_types(catalog, &mut result);
    check_tenant_clauses(catalog, &mut result);
    check_self_assignment(catalog, &mut result);
    check_insert_checks(catalog, &mut result);
    check_visibility_in_mutations(catalog, &mut result);
    check_bucket_references(catalog, &mut result);
    check_upload_scopes(catalog, &mut result);
    check_widened_access(catalog, &mut result);
    check_unguarded_types(catalog, &mut result);

    log::debug!(
        "Validated {} policies and {} buckets: {} error(s), {} warning(s)",
        catalog.policy_count(),
        catalog.buckets.len(),
        result.errors.len(),
        result.warnings.len()
    );
    result
}

/// Quick check if the catalog has any validation errors.
pub fn is_valid(catalog: &Catalog) -> bool {
    validate_catalog(catalog).valid
}

// ============================================================================
// Individual checks
// ============================================================================

fn names(policies: Vec<&Policy>) -> Vec<String> {
    policies.into_iter().map(|p| p.name.clone()).collect()
}

/// Policy names must be unique per table; bucket names globally.
fn check_duplicate_names(catalog: &Catalog, result: &mut ValidationResult) {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let duplicates: Vec<String> = catalog
        .all_policies()
        .filter(|p| !seen.insert((p.table(), p.name.as_str())))
        .map(|p| format!("{} on {}", p.name, p.table()))
        .collect();
    if !duplicates.is_empty() {
        result.add_error(
            ValidationIssue::new(
                "DUPLICATE_NAME",
                format!("{} policy name(s) are declared twice", duplicates.len()),
            )
            .with_policies(duplicates),
        );
    }

    let mut seen_buckets: HashSet<&str> = HashSet::new();
    let duplicates: Vec<String> = catalog
        .buckets
        .iter()
        .filter(|b| !seen_buckets.insert(b.name.as_str()))
        .map(|b| b.name.clone())
        .collect();
    if !duplicates.is_empty() {
        result.add_error(
            ValidationIssue::new(
                "DUPLICATE_NAME",
                format!("{} bucket name(s) are declared twice", duplicates.len()),
            )
            .with_buckets(duplicates),
        );
    }
}

fn check_resource_types(catalog: &Catalog, result: &mut ValidationResult) {
    let unknown: Vec<&Policy> = catalog
        .all_policies()
        .filter(|p| !catalog.registry.contains(p.resource_type))
        .collect();
    if !unknown.is_empty() {
        result.add_error(
            ValidationIssue::new(
                "UNKNOWN_RESOURCE_TYPE",
                format!("{} policy(ies) target unregistered types", unknown.len()),
            )
            .with_policies(names(unknown)),
        );
    }
}

/// The predicates a rule applies to existing rows and to written rows.
fn guards(policy: &Policy) -> (Option<&Predicate>, Option<&Predicate>) {
    match policy.action {
        Action::Select | Action::Delete => (policy.using.as_ref(), None),
        Action::Insert => (None, policy.check.as_ref()),
        Action::Update | Action::All => (policy.using.as_ref(), policy.effective_check()),
    }
}

fn pinned_to_tenant(predicate: Option<&Predicate>) -> bool {
    predicate.is_some_and(Predicate::requires_tenant_match)
}

fn check_tenant_clauses(catalog: &Catalog, result: &mut ValidationResult) {
    let missing: Vec<&Policy> = catalog
        .all_policies()
        .filter(|p| {
            catalog
                .registry
                .get(p.resource_type)
                .is_some_and(|spec| spec.tenant_bound())
        })
        .filter(|p| {
            if p.action == Action::Select && p.tenant_global {
                return false;
            }
            let (existing, written) = guards(p);
            let existing_ok = p.action == Action::Insert || pinned_to_tenant(existing);
            let written_ok = matches!(p.action, Action::Select | Action::Delete)
                || pinned_to_tenant(written);
            !(existing_ok && written_ok)
        })
        .collect();
    if !missing.is_empty() {
        result.add_error(
            ValidationIssue::new(
                "MISSING_TENANT_CLAUSE",
                format!(
                    "{} policy(ies) on tenant-bound tables do not pin rows to the caller's tenant",
                    missing.len()
                ),
            )
            .with_policies(names(missing)),
        );
    }
}

fn check_self_assignment(catalog: &Catalog, result: &mut ValidationResult) {
    let missing: Vec<&Policy> = catalog
        .all_policies()
        .filter(|p| {
            if p.resource_type == ResourceType::StorageObject {
                // Object writes: the path owner or an admin.
                return matches!(p.action, Action::Update | Action::Delete | Action::All)
                    && !p.using.as_ref().is_some_and(|u| {
                        u.requires(&|leaf| {
                            matches!(
                                leaf,
                                Predicate::PathOwner | Predicate::IsAdmin | Predicate::IsSuperAdmin
                            )
                        })
                    });
            }
            let Some(owner) = catalog
                .registry
                .get(p.resource_type)
                .and_then(|spec| spec.owner_field)
            else {
                return false;
            };
            if !matches!(p.action, Action::Insert | Action::Update | Action::All) {
                return false;
            }
            !p.effective_check().is_some_and(|c| {
                c.requires(&|leaf| match leaf {
                    Predicate::SubjectIs { column } => column == owner,
                    Predicate::IsAdmin | Predicate::IsSuperAdmin => true,
                    _ => false,
                })
            })
        })
        .collect();
    if !missing.is_empty() {
        result.add_error(
            ValidationIssue::new(
                "MISSING_SELF_ASSIGNMENT",
                format!(
                    "{} write policy(ies) let callers assign rows to someone else",
                    missing.len()
                ),
            )
            .with_policies(names(missing)),
        );
    }
}

fn check_insert_checks(catalog: &Catalog, result: &mut ValidationResult) {
    let missing: Vec<&Policy> = catalog
        .all_policies()
        .filter(|p| p.action == Action::Insert && p.check.is_none())
        .collect();
    if !missing.is_empty() {
        result.add_error(
            ValidationIssue::new(
                "MISSING_CHECK",
                format!("{} insert policy(ies) have no check predicate", missing.len()),
            )
            .with_policies(names(missing)),
        );
    }
}

fn check_visibility_in_mutations(catalog: &Catalog, result: &mut ValidationResult) {
    let offending: Vec<&Policy> = catalog
        .all_policies()
        .filter(|p| p.action.is_mutating())
        .filter(|p| {
            let Some(column) = catalog
                .registry
                .get(p.resource_type)
                .and_then(|spec| spec.visibility_column)
            else {
                return false;
            };
            p.using
                .iter()
                .chain(p.check.iter())
                .any(|pred| pred.mentions_column(column))
        })
        .collect();
    if !offending.is_empty() {
        result.add_error(
            ValidationIssue::new(
                "VISIBILITY_IN_MUTATION",
                format!(
                    "{} write policy(ies) grant access through a visibility column",
                    offending.len()
                ),
            )
            .with_policies(names(offending)),
        );
    }
}

/// Bucket names an object rule compares `bucket_id` against.
fn referenced_buckets(policy: &Policy) -> Vec<&str> {
    policy
        .using
        .iter()
        .chain(policy.check.iter())
        .flat_map(|p| p.literals_for("bucket_id"))
        .collect()
}

fn check_bucket_references(catalog: &Catalog, result: &mut ValidationResult) {
    let mut policies = Vec::new();
    let mut buckets = Vec::new();
    for policy in &catalog.storage_policies {
        let unknown: Vec<&str> = referenced_buckets(policy)
            .into_iter()
            .filter(|name| catalog.bucket(name).is_none())
            .collect();
        if !unknown.is_empty() {
            policies.push(policy.name.clone());
            buckets.extend(unknown.into_iter().map(String::from));
        }
    }
    if !policies.is_empty() {
        result.add_error(
            ValidationIssue::new(
                "UNKNOWN_BUCKET",
                format!("{} object policy(ies) name undeclared buckets", policies.len()),
            )
            .with_policies(policies)
            .with_buckets(buckets),
        );
    }
}

fn satisfies_scope(check: &Predicate, scope: UploadScope) -> bool {
    match scope {
        UploadScope::Owner => check.requires_path_owner() && check.requires_verified(),
        UploadScope::Admin => check.requires_admin(),
        UploadScope::Verified => check.requires_verified(),
    }
}

fn check_upload_scopes(catalog: &Catalog, result: &mut ValidationResult) {
    let mut policies = Vec::new();
    let mut buckets = Vec::new();
    for policy in &catalog.storage_policies {
        if !policy.action.covers(Action::Insert) {
            continue;
        }
        let Some(check) = policy.effective_check() else {
            continue;
        };
        let loose: Vec<&str> = referenced_buckets(policy)
            .into_iter()
            .filter(|name| {
                catalog
                    .bucket(name)
                    .is_some_and(|b| !satisfies_scope(check, b.upload_scope))
            })
            .collect();
        if !loose.is_empty() {
            policies.push(policy.name.clone());
            buckets.extend(loose.into_iter().map(String::from));
        }
    }
    if !policies.is_empty() {
        result.add_error(
            ValidationIssue::new(
                "UPLOAD_SCOPE_MISMATCH",
                format!(
                    "{} upload policy(ies) are looser than their bucket's upload scope",
                    policies.len()
                ),
            )
            .with_policies(policies)
            .with_buckets(buckets),
        );
    }
}

fn check_widened_access(catalog: &Catalog, result: &mut ValidationResult) {
    let mut by_type: BTreeMap<ResourceType, (Vec<&Policy>, bool)> = BTreeMap::new();
    for policy in catalog.all_policies() {
        if !policy.action.covers(Action::Select) {
            continue;
        }
        let entry = by_type.entry(policy.resource_type).or_default();
        if policy.tenant_global && !pinned_to_tenant(policy.using.as_ref()) {
            entry.0.push(policy);
        } else if pinned_to_tenant(policy.using.as_ref()) {
            entry.1 = true;
        }
    }
    for (resource_type, (global, has_scoped)) in by_type {
        if has_scoped && !global.is_empty() {
            result.add_warning(
                ValidationIssue::new(
                    "WIDENED_ACCESS",
                    format!(
                        "tenant-global read rules on {resource_type} override its tenant-scoped ones"
                    ),
                )
                .with_policies(names(global)),
            );
        }
    }
}

fn check_unguarded_types(catalog: &Catalog, result: &mut ValidationResult) {
    let guarded: HashSet<ResourceType> = catalog.all_policies().map(|p| p.resource_type).collect();
    let unguarded: Vec<String> = ResourceType::ALL
        .into_iter()
        .filter(|rt| catalog.registry.contains(*rt) && !guarded.contains(rt))
        .map(|rt| rt.to_string())
        .collect();
    if !unguarded.is_empty() {
        result.add_info(ValidationIssue::new(
            "UNGUARDED_TYPE",
            format!("no policy for {}; all access is denied", unguarded.join(", ")),
        ));
    }
}

// ============================================================================
// Tests
// ============================================================================
