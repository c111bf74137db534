//! The acting identity and its capabilities.
//!
//! Every access check receives an explicit [`Subject`]. There is no ambient
//! "current user" lookup: the caller builds the subject once per request and
//! passes it in.

use serde::{Deserialize, Serialize};

/// Role held by a subject within its tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular community member.
    Member,
    /// Tenant administrator.
    Admin,
    /// Platform-wide administrator.
    SuperAdmin,
    /// Unauthenticated caller.
    Anonymous,
}

/// Verification state of a subject's account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Awaiting review.
    Pending,
    /// Verified resident.
    Approved,
    /// Verification refused.
    Rejected,
}

/// The identity performing an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Subject id; `None` for anonymous callers.
    pub id: Option<String>,
    /// Tenant the subject belongs to.
    pub tenant_id: Option<String>,
    /// Role within the tenant.
    pub role: Role,
    /// Account verification state.
    pub verification_status: VerificationStatus,
}

impl Subject {
    /// Creates a pending member of `tenant_id`.
    pub fn member(id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            tenant_id: Some(tenant_id.into()),
            role: Role::Member,
            verification_status: VerificationStatus::Pending,
        }
    }

    /// Creates an approved admin of `tenant_id`.
    pub fn admin(id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self::member(id, tenant_id)
            .with_role(Role::Admin)
            .verified()
    }

    /// Creates an unauthenticated caller.
    pub fn anonymous() -> Self {
        Self {
            id: None,
            tenant_id: None,
            role: Role::Anonymous,
            verification_status: VerificationStatus::Pending,
        }
    }

    /// Sets the role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Sets the verification status.
    pub fn with_status(mut self, status: VerificationStatus) -> Self {
        self.verification_status = status;
        self
    }

    /// Marks the subject as approved.
    pub fn verified(self) -> Self {
        self.with_status(VerificationStatus::Approved)
    }
}

/// Capability checks consulted by predicates.
///
/// Implementations must be side-effect free. An [`Evaluation`] calls each
/// method at most once per access check.
///
/// [`Evaluation`]: crate::predicate::Evaluation
pub trait Capabilities {
    /// Id of the acting subject, if authenticated.
    fn subject_id(&self) -> Option<&str>;

    /// Tenant the subject acts within.
    fn tenant_of(&self) -> Option<&str>;

    /// Tenant admin or above.
    fn is_admin(&self) -> bool;

    /// Platform-wide admin.
    fn is_super_admin(&self) -> bool;

    /// Account verification approved.
    fn is_verified(&self) -> bool;
}

impl Capabilities for Subject {
    fn subject_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn tenant_of(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin | Role::SuperAdmin)
    }

    fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    fn is_verified(&self) -> bool {
        self.verification_status == VerificationStatus::Approved
    }
}
