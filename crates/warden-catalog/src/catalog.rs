//! The policy catalog: registry, buckets and rules in deployment order.

use warden_core::{Bucket, Policy, PolicySet, Result, TypeRegistry};

use crate::validation::{ValidationResult, validate_catalog};
use crate::{storage, tables};

/// Everything a deployment installs.
///
/// Buckets are provisioned first, then object rules, then row rules. Within
/// each list the order is the deployment order.
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Known resource types.
    pub registry: TypeRegistry,
    /// Bucket declarations.
    pub buckets: Vec<Bucket>,
    /// Rules over storage objects.
    pub storage_policies: Vec<Policy>,
    /// Rules over table rows.
    pub policies: Vec<Policy>,
}

impl Catalog {
    /// An empty catalog over `registry`.
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry,
            buckets: Vec::new(),
            storage_policies: Vec::new(),
            policies: Vec::new(),
        }
    }

    /// The platform's built-in catalog.
    pub fn standard() -> Self {
        let buckets = storage::buckets();
        let storage_policies = storage::policies(&buckets);
        Self {
            registry: TypeRegistry::standard(),
            buckets,
            storage_policies,
            policies: tables::policies(),
        }
    }

    /// Adds a bucket.
    pub fn with_bucket(mut self, bucket: Bucket) -> Self {
        self.buckets.push(bucket);
        self
    }

    /// Adds an object rule.
    pub fn with_storage_policy(mut self, policy: Policy) -> Self {
        self.storage_policies.push(policy);
        self
    }

    /// Adds a row rule.
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policies.push(policy);
        self
    }

    /// Object rules followed by row rules.
    pub fn all_policies(&self) -> impl Iterator<Item = &Policy> {
        self.storage_policies.iter().chain(&self.policies)
    }

    /// Number of rules of both kinds.
    pub fn policy_count(&self) -> usize {
        self.storage_policies.len() + self.policies.len()
    }

    /// Bucket named `name`.
    pub fn bucket(&self, name: &str) -> Option<&Bucket> {
        self.buckets.iter().find(|b| b.name == name)
    }

    /// Every rule as one evaluable set.
    pub fn policy_set(&self) -> PolicySet {
        self.all_policies().cloned().collect()
    }

    /// Runs every check and returns the findings.
    pub fn validate(&self) -> ValidationResult {
        validate_catalog(self)
    }

    /// Validates and fails with [`warden_core::Error::Validation`] on any error.
    pub fn validated(self) -> Result<Self> {
        let result = self.validate();
        for warning in &result.warnings {
            log::warn!("{warning}");
        }
        result.into_result()?;
        Ok(self)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use warden_core::{AccessRequest, Resource, ResourceType, Role, Subject, VerificationStatus};

    // -- Strategy helpers --

    fn arb_role() -> impl Strategy<Value = Role> {
        prop_oneof![
            Just(Role::Member),
            Just(Role::Admin),
            Just(Role::SuperAdmin),
        ]
    }

    fn arb_status() -> impl Strategy<Value = VerificationStatus> {
        prop_oneof![
            Just(VerificationStatus::Pending),
            Just(VerificationStatus::Approved),
            Just(VerificationStatus::Rejected),
        ]
    }

    /// Types whose rows carry their own tenant or inherit one from a parent.
    fn tenant_bound_types() -> Vec<ResourceType> {
        ResourceType::ALL
            .into_iter()
            .filter(|rt| rt.spec().tenant_bound())
            .collect()
    }

    fn arb_tenant_bound_type() -> impl Strategy<Value = ResourceType> {
        prop::sample::select(tenant_bound_types())
    }

    fn arb_owned_type() -> impl Strategy<Value = ResourceType> {
        let owned: Vec<ResourceType> = ResourceType::ALL
            .into_iter()
            .filter(|rt| rt.spec().owner_field.is_some())
            .collect();
        prop::sample::select(owned)
    }

    /// A row of `rt` in `tenant`, with the remaining columns drawn at random.
    /// Never a public event.
    fn arb_row(rt: ResourceType, tenant: &'static str) -> impl Strategy<Value = Resource> {
        (
            prop::sample::select(vec!["u1", "u2"]),
            prop::sample::select(vec!["approved", "pending", "published"]),
            prop::sample::select(vec!["private", "workshop"]),
        )
            .prop_map(move |(owner, status, kind)| {
                let spec = rt.spec();
                let mut row = Resource::new(rt)
                    .with("tenant_id", tenant)
                    .with("status", status)
                    .with("verification_status", status)
                    .with("event_type", kind);
                if let Some(field) = spec.owner_field {
                    row = row.with(field, owner);
                }
                if let Some((_, fk)) = spec.parent {
                    row = row.with(fk, "p1");
                }
                row
            })
    }

    fn parents(tenant: &str) -> Vec<Resource> {
        [ResourceType::Event, ResourceType::ForumThread, ResourceType::Badge]
            .into_iter()
            .map(|rt| Resource::new(rt).with("id", "p1").with("tenant_id", tenant))
            .collect()
    }

    fn arb_foreign_row() -> impl Strategy<Value = Resource> {
        arb_tenant_bound_type().prop_flat_map(|rt| arb_row(rt, "t2"))
    }

    proptest! {
        /// No subject from t1 reads a non-public row belonging to t2.
        #[test]
        fn tenant_isolation(role in arb_role(), status in arb_status(), row in arb_foreign_row()) {
            let set = Catalog::standard().policy_set();
            let subject = Subject::member("u1", "t1").with_role(role).with_status(status);
            let related = parents("t2");
            let request = AccessRequest::select(&row).with_related(&related);
            prop_assert!(!set.authorize(&subject, &request).allowed);
        }

        /// Admins get every action on rows of their own tenant wherever an
        /// admin management rule exists.
        #[test]
        fn admin_override(index in 0usize..64, owner in prop::sample::select(vec!["u1", "u2"])) {
            let catalog = Catalog::standard();
            let managed: Vec<ResourceType> = catalog
                .policies
                .iter()
                .filter(|p| p.name.starts_with("Admins can manage"))
                .map(|p| p.resource_type)
                .collect();
            let rt = managed[index % managed.len()];
            let spec = rt.spec();
            let mut row = Resource::new(rt).with("tenant_id", "t1").with("status", "pending");
            if let Some(field) = spec.owner_field {
                row = row.with(field, owner);
            }
            if let Some((_, fk)) = spec.parent {
                row = row.with(fk, "p1");
            }

            let set = catalog.policy_set();
            let admin = Subject::admin("a1", "t1");
            let related = parents("t1");
            for request in [
                AccessRequest::select(&row),
                AccessRequest::insert(&row),
                AccessRequest::update(&row, &row),
                AccessRequest::delete(&row),
            ] {
                prop_assert!(set.authorize(&admin, &request.with_related(&related)).allowed);
            }
        }

        /// A non-admin never creates a row owned by someone else.
        #[test]
        fn ownership_self_assignment(
            rt in arb_owned_type(),
            status in arb_status(),
        ) {
            let set = Catalog::standard().policy_set();
            let subject = Subject::member("u1", "t1").with_status(status);
            let spec = rt.spec();
            let mut row = Resource::new(rt)
                .with("tenant_id", "t1")
                .with("status", "pending")
                .with("event_type", "private");
            if let Some(field) = spec.owner_field {
                row = row.with(field, "u2");
            }
            if let Some((_, fk)) = spec.parent {
                row = row.with(fk, "p1");
            }
            let related = parents("t1");
            let request = AccessRequest::insert(&row).with_related(&related);
            prop_assert!(!set.authorize(&subject, &request).allowed);
        }
    }
}
