//! Units of deployment work.

use serde::Serialize;
use warden_core::{Bucket, Policy, ResourceType};

/// Deployment phase. Phases run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Bucket upserts.
    Buckets,
    /// Object access rules.
    StorageAcl,
    /// Row policies.
    Policies,
}

impl Stage {
    /// Heading printed above the stage.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Buckets => "storage buckets",
            Stage::StorageAcl => "storage policies",
            Stage::Policies => "RLS policies",
        }
    }
}

/// One idempotent operation sent to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Create or overwrite a bucket.
    UpsertBucket(Bucket),
    /// Create a policy.
    CreatePolicy(Policy),
}

impl Statement {
    /// Bucket or policy name.
    pub fn name(&self) -> &str {
        match self {
            Statement::UpsertBucket(b) => &b.name,
            Statement::CreatePolicy(p) => &p.name,
        }
    }

    /// The stage this statement belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            Statement::UpsertBucket(_) => Stage::Buckets,
            Statement::CreatePolicy(p) if p.resource_type == ResourceType::StorageObject => {
                Stage::StorageAcl
            }
            Statement::CreatePolicy(_) => Stage::Policies,
        }
    }

    /// SQL sent to the target.
    pub fn to_sql(&self) -> String {
        match self {
            Statement::UpsertBucket(b) => b.to_upsert_sql(),
            Statement::CreatePolicy(p) => p.to_sql(),
        }
    }

    /// Buckets an object rule compares against.
    pub fn referenced_buckets(&self) -> Vec<&str> {
        match self {
            Statement::CreatePolicy(p) if p.resource_type == ResourceType::StorageObject => p
                .using
                .iter()
                .chain(p.check.iter())
                .flat_map(|pred| pred.literals_for("bucket_id"))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<Bucket> for Statement {
    fn from(bucket: Bucket) -> Self {
        Statement::UpsertBucket(bucket)
    }
}

impl From<Policy> for Statement {
    fn from(policy: Policy) -> Self {
        Statement::CreatePolicy(policy)
    }
}
