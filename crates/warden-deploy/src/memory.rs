//! In-process target for tests and local rehearsal.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use warden_core::{Bucket, Policy, PolicySet};

use crate::error::ApplyError;
use crate::statement::Statement;
use crate::target::Target;

/// Simulated policy store.
///
/// Behaves like the real database where it matters to a deployment:
/// bucket upserts overwrite, a second `CREATE POLICY` with the same name on
/// the same table fails with "already exists", and object rules naming a
/// missing bucket are rejected. Faults and delays can be injected per
/// statement name.
///
/// Clones share state.
#[derive(Clone, Default)]
pub struct MemoryTarget {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    buckets: BTreeMap<String, Bucket>,
    policies: Vec<Policy>,
    faults: HashMap<String, Fault>,
    delays: HashMap<String, Duration>,
    calls: Vec<String>,
}

struct Fault {
    error: ApplyError,
    /// `None` fails forever.
    remaining: Option<u32>,
}

impl MemoryTarget {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every apply of `name` with `error`.
    pub async fn fail_always(&self, name: impl Into<String>, error: ApplyError) {
        self.state.lock().await.faults.insert(
            name.into(),
            Fault {
                error,
                remaining: None,
            },
        );
    }

    /// Fails the next `times` applies of `name` with `error`.
    pub async fn fail_times(&self, name: impl Into<String>, times: u32, error: ApplyError) {
        self.state.lock().await.faults.insert(
            name.into(),
            Fault {
                error,
                remaining: Some(times),
            },
        );
    }

    /// Sleeps for `delay` before applying `name`.
    pub async fn delay(&self, name: impl Into<String>, delay: Duration) {
        self.state.lock().await.delays.insert(name.into(), delay);
    }

    /// Names of every statement received, in order, including failed ones.
    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }

    /// Installed buckets.
    pub async fn buckets(&self) -> Vec<Bucket> {
        self.state.lock().await.buckets.values().cloned().collect()
    }

    /// Installed bucket named `name`.
    pub async fn bucket(&self, name: &str) -> Option<Bucket> {
        self.state.lock().await.buckets.get(name).cloned()
    }

    /// Names of installed policies, in installation order.
    pub async fn policy_names(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.policies.iter().map(|p| p.name.clone()).collect()
    }

    /// Installed policies as an evaluable set.
    pub async fn policy_set(&self) -> PolicySet {
        self.state.lock().await.policies.iter().cloned().collect()
    }

    fn take_fault(state: &mut MemoryState, name: &str) -> Option<ApplyError> {
        let fault = state.faults.get_mut(name)?;
        match &mut fault.remaining {
            None => Some(fault.error.clone()),
            Some(0) => None,
            Some(n) => {
                *n -= 1;
                Some(fault.error.clone())
            }
        }
    }
}

#[async_trait]
impl Target for MemoryTarget {
    async fn apply(&self, statement: &Statement) -> Result<(), ApplyError> {
        let delay = {
            let mut state = self.state.lock().await;
            state.calls.push(statement.name().to_string());
            state.delays.get(statement.name()).copied()
        };
        // The lock is not held while sleeping.
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        if let Some(error) = Self::take_fault(&mut state, statement.name()) {
            return Err(error);
        }

        match statement {
            Statement::UpsertBucket(bucket) => {
                state.buckets.insert(bucket.name.clone(), bucket.clone());
                Ok(())
            }
            Statement::CreatePolicy(policy) => {
                if let Some(missing) = statement
                    .referenced_buckets()
                    .into_iter()
                    .find(|b| !state.buckets.contains_key(*b))
                {
                    return Err(ApplyError::permanent(format!(
                        "bucket \"{missing}\" does not exist"
                    )));
                }
                let exists = state
                    .policies
                    .iter()
                    .any(|p| p.name == policy.name && p.table() == policy.table());
                if exists {
                    return Err(ApplyError::already_exists(format!(
                        "policy \"{}\" for table \"{}\" already exists",
                        policy.name,
                        policy.table()
                    )));
                }
                state.policies.push(policy.clone());
                Ok(())
            }
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}
