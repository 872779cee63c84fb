//! InMemoryControlPlane — an in-process stand-in for both control planes.
//!
//! Implements [`ScalingApi`] and [`AlarmApi`] over plain maps, records
//! every call in order, and can be told to fail a given operation. Clones
//! share state, so a test can hand one clone to the reconciler as the
//! scaling API, another as the alarm API, and inspect a third.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use ecs_scale_core::{PolicyKind, ScalableTargetSpec};

use crate::api::{
    AlarmApi, AlarmRequest, ApiError, ApiResult, LiveAlarm, LivePolicy, LiveTarget, ScalingApi,
};

/// Remote operations, named after the control-plane actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    DescribeTarget,
    DescribePolicies,
    RegisterTarget,
    PutPolicy,
    DeletePolicy,
    DeregisterTarget,
    DescribeAlarms,
    PutAlarm,
    DeleteAlarms,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::DescribeTarget => "DescribeScalableTargets",
            Operation::DescribePolicies => "DescribeScalingPolicies",
            Operation::RegisterTarget => "RegisterScalableTarget",
            Operation::PutPolicy => "PutScalingPolicy",
            Operation::DeletePolicy => "DeleteScalingPolicy",
            Operation::DeregisterTarget => "DeregisterScalableTarget",
            Operation::DescribeAlarms => "DescribeAlarms",
            Operation::PutAlarm => "PutMetricAlarm",
            Operation::DeleteAlarms => "DeleteAlarms",
        }
    }
}

/// One recorded call, with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    DescribeTarget {
        resource_id: String,
    },
    DescribePolicies {
        resource_id: String,
        names: Vec<String>,
    },
    RegisterTarget {
        resource_id: String,
        target: ScalableTargetSpec,
    },
    PutPolicy {
        resource_id: String,
        name: String,
        kind: PolicyKind,
    },
    DeletePolicy {
        resource_id: String,
        name: String,
    },
    DeregisterTarget {
        resource_id: String,
    },
    DescribeAlarms {
        names: Vec<String>,
    },
    PutAlarm(AlarmRequest),
    DeleteAlarms {
        names: Vec<String>,
    },
}

impl Call {
    pub fn operation(&self) -> Operation {
        match self {
            Call::DescribeTarget { .. } => Operation::DescribeTarget,
            Call::DescribePolicies { .. } => Operation::DescribePolicies,
            Call::RegisterTarget { .. } => Operation::RegisterTarget,
            Call::PutPolicy { .. } => Operation::PutPolicy,
            Call::DeletePolicy { .. } => Operation::DeletePolicy,
            Call::DeregisterTarget { .. } => Operation::DeregisterTarget,
            Call::DescribeAlarms { .. } => Operation::DescribeAlarms,
            Call::PutAlarm(_) => Operation::PutAlarm,
            Call::DeleteAlarms { .. } => Operation::DeleteAlarms,
        }
    }

    /// True for every call that mutates remote state.
    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            Call::DescribeTarget { .. } | Call::DescribePolicies { .. } | Call::DescribeAlarms { .. }
        )
    }

    /// Names the call is about, used to scope injected failures.
    fn subjects(&self) -> Vec<&str> {
        match self {
            Call::DescribeTarget { resource_id }
            | Call::RegisterTarget { resource_id, .. }
            | Call::DeregisterTarget { resource_id } => vec![resource_id.as_str()],
            Call::DescribePolicies { names, .. }
            | Call::DescribeAlarms { names }
            | Call::DeleteAlarms { names } => names.iter().map(String::as_str).collect(),
            Call::PutPolicy { name, .. } | Call::DeletePolicy { name, .. } => vec![name.as_str()],
            Call::PutAlarm(alarm) => vec![alarm.name.as_str()],
        }
    }
}

#[derive(Debug, Clone)]
struct Failure {
    operation: Operation,
    subject: Option<String>,
    message: String,
}

#[derive(Debug, Default)]
struct PlaneState {
    targets: BTreeMap<String, LiveTarget>,
    /// Keyed by `(resource_id, policy_name)`.
    policies: BTreeMap<(String, String), LivePolicy>,
    /// Seeded alarms carry no request.
    alarms: BTreeMap<String, Option<AlarmRequest>>,
    calls: Vec<Call>,
    failures: Vec<Failure>,
    next_policy_id: u64,
}

impl PlaneState {
    /// Record `call`, then fail it if an injected failure applies.
    fn record(&mut self, call: Call) -> ApiResult<()> {
        let operation = call.operation();
        let failure = self
            .failures
            .iter()
            .find(|f| {
                f.operation == operation
                    && f.subject
                        .as_deref()
                        .is_none_or(|subject| call.subjects().contains(&subject))
            })
            .cloned();
        self.calls.push(call);
        match failure {
            Some(f) => Err(ApiError::new(operation.name(), f.message)),
            None => Ok(()),
        }
    }

    fn policy_arn(&mut self, resource_id: &str, name: &str) -> String {
        self.next_policy_id += 1;
        format!(
            "arn:aws:autoscaling:us-east-1:000000000000:scalingPolicy:{:08}:resource/ecs/{resource_id}:policyName/{name}",
            self.next_policy_id
        )
    }

    fn upsert_policy(&mut self, resource_id: &str, name: &str, kind: PolicyKind) -> String {
        let key = (resource_id.to_string(), name.to_string());
        let arn = match self.policies.get(&key) {
            Some(existing) => existing.arn.clone(),
            None => self.policy_arn(resource_id, name),
        };
        self.policies.insert(
            key,
            LivePolicy {
                name: name.to_string(),
                arn: arn.clone(),
                kind: Some(kind),
            },
        );
        arn
    }
}

/// Shared, cloneable in-memory control plane.
#[derive(Debug, Clone, Default)]
pub struct InMemoryControlPlane {
    state: Arc<Mutex<PlaneState>>,
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, PlaneState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Seeding ────────────────────────────────────────────────────

    /// Register a target directly, without recording a call.
    pub fn seed_target(&self, resource_id: &str, min_capacity: i32, max_capacity: i32) {
        self.state().targets.insert(
            resource_id.to_string(),
            LiveTarget {
                min_capacity,
                max_capacity,
            },
        );
    }

    /// Attach a policy directly and return its ARN.
    pub fn seed_policy(&self, resource_id: &str, name: &str, kind: PolicyKind) -> String {
        self.state().upsert_policy(resource_id, name, kind)
    }

    pub fn seed_alarm(&self, name: &str) {
        self.state().alarms.insert(name.to_string(), None);
    }

    // ── Failure injection ──────────────────────────────────────────

    /// Fail every call of `operation`.
    pub fn fail(&self, operation: Operation, message: &str) {
        self.state().failures.push(Failure {
            operation,
            subject: None,
            message: message.to_string(),
        });
    }

    /// Fail calls of `operation` that name `subject` (a policy, alarm, or
    /// resource id).
    pub fn fail_for(&self, operation: Operation, subject: &str, message: &str) {
        self.state().failures.push(Failure {
            operation,
            subject: Some(subject.to_string()),
            message: message.to_string(),
        });
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    // ── Inspection ─────────────────────────────────────────────────

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Mutating calls so far, in order.
    pub fn writes(&self) -> Vec<Call> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.is_write())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn target(&self, resource_id: &str) -> Option<LiveTarget> {
        self.state().targets.get(resource_id).copied()
    }

    pub fn policy(&self, resource_id: &str, name: &str) -> Option<LivePolicy> {
        self.state()
            .policies
            .get(&(resource_id.to_string(), name.to_string()))
            .cloned()
    }

    /// Names of every policy attached to `resource_id`.
    pub fn policy_names(&self, resource_id: &str) -> Vec<String> {
        self.state()
            .policies
            .keys()
            .filter(|(rid, _)| rid == resource_id)
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// The request an alarm was created with. `None` for absent or seeded alarms.
    pub fn alarm(&self, name: &str) -> Option<AlarmRequest> {
        self.state().alarms.get(name).cloned().flatten()
    }

    pub fn alarm_names(&self) -> Vec<String> {
        self.state().alarms.keys().cloned().collect()
    }
}

#[async_trait]
impl ScalingApi for InMemoryControlPlane {
    async fn describe_target(&self, resource_id: &str) -> ApiResult<Option<LiveTarget>> {
        let mut state = self.state();
        state.record(Call::DescribeTarget {
            resource_id: resource_id.to_string(),
        })?;
        Ok(state.targets.get(resource_id).copied())
    }

    async fn describe_policies(
        &self,
        resource_id: &str,
        names: &[String],
    ) -> ApiResult<Vec<LivePolicy>> {
        let mut state = self.state();
        state.record(Call::DescribePolicies {
            resource_id: resource_id.to_string(),
            names: names.to_vec(),
        })?;
        Ok(state
            .policies
            .iter()
            .filter(|((rid, name), _)| {
                rid == resource_id && (names.is_empty() || names.contains(name))
            })
            .map(|(_, policy)| policy.clone())
            .collect())
    }

    async fn register_target(&self, resource_id: &str, target: ScalableTargetSpec) -> ApiResult<()> {
        let mut state = self.state();
        state.record(Call::RegisterTarget {
            resource_id: resource_id.to_string(),
            target,
        })?;
        state.targets.insert(
            resource_id.to_string(),
            LiveTarget {
                min_capacity: target.min_capacity,
                max_capacity: target.max_capacity,
            },
        );
        debug!(%resource_id, "in-memory target registered");
        Ok(())
    }

    async fn put_policy(&self, resource_id: &str, name: &str, kind: &PolicyKind) -> ApiResult<()> {
        let mut state = self.state();
        state.record(Call::PutPolicy {
            resource_id: resource_id.to_string(),
            name: name.to_string(),
            kind: kind.clone(),
        })?;
        if !state.targets.contains_key(resource_id) {
            return Err(ApiError::new(
                Operation::PutPolicy.name(),
                format!("no scalable target registered for {resource_id}"),
            ));
        }
        state.upsert_policy(resource_id, name, kind.clone());
        Ok(())
    }

    async fn delete_policy(&self, resource_id: &str, name: &str) -> ApiResult<()> {
        let mut state = self.state();
        state.record(Call::DeletePolicy {
            resource_id: resource_id.to_string(),
            name: name.to_string(),
        })?;
        state
            .policies
            .remove(&(resource_id.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| {
                ApiError::new(
                    Operation::DeletePolicy.name(),
                    format!("no policy {name} on {resource_id}"),
                )
            })
    }

    async fn deregister_target(&self, resource_id: &str) -> ApiResult<()> {
        let mut state = self.state();
        state.record(Call::DeregisterTarget {
            resource_id: resource_id.to_string(),
        })?;
        if state.targets.remove(resource_id).is_none() {
            return Err(ApiError::new(
                Operation::DeregisterTarget.name(),
                format!("no scalable target registered for {resource_id}"),
            ));
        }
        // Deregistering drops any policies still attached.
        state.policies.retain(|(rid, _), _| rid != resource_id);
        Ok(())
    }
}

#[async_trait]
impl AlarmApi for InMemoryControlPlane {
    async fn describe_alarms(&self, names: &[String]) -> ApiResult<Vec<LiveAlarm>> {
        let mut state = self.state();
        state.record(Call::DescribeAlarms {
            names: names.to_vec(),
        })?;
        Ok(names
            .iter()
            .filter(|name| state.alarms.contains_key(name.as_str()))
            .map(|name| LiveAlarm { name: name.clone() })
            .collect())
    }

    async fn put_alarm(&self, alarm: &AlarmRequest) -> ApiResult<()> {
        let mut state = self.state();
        state.record(Call::PutAlarm(alarm.clone()))?;
        state.alarms.insert(alarm.name.clone(), Some(alarm.clone()));
        Ok(())
    }

    async fn delete_alarms(&self, names: &[String]) -> ApiResult<()> {
        let mut state = self.state();
        state.record(Call::DeleteAlarms {
            names: names.to_vec(),
        })?;
        if let Some(missing) = names.iter().find(|n| !state.alarms.contains_key(n.as_str())) {
            return Err(ApiError::new(
                Operation::DeleteAlarms.name(),
                format!("alarm {missing} not found"),
            ));
        }
        for name in names {
            state.alarms.remove(name);
        }
        Ok(())
    }
}
