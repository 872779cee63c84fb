//! Capability interfaces for the two remote control planes.
//!
//! The reconciler only ever talks to these traits. `ecs-scale-aws`
//! implements them over the AWS SDK; [`crate::InMemoryControlPlane`]
//! implements them for tests.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use ecs_scale_core::{PolicyKind, ScalableTargetSpec};

/// Result type alias for a single remote call.
pub type ApiResult<T> = Result<T, ApiError>;

/// A failed remote call.
#[derive(Debug, Clone, Error)]
#[error("{operation} failed: {message}")]
pub struct ApiError {
    /// Control-plane operation name, e.g. `PutScalingPolicy`.
    pub operation: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(operation: &'static str, message: impl fmt::Display) -> Self {
        Self {
            operation,
            message: message.to_string(),
        }
    }
}

/// Registered capacity bounds as reported by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveTarget {
    pub min_capacity: i32,
    pub max_capacity: i32,
}

/// A scaling policy as reported by the control plane.
#[derive(Debug, Clone, PartialEq)]
pub struct LivePolicy {
    pub name: String,
    pub arn: String,
    /// `None` for policy types this tool does not manage.
    pub kind: Option<PolicyKind>,
}

/// A metric alarm as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveAlarm {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    GreaterThanOrEqualToThreshold,
    LessThanOrEqualToThreshold,
}

impl ComparisonOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::GreaterThanOrEqualToThreshold => "GreaterThanOrEqualToThreshold",
            ComparisonOperator::LessThanOrEqualToThreshold => "LessThanOrEqualToThreshold",
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to create one metric alarm.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmRequest {
    pub name: String,
    pub description: String,
    pub namespace: String,
    pub metric_name: String,
    pub statistic: String,
    /// Seconds.
    pub period: i32,
    pub evaluation_periods: i32,
    pub threshold: f64,
    pub comparison: ComparisonOperator,
    /// `(name, value)` pairs.
    pub dimensions: Vec<(String, String)>,
    /// Policy ARNs to invoke when the alarm fires.
    pub actions: Vec<String>,
}

/// Auto-scaling registration capability.
#[async_trait]
pub trait ScalingApi: Send + Sync {
    /// The registered target for `resource_id`, if any.
    async fn describe_target(&self, resource_id: &str) -> ApiResult<Option<LiveTarget>>;

    /// Policies attached to `resource_id`, restricted to `names` when non-empty.
    async fn describe_policies(
        &self,
        resource_id: &str,
        names: &[String],
    ) -> ApiResult<Vec<LivePolicy>>;

    /// Register or update the target's capacity bounds (upsert).
    async fn register_target(&self, resource_id: &str, target: ScalableTargetSpec) -> ApiResult<()>;

    /// Create or replace a scaling policy (upsert).
    async fn put_policy(&self, resource_id: &str, name: &str, kind: &PolicyKind) -> ApiResult<()>;

    async fn delete_policy(&self, resource_id: &str, name: &str) -> ApiResult<()>;

    async fn deregister_target(&self, resource_id: &str) -> ApiResult<()>;
}

/// Metric-alarm capability.
#[async_trait]
pub trait AlarmApi: Send + Sync {
    async fn describe_alarms(&self, names: &[String]) -> ApiResult<Vec<LiveAlarm>>;

    async fn put_alarm(&self, alarm: &AlarmRequest) -> ApiResult<()>;

    async fn delete_alarms(&self, names: &[String]) -> ApiResult<()>;
}
