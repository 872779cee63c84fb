//! Domain types for ECS service auto-scaling.
//!
//! These types describe both the desired state parsed from the policy
//! payloads and the live state read back from the control plane, so the
//! comparators operate on a single model. Optional numeric fields stay
//! `Option`: an unset cooldown is not the same as a zero cooldown.

use std::collections::BTreeMap;

// ── Scalable target ───────────────────────────────────────────────

/// Capacity bounds registered for a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalableTargetSpec {
    pub min_capacity: i32,
    pub max_capacity: i32,
}

// ── Direction ─────────────────────────────────────────────────────

/// Which way a policy scales, used to pick alarm thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleDirection {
    In,
    Out,
    /// `scale_direction` omitted or empty.
    #[default]
    Unspecified,
}

impl ScaleDirection {
    /// Parse the wire value. Empty means unspecified; anything other
    /// than lowercase `in`/`out` is rejected, so `"IN"` or `"Out"` fails
    /// the run instead of falling back to the scale-out threshold.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "" => Some(ScaleDirection::Unspecified),
            "in" => Some(ScaleDirection::In),
            "out" => Some(ScaleDirection::Out),
            _ => None,
        }
    }

    /// Legacy rule: a policy whose name contains "in" (any case) scales in.
    pub fn infer_from_name(policy_name: &str) -> Self {
        if policy_name.to_lowercase().contains("in") {
            ScaleDirection::In
        } else {
            ScaleDirection::Out
        }
    }
}

// ── Step scaling ──────────────────────────────────────────────────

/// One metric interval → capacity change mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct StepAdjustment {
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub adjustment: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepScalingConfig {
    /// e.g. `ChangeInCapacity`, `PercentChangeInCapacity`.
    pub adjustment_type: Option<String>,
    pub cooldown: Option<i32>,
    /// e.g. `Maximum`, `Average`.
    pub metric_aggregation_type: Option<String>,
    /// Ordered; equivalence is positional.
    pub step_adjustments: Vec<StepAdjustment>,
}

// ── Target tracking ───────────────────────────────────────────────

/// A customized CloudWatch metric for target tracking.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomMetricSpec {
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: BTreeMap<String, String>,
    pub statistic: String,
}

/// Where a target-tracking policy reads its metric from.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricSource {
    /// e.g. `ECSServiceAverageCPUUtilization`.
    Predefined(String),
    Custom(CustomMetricSpec),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetTrackingConfig {
    pub target_value: f64,
    /// Always set for desired policies. A live policy may carry neither
    /// source (e.g. metric math), which never matches a desired one.
    pub metric: Option<MetricSource>,
    pub scale_in_cooldown: Option<i32>,
    pub scale_out_cooldown: Option<i32>,
}

// ── Policy ────────────────────────────────────────────────────────

/// Type-specific policy configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyKind {
    StepScaling(StepScalingConfig),
    TargetTrackingScaling(TargetTrackingConfig),
}

impl PolicyKind {
    /// The control-plane policy type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            PolicyKind::StepScaling(_) => "StepScaling",
            PolicyKind::TargetTrackingScaling(_) => "TargetTrackingScaling",
        }
    }
}

/// Metric an alarm should watch on behalf of a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmMetric {
    pub metric_name: String,
    pub namespace: String,
}

/// A named scaling rule in the desired state.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDef {
    pub name: String,
    pub kind: PolicyKind,
    /// Set only when both `metric_name` and `metric_namespace` were given.
    pub alarm_metric: Option<AlarmMetric>,
    /// Only lowercase `in` and `out` are accepted; other spellings are a
    /// parse error rather than a silent scale-out.
    pub scale_direction: ScaleDirection,
}

impl PolicyDef {
    /// The step-scaling configuration, if this is a step policy.
    pub fn step_config(&self) -> Option<&StepScalingConfig> {
        match &self.kind {
            PolicyKind::StepScaling(cfg) => Some(cfg),
            PolicyKind::TargetTrackingScaling(_) => None,
        }
    }
}
