//! State comparators.
//!
//! Each async comparator performs exactly one read and answers a yes/no
//! question about live state. A failed read is returned as an error,
//! never interpreted as "absent".
//!
//! Equivalence rules are strict: no numeric tolerance, optional fields
//! are equal only when both are unset or both hold the same value, and
//! step adjustments are compared positionally.

use ecs_scale_core::{
    CustomMetricSpec, MetricSource, PolicyKind, ScalableTargetSpec, StepAdjustment,
    StepScalingConfig, TargetTrackingConfig,
};

use crate::api::{AlarmApi, ApiResult, LivePolicy, ScalingApi};

/// True iff a target is registered with exactly the desired bounds.
pub async fn target_matches<S>(
    api: &S,
    resource_id: &str,
    desired: ScalableTargetSpec,
) -> ApiResult<bool>
where
    S: ScalingApi + ?Sized,
{
    Ok(api
        .describe_target(resource_id)
        .await?
        .is_some_and(|live| {
            live.min_capacity == desired.min_capacity && live.max_capacity == desired.max_capacity
        }))
}

/// True iff any target is registered, whatever its bounds.
pub async fn target_exists<S>(api: &S, resource_id: &str) -> ApiResult<bool>
where
    S: ScalingApi + ?Sized,
{
    Ok(api.describe_target(resource_id).await?.is_some())
}

/// The live policy named `name`, if any.
pub async fn find_policy<S>(api: &S, resource_id: &str, name: &str) -> ApiResult<Option<LivePolicy>>
where
    S: ScalingApi + ?Sized,
{
    let policies = api
        .describe_policies(resource_id, &[name.to_string()])
        .await?;
    Ok(policies.into_iter().find(|p| p.name == name))
}

/// True iff a policy named `name` exists, ignoring its configuration.
pub async fn policy_exists<S>(api: &S, resource_id: &str, name: &str) -> ApiResult<bool>
where
    S: ScalingApi + ?Sized,
{
    Ok(find_policy(api, resource_id, name).await?.is_some())
}

/// True iff `name` exists and its live configuration is equivalent to `desired`.
pub async fn policy_matches<S>(
    api: &S,
    resource_id: &str,
    name: &str,
    desired: &PolicyKind,
) -> ApiResult<bool>
where
    S: ScalingApi + ?Sized,
{
    Ok(find_policy(api, resource_id, name)
        .await?
        .and_then(|live| live.kind)
        .is_some_and(|live| policy_equivalent(&live, desired)))
}

/// True iff an alarm named `name` exists.
pub async fn alarm_exists<A>(api: &A, name: &str) -> ApiResult<bool>
where
    A: AlarmApi + ?Sized,
{
    let alarms = api.describe_alarms(&[name.to_string()]).await?;
    Ok(alarms.iter().any(|a| a.name == name))
}

/// Structural equivalence of a live and a desired policy configuration.
pub fn policy_equivalent(live: &PolicyKind, desired: &PolicyKind) -> bool {
    match (live, desired) {
        (PolicyKind::StepScaling(live), PolicyKind::StepScaling(desired)) => {
            step_equivalent(live, desired)
        }
        (PolicyKind::TargetTrackingScaling(live), PolicyKind::TargetTrackingScaling(desired)) => {
            target_tracking_equivalent(live, desired)
        }
        _ => false,
    }
}

fn step_equivalent(live: &StepScalingConfig, desired: &StepScalingConfig) -> bool {
    live.adjustment_type == desired.adjustment_type
        && live.metric_aggregation_type == desired.metric_aggregation_type
        && live.cooldown == desired.cooldown
        && live.step_adjustments.len() == desired.step_adjustments.len()
        && live
            .step_adjustments
            .iter()
            .zip(&desired.step_adjustments)
            .all(|(l, d)| step_adjustment_equivalent(l, d))
}

fn step_adjustment_equivalent(live: &StepAdjustment, desired: &StepAdjustment) -> bool {
    live.lower_bound == desired.lower_bound
        && live.upper_bound == desired.upper_bound
        && live.adjustment == desired.adjustment
}

fn target_tracking_equivalent(live: &TargetTrackingConfig, desired: &TargetTrackingConfig) -> bool {
    if live.target_value != desired.target_value
        || live.scale_in_cooldown != desired.scale_in_cooldown
        || live.scale_out_cooldown != desired.scale_out_cooldown
    {
        return false;
    }
    match (&live.metric, &desired.metric) {
        (None, None) => true,
        (Some(MetricSource::Predefined(l)), Some(MetricSource::Predefined(d))) => l == d,
        (Some(MetricSource::Custom(l)), Some(MetricSource::Custom(d))) => {
            custom_metric_equivalent(l, d)
        }
        _ => false,
    }
}

/// Dimensions match when every desired key is live with the same value.
/// Extra live dimensions are ignored.
fn custom_metric_equivalent(live: &CustomMetricSpec, desired: &CustomMetricSpec) -> bool {
    live.metric_name == desired.metric_name
        && live.namespace == desired.namespace
        && live.statistic == desired.statistic
        && desired
            .dimensions
            .iter()
            .all(|(key, value)| live.dimensions.get(key) == Some(value))
}
