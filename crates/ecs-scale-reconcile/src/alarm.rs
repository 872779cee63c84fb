//! Alarm request builders.
//!
//! Alarms are created once and never updated, so these builders are only
//! consulted when the named alarm is absent.

use ecs_scale_core::{AlarmMetric, DefaultAlarm, RunSettings, ScaleDirection, ServiceRef, StepScalingConfig};

use crate::api::{AlarmRequest, ComparisonOperator};

pub const ALARM_STATISTIC: &str = "Average";
pub const ALARM_EVALUATION_PERIODS: i32 = 2;
pub const ECS_NAMESPACE: &str = "AWS/ECS";

/// `≤` for scale-in, `≥` otherwise.
pub fn comparison_for(direction: ScaleDirection) -> ComparisonOperator {
    match direction {
        ScaleDirection::In => ComparisonOperator::LessThanOrEqualToThreshold,
        ScaleDirection::Out | ScaleDirection::Unspecified => {
            ComparisonOperator::GreaterThanOrEqualToThreshold
        }
    }
}

fn service_dimensions(service: &ServiceRef) -> Vec<(String, String)> {
    vec![
        ("ClusterName".to_string(), service.cluster.clone()),
        ("ServiceName".to_string(), service.service.clone()),
    ]
}

/// Alarm for a custom step-scaling policy that names a metric.
///
/// Thresholds come from the CPU settings whatever the metric. The period
/// is the policy cooldown, or the run cooldown for `direction` when the
/// policy sets none.
pub fn policy_alarm(
    settings: &RunSettings,
    policy_name: &str,
    metric: &AlarmMetric,
    step: &StepScalingConfig,
    direction: ScaleDirection,
    policy_arn: &str,
) -> AlarmRequest {
    let service = &settings.service;
    AlarmRequest {
        name: service.policy_alarm_name(policy_name),
        description: format!("Scale based on {}", metric.metric_name),
        namespace: metric.namespace.clone(),
        metric_name: metric.metric_name.clone(),
        statistic: ALARM_STATISTIC.to_string(),
        period: step
            .cooldown
            .unwrap_or_else(|| settings.cooldowns.for_direction(direction)),
        evaluation_periods: ALARM_EVALUATION_PERIODS,
        threshold: settings.cpu.for_direction(direction),
        comparison: comparison_for(direction),
        dimensions: service_dimensions(service),
        actions: vec![policy_arn.to_string()],
    }
}

/// One of the four fixed CPU/memory alarms for the built-in policies.
pub fn default_alarm(settings: &RunSettings, alarm: DefaultAlarm, policy_arn: &str) -> AlarmRequest {
    let service = &settings.service;
    let direction = alarm.direction();
    let thresholds = match alarm {
        DefaultAlarm::CpuHigh | DefaultAlarm::CpuLow => settings.cpu,
        DefaultAlarm::MemHigh | DefaultAlarm::MemLow => settings.memory,
    };
    AlarmRequest {
        name: service.scoped_name(alarm.suffix()),
        description: alarm.description().to_string(),
        namespace: ECS_NAMESPACE.to_string(),
        metric_name: alarm.metric_name().to_string(),
        statistic: ALARM_STATISTIC.to_string(),
        period: settings.cooldowns.for_direction(direction),
        evaluation_periods: ALARM_EVALUATION_PERIODS,
        threshold: thresholds.for_direction(direction),
        comparison: comparison_for(direction),
        dimensions: service_dimensions(service),
        actions: vec![policy_arn.to_string()],
    }
}
