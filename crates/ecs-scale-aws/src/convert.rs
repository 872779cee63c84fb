//! Translation between the domain model and SDK shapes.
//!
//! Live policies are read into the same [`PolicyKind`] used for desired
//! state. Optional SDK fields map to `None`, never to a zero default.

use std::collections::BTreeMap;

use aws_sdk_applicationautoscaling::error::BuildError;
use aws_sdk_applicationautoscaling::types::{
    AdjustmentType, CustomizedMetricSpecification, MetricAggregationType, MetricDimension,
    MetricStatistic, MetricType, PolicyType, PredefinedMetricSpecification, ScalingPolicy,
    StepAdjustment as SdkStepAdjustment, StepScalingPolicyConfiguration,
    TargetTrackingScalingPolicyConfiguration,
};
use aws_sdk_cloudwatch::types::Dimension;

use ecs_scale_core::{
    CustomMetricSpec, MetricSource, PolicyKind, StepAdjustment, StepScalingConfig,
    TargetTrackingConfig,
};

// ── Live → model ──────────────────────────────────────────────────

/// The managed configuration of a live policy, or `None` for other types.
pub fn live_policy_kind(policy: &ScalingPolicy) -> Option<PolicyKind> {
    match policy.policy_type() {
        PolicyType::StepScaling => Some(PolicyKind::StepScaling(
            policy
                .step_scaling_policy_configuration()
                .map(step_from_sdk)
                .unwrap_or_else(empty_step),
        )),
        PolicyType::TargetTrackingScaling => policy
            .target_tracking_scaling_policy_configuration()
            .map(|cfg| PolicyKind::TargetTrackingScaling(target_tracking_from_sdk(cfg))),
        _ => None,
    }
}

fn empty_step() -> StepScalingConfig {
    StepScalingConfig {
        adjustment_type: None,
        cooldown: None,
        metric_aggregation_type: None,
        step_adjustments: Vec::new(),
    }
}

pub fn step_from_sdk(cfg: &StepScalingPolicyConfiguration) -> StepScalingConfig {
    StepScalingConfig {
        adjustment_type: cfg.adjustment_type().map(|t| t.as_str().to_string()),
        cooldown: cfg.cooldown(),
        metric_aggregation_type: cfg
            .metric_aggregation_type()
            .map(|t| t.as_str().to_string()),
        step_adjustments: cfg
            .step_adjustments()
            .iter()
            .map(|adj| StepAdjustment {
                lower_bound: adj.metric_interval_lower_bound(),
                upper_bound: adj.metric_interval_upper_bound(),
                adjustment: adj.scaling_adjustment(),
            })
            .collect(),
    }
}

pub fn target_tracking_from_sdk(cfg: &TargetTrackingScalingPolicyConfiguration) -> TargetTrackingConfig {
    let metric = match (
        cfg.predefined_metric_specification(),
        cfg.customized_metric_specification(),
    ) {
        (Some(predefined), _) => Some(MetricSource::Predefined(
            predefined.predefined_metric_type().as_str().to_string(),
        )),
        (None, Some(custom)) => Some(MetricSource::Custom(CustomMetricSpec {
            namespace: custom.namespace().unwrap_or_default().to_string(),
            metric_name: custom.metric_name().unwrap_or_default().to_string(),
            dimensions: custom
                .dimensions()
                .iter()
                .map(|d| (d.name().to_string(), d.value().to_string()))
                .collect::<BTreeMap<_, _>>(),
            statistic: custom
                .statistic()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
        })),
        (None, None) => None,
    };
    TargetTrackingConfig {
        target_value: cfg.target_value(),
        metric,
        scale_in_cooldown: cfg.scale_in_cooldown(),
        scale_out_cooldown: cfg.scale_out_cooldown(),
    }
}

// ── Model → request ───────────────────────────────────────────────

pub fn step_to_sdk(cfg: &StepScalingConfig) -> Result<StepScalingPolicyConfiguration, BuildError> {
    let adjustments = cfg
        .step_adjustments
        .iter()
        .map(|adj| {
            SdkStepAdjustment::builder()
                .set_metric_interval_lower_bound(adj.lower_bound)
                .set_metric_interval_upper_bound(adj.upper_bound)
                .scaling_adjustment(adj.adjustment)
                .build()
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(StepScalingPolicyConfiguration::builder()
        .set_adjustment_type(cfg.adjustment_type.as_deref().map(AdjustmentType::from))
        .set_cooldown(cfg.cooldown)
        .set_metric_aggregation_type(
            cfg.metric_aggregation_type
                .as_deref()
                .map(MetricAggregationType::from),
        )
        .set_step_adjustments(Some(adjustments))
        .build())
}

pub fn target_tracking_to_sdk(
    cfg: &TargetTrackingConfig,
) -> Result<TargetTrackingScalingPolicyConfiguration, BuildError> {
    let mut builder = TargetTrackingScalingPolicyConfiguration::builder()
        .target_value(cfg.target_value)
        .set_scale_in_cooldown(cfg.scale_in_cooldown)
        .set_scale_out_cooldown(cfg.scale_out_cooldown);

    match &cfg.metric {
        Some(MetricSource::Predefined(metric_type)) => {
            builder = builder.predefined_metric_specification(
                PredefinedMetricSpecification::builder()
                    .predefined_metric_type(MetricType::from(metric_type.as_str()))
                    .build()?,
            );
        }
        Some(MetricSource::Custom(custom)) => {
            let dimensions = custom
                .dimensions
                .iter()
                .map(|(name, value)| MetricDimension::builder().name(name).value(value).build())
                .collect::<Result<Vec<_>, _>>()?;
            builder = builder.customized_metric_specification(
                CustomizedMetricSpecification::builder()
                    .namespace(&custom.namespace)
                    .metric_name(&custom.metric_name)
                    .statistic(MetricStatistic::from(custom.statistic.as_str()))
                    .set_dimensions(Some(dimensions))
                    .build(),
            );
        }
        None => {}
    }

    builder.build()
}

/// CloudWatch dimensions from `(name, value)` pairs.
pub fn alarm_dimensions(pairs: &[(String, String)]) -> Vec<Dimension> {
    pairs
        .iter()
        .map(|(name, value)| Dimension::builder().name(name).value(value).build())
        .collect()
}
