//! Desired policy set — JSON parsing and source resolution.
//!
//! # Resolution
//!
//! ```text
//! custom payload non-empty   → parse it, ignore the default payload
//! else default payload given → parse it
//! else                       → built-in CPU step-scaling template
//! ```
//!
//! A supplied payload that parses to an empty array also falls through
//! to the built-in template. Any parse or validation failure is fatal.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{CoreError, CoreResult, PayloadOrigin};
use crate::naming::ServiceRef;
use crate::settings::{Cooldowns, PolicyInputs};
use crate::types::*;

// ── Wire format ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawPolicy {
    policy_name: String,
    policy_type: String,
    #[serde(default)]
    metric_name: Option<String>,
    #[serde(default)]
    metric_namespace: Option<String>,
    #[serde(default)]
    scale_direction: Option<String>,
    #[serde(default)]
    adjustment_type: Option<String>,
    #[serde(default)]
    cooldown: Option<i32>,
    #[serde(default)]
    metric_aggregation_type: Option<String>,
    #[serde(default)]
    step_adjustments: Vec<RawStepAdjustment>,
    #[serde(default)]
    target_tracking_configuration: Option<RawTargetTracking>,
}

#[derive(Debug, Deserialize)]
struct RawStepAdjustment {
    #[serde(rename = "MetricIntervalLowerBound", default)]
    lower_bound: Option<f64>,
    #[serde(rename = "MetricIntervalUpperBound", default)]
    upper_bound: Option<f64>,
    #[serde(rename = "ScalingAdjustment")]
    adjustment: i32,
}

#[derive(Debug, Deserialize)]
struct RawTargetTracking {
    target_value: f64,
    #[serde(default)]
    predefined_metric_specification: Option<String>,
    #[serde(default)]
    custom_metric_specification: Option<RawCustomMetric>,
    #[serde(default)]
    scale_in_cooldown: Option<i32>,
    #[serde(default)]
    scale_out_cooldown: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct RawCustomMetric {
    namespace: String,
    metric_name: String,
    #[serde(default)]
    dimensions: BTreeMap<String, String>,
    statistic: String,
}

/// Empty strings count as omitted.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl TryFrom<RawPolicy> for PolicyDef {
    type Error = CoreError;

    fn try_from(raw: RawPolicy) -> CoreResult<Self> {
        let name = raw.policy_name;
        if name.is_empty() {
            return Err(CoreError::invalid_policy(&name, "policy_name must not be empty"));
        }

        let direction_raw = raw.scale_direction.unwrap_or_default();
        let scale_direction = ScaleDirection::parse(&direction_raw).ok_or_else(|| {
            CoreError::invalid_policy(
                &name,
                format!("scale_direction must be \"in\" or \"out\", got {direction_raw:?}"),
            )
        })?;

        let kind = match raw.policy_type.as_str() {
            "StepScaling" => {
                if raw.step_adjustments.is_empty() {
                    return Err(CoreError::invalid_policy(
                        &name,
                        "StepScaling requires at least one step adjustment",
                    ));
                }
                PolicyKind::StepScaling(StepScalingConfig {
                    adjustment_type: non_empty(raw.adjustment_type),
                    cooldown: raw.cooldown,
                    metric_aggregation_type: non_empty(raw.metric_aggregation_type),
                    step_adjustments: raw
                        .step_adjustments
                        .into_iter()
                        .map(|adj| StepAdjustment {
                            lower_bound: adj.lower_bound,
                            upper_bound: adj.upper_bound,
                            adjustment: adj.adjustment,
                        })
                        .collect(),
                })
            }
            "TargetTrackingScaling" => {
                let tt = raw.target_tracking_configuration.ok_or_else(|| {
                    CoreError::invalid_policy(
                        &name,
                        "TargetTrackingScaling requires target_tracking_configuration",
                    )
                })?;
                let predefined = non_empty(tt.predefined_metric_specification);
                let metric = match (predefined, tt.custom_metric_specification) {
                    (Some(predefined), None) => MetricSource::Predefined(predefined),
                    (None, Some(custom)) => MetricSource::Custom(CustomMetricSpec {
                        namespace: custom.namespace,
                        metric_name: custom.metric_name,
                        dimensions: custom.dimensions,
                        statistic: custom.statistic,
                    }),
                    (Some(_), Some(_)) => {
                        return Err(CoreError::invalid_policy(
                            &name,
                            "set either predefined_metric_specification or custom_metric_specification, not both",
                        ));
                    }
                    (None, None) => {
                        return Err(CoreError::invalid_policy(
                            &name,
                            "target tracking needs predefined_metric_specification or custom_metric_specification",
                        ));
                    }
                };
                PolicyKind::TargetTrackingScaling(TargetTrackingConfig {
                    target_value: tt.target_value,
                    metric: Some(metric),
                    scale_in_cooldown: tt.scale_in_cooldown,
                    scale_out_cooldown: tt.scale_out_cooldown,
                })
            }
            other => {
                return Err(CoreError::UnknownPolicyType {
                    policy: name,
                    policy_type: other.to_string(),
                });
            }
        };

        let alarm_metric = match (non_empty(raw.metric_name), non_empty(raw.metric_namespace)) {
            (Some(metric_name), Some(namespace)) => Some(AlarmMetric {
                metric_name,
                namespace,
            }),
            _ => None,
        };

        Ok(PolicyDef {
            name,
            kind,
            alarm_metric,
            scale_direction,
        })
    }
}

/// Parse a JSON array of policies.
pub fn parse_policies(payload: &str, origin: PayloadOrigin) -> CoreResult<Vec<PolicyDef>> {
    let raw: Vec<RawPolicy> = serde_json::from_str(payload)
        .map_err(|source| CoreError::PolicyJson { origin, source })?;
    let policies = raw
        .into_iter()
        .map(PolicyDef::try_from)
        .collect::<CoreResult<Vec<_>>>()?;
    debug!(%origin, count = policies.len(), "parsed scaling policies");
    Ok(policies)
}

impl PolicyInputs {
    /// Parse whichever payload wins. `None` when neither was supplied.
    pub fn declared(&self) -> CoreResult<Option<(PayloadOrigin, Vec<PolicyDef>)>> {
        let (origin, payload) = if !self.custom_policies.trim().is_empty() {
            (PayloadOrigin::Custom, &self.custom_policies)
        } else if !self.default_policies.trim().is_empty() {
            (PayloadOrigin::Defaults, &self.default_policies)
        } else {
            return Ok(None);
        };
        info!(%origin, "parsing scaling policies");
        let policies = parse_policies(payload, origin)?;
        Ok(Some((origin, policies)))
    }

    /// Declared policies, or an empty list when none were supplied.
    pub fn declared_or_empty(&self) -> CoreResult<Vec<PolicyDef>> {
        Ok(self
            .declared()?
            .map(|(_, policies)| policies)
            .unwrap_or_default())
    }
}

// ── Resolution ────────────────────────────────────────────────────

/// Where the effective policy set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicySource {
    Custom,
    Defaults,
    /// No payload supplied (or an empty one): built-in CPU template plus
    /// the four fixed CPU/memory alarms.
    BuiltIn,
}

/// The effective policy set for an enable run.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredPolicies {
    pub source: PolicySource,
    pub policies: Vec<PolicyDef>,
}

impl DesiredPolicies {
    pub fn resolve(
        inputs: &PolicyInputs,
        service: &ServiceRef,
        cooldowns: Cooldowns,
    ) -> CoreResult<Self> {
        match inputs.declared()? {
            Some((origin, policies)) if !policies.is_empty() => Ok(Self {
                source: match origin {
                    PayloadOrigin::Custom => PolicySource::Custom,
                    PayloadOrigin::Defaults => PolicySource::Defaults,
                },
                policies,
            }),
            _ => Ok(Self {
                source: PolicySource::BuiltIn,
                policies: built_in_policies(service, cooldowns),
            }),
        }
    }

    pub fn is_built_in(&self) -> bool {
        self.source == PolicySource::BuiltIn
    }
}

/// The built-in pair of CPU step-scaling policies.
pub fn built_in_policies(service: &ServiceRef, cooldowns: Cooldowns) -> Vec<PolicyDef> {
    let step = |adjustment: i32, cooldown: i32| {
        PolicyKind::StepScaling(StepScalingConfig {
            adjustment_type: Some("ChangeInCapacity".to_string()),
            cooldown: Some(cooldown),
            metric_aggregation_type: Some("Maximum".to_string()),
            step_adjustments: vec![StepAdjustment {
                lower_bound: Some(0.0),
                upper_bound: None,
                adjustment,
            }],
        })
    };

    vec![
        PolicyDef {
            name: service.scale_out_policy_name(),
            kind: step(1, cooldowns.scale_out),
            alarm_metric: None,
            scale_direction: ScaleDirection::Out,
        },
        PolicyDef {
            name: service.scale_in_policy_name(),
            kind: step(-1, cooldowns.scale_in),
            alarm_metric: None,
            scale_direction: ScaleDirection::In,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cooldowns() -> Cooldowns {
        Cooldowns {
            scale_out: 300,
            scale_in: 300,
        }
    }

    fn svc() -> ServiceRef {
        ServiceRef::new("cluster", "svc")
    }

    #[test]
    fn parse_step_scaling_policy() {
        let json = r#"[{
            "policy_name": "cpu-up",
            "policy_type": "StepScaling",
            "adjustment_type": "ChangeInCapacity",
            "cooldown": 120,
            "metric_aggregation_type": "Maximum",
            "step_adjustments": [
                {"MetricIntervalLowerBound": 0, "MetricIntervalUpperBound": 10, "ScalingAdjustment": 1},
                {"MetricIntervalLowerBound": 10, "ScalingAdjustment": 3}
            ]
        }]"#;

        let policies = parse_policies(json, PayloadOrigin::Custom).unwrap();
        assert_eq!(policies.len(), 1);
        let p = &policies[0];
        assert_eq!(p.name, "cpu-up");
        assert_eq!(p.alarm_metric, None);
        assert_eq!(p.scale_direction, ScaleDirection::Unspecified);

        let cfg = p.step_config().unwrap();
        assert_eq!(cfg.adjustment_type.as_deref(), Some("ChangeInCapacity"));
        assert_eq!(cfg.cooldown, Some(120));
        assert_eq!(cfg.step_adjustments.len(), 2);
        assert_eq!(cfg.step_adjustments[0].upper_bound, Some(10.0));
        assert_eq!(cfg.step_adjustments[1].upper_bound, None);
        assert_eq!(cfg.step_adjustments[1].adjustment, 3);
    }

    #[test]
    fn parse_step_policy_with_alarm_metric_and_direction() {
        let json = r#"[{"policy_name":"p1","policy_type":"StepScaling",
            "metric_name":"CPUUtilization","metric_namespace":"AWS/ECS",
            "scale_direction":"in","step_adjustments":[{"ScalingAdjustment":-1}]}]"#;

        let p = &parse_policies(json, PayloadOrigin::Custom).unwrap()[0];
        assert_eq!(p.scale_direction, ScaleDirection::In);
        assert_eq!(
            p.alarm_metric,
            Some(AlarmMetric {
                metric_name: "CPUUtilization".into(),
                namespace: "AWS/ECS".into()
            })
        );
        let cfg = p.step_config().unwrap();
        assert_eq!(cfg.cooldown, None);
        assert_eq!(cfg.adjustment_type, None);
    }

    #[test]
    fn alarm_metric_needs_both_fields() {
        let json = r#"[{"policy_name":"p1","policy_type":"StepScaling",
            "metric_name":"CPUUtilization","metric_namespace":"",
            "step_adjustments":[{"ScalingAdjustment":1}]}]"#;
        let p = &parse_policies(json, PayloadOrigin::Custom).unwrap()[0];
        assert_eq!(p.alarm_metric, None);
    }

    #[test]
    fn parse_target_tracking_predefined() {
        let json = r#"[{"policy_name":"tt","policy_type":"TargetTrackingScaling",
            "target_tracking_configuration":{"target_value":75.0,
            "predefined_metric_specification":"ECSServiceAverageCPUUtilization",
            "scale_in_cooldown":200,"scale_out_cooldown":100}}]"#;

        let p = &parse_policies(json, PayloadOrigin::Defaults).unwrap()[0];
        match &p.kind {
            PolicyKind::TargetTrackingScaling(tt) => {
                assert_eq!(tt.target_value, 75.0);
                assert_eq!(
                    tt.metric,
                    Some(MetricSource::Predefined("ECSServiceAverageCPUUtilization".into()))
                );
                assert_eq!(tt.scale_in_cooldown, Some(200));
                assert_eq!(tt.scale_out_cooldown, Some(100));
            }
            other => panic!("expected target tracking, got {other:?}"),
        }
    }

    #[test]
    fn parse_target_tracking_custom_metric() {
        let json = r#"[{"policy_name":"tt","policy_type":"TargetTrackingScaling",
            "target_tracking_configuration":{"target_value":50,
            "custom_metric_specification":{"namespace":"App","metric_name":"QueueDepth",
            "dimensions":{"Queue":"jobs","Env":"prod"},"statistic":"Average"}}}]"#;

        let p = &parse_policies(json, PayloadOrigin::Custom).unwrap()[0];
        let PolicyKind::TargetTrackingScaling(tt) = &p.kind else {
            panic!("expected target tracking");
        };
        let Some(MetricSource::Custom(custom)) = &tt.metric else {
            panic!("expected custom metric");
        };
        assert_eq!(custom.metric_name, "QueueDepth");
        assert_eq!(custom.dimensions.get("Queue").map(String::as_str), Some("jobs"));
        assert_eq!(custom.dimensions.len(), 2);
        assert_eq!(tt.scale_in_cooldown, None);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = parse_policies("[{not json", PayloadOrigin::Custom).unwrap_err();
        assert!(matches!(err, CoreError::PolicyJson { origin: PayloadOrigin::Custom, .. }));
        assert!(err.to_string().contains("scaling-policies"));
    }

    #[test]
    fn unknown_policy_type_is_rejected_at_parse() {
        let json = r#"[{"policy_name":"x","policy_type":"Predictive"}]"#;
        let err = parse_policies(json, PayloadOrigin::Custom).unwrap_err();
        assert!(matches!(err, CoreError::UnknownPolicyType { ref policy_type, .. } if policy_type == "Predictive"));
    }

    #[test]
    fn step_policy_without_adjustments_is_rejected() {
        let json = r#"[{"policy_name":"x","policy_type":"StepScaling"}]"#;
        assert!(matches!(
            parse_policies(json, PayloadOrigin::Custom),
            Err(CoreError::InvalidPolicy { .. })
        ));
    }

    #[test]
    fn missing_scaling_adjustment_is_rejected() {
        let json = r#"[{"policy_name":"x","policy_type":"StepScaling",
            "step_adjustments":[{"MetricIntervalLowerBound":0}]}]"#;
        assert!(matches!(
            parse_policies(json, PayloadOrigin::Custom),
            Err(CoreError::PolicyJson { .. })
        ));
    }

    #[test]
    fn target_tracking_metric_source_must_be_exclusive() {
        let both = r#"[{"policy_name":"tt","policy_type":"TargetTrackingScaling",
            "target_tracking_configuration":{"target_value":50,
            "predefined_metric_specification":"ECSServiceAverageCPUUtilization",
            "custom_metric_specification":{"namespace":"A","metric_name":"B","statistic":"Average"}}}]"#;
        let neither = r#"[{"policy_name":"tt","policy_type":"TargetTrackingScaling",
            "target_tracking_configuration":{"target_value":50}}]"#;
        let missing = r#"[{"policy_name":"tt","policy_type":"TargetTrackingScaling"}]"#;

        for json in [both, neither, missing] {
            assert!(
                matches!(parse_policies(json, PayloadOrigin::Custom), Err(CoreError::InvalidPolicy { .. })),
                "{json}"
            );
        }
    }

    #[test]
    fn invalid_scale_direction_is_rejected() {
        let json = r#"[{"policy_name":"x","policy_type":"StepScaling","scale_direction":"up",
            "step_adjustments":[{"ScalingAdjustment":1}]}]"#;
        assert!(matches!(
            parse_policies(json, PayloadOrigin::Custom),
            Err(CoreError::InvalidPolicy { .. })
        ));
    }

    #[test]
    fn custom_payload_wins_over_defaults() {
        let inputs = PolicyInputs {
            default_policies: r#"[{"policy_name":"from-defaults","policy_type":"StepScaling",
                "step_adjustments":[{"ScalingAdjustment":1}]}]"#
                .into(),
            custom_policies: r#"[{"policy_name":"from-custom","policy_type":"StepScaling",
                "step_adjustments":[{"ScalingAdjustment":1}]}]"#
                .into(),
        };

        let desired = DesiredPolicies::resolve(&inputs, &svc(), cooldowns()).unwrap();
        assert_eq!(desired.source, PolicySource::Custom);
        let names: Vec<_> = desired.policies.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["from-custom"]);
    }

    #[test]
    fn custom_payload_wins_even_if_defaults_are_malformed() {
        let inputs = PolicyInputs {
            default_policies: "{broken".into(),
            custom_policies: r#"[{"policy_name":"c","policy_type":"StepScaling",
                "step_adjustments":[{"ScalingAdjustment":1}]}]"#
                .into(),
        };
        assert!(DesiredPolicies::resolve(&inputs, &svc(), cooldowns()).is_ok());
    }

    #[test]
    fn default_payload_used_when_custom_empty() {
        let inputs = PolicyInputs {
            default_policies: r#"[{"policy_name":"d","policy_type":"StepScaling",
                "step_adjustments":[{"ScalingAdjustment":1}]}]"#
                .into(),
            custom_policies: "  ".into(),
        };
        let desired = DesiredPolicies::resolve(&inputs, &svc(), cooldowns()).unwrap();
        assert_eq!(desired.source, PolicySource::Defaults);
        assert_eq!(desired.policies[0].name, "d");
    }

    #[test]
    fn no_payload_falls_back_to_built_in_template() {
        let desired =
            DesiredPolicies::resolve(&PolicyInputs::default(), &svc(), Cooldowns {
                scale_out: 120,
                scale_in: 600,
            })
            .unwrap();

        assert!(desired.is_built_in());
        assert_eq!(desired.policies.len(), 2);

        let out = &desired.policies[0];
        assert_eq!(out.name, "cluster-svc-scale-out");
        let out_cfg = out.step_config().unwrap();
        assert_eq!(out_cfg.cooldown, Some(120));
        assert_eq!(out_cfg.step_adjustments[0].adjustment, 1);
        assert_eq!(out_cfg.step_adjustments[0].lower_bound, Some(0.0));
        assert_eq!(out_cfg.metric_aggregation_type.as_deref(), Some("Maximum"));

        let inn = &desired.policies[1];
        assert_eq!(inn.name, "cluster-svc-scale-in");
        let in_cfg = inn.step_config().unwrap();
        assert_eq!(in_cfg.cooldown, Some(600));
        assert_eq!(in_cfg.step_adjustments[0].adjustment, -1);
    }

    #[test]
    fn empty_array_falls_back_to_built_in_template() {
        let inputs = PolicyInputs {
            default_policies: String::new(),
            custom_policies: "[]".into(),
        };
        let desired = DesiredPolicies::resolve(&inputs, &svc(), cooldowns()).unwrap();
        assert!(desired.is_built_in());
    }

    #[test]
    fn malformed_payload_fails_resolution() {
        let inputs = PolicyInputs {
            default_policies: String::new(),
            custom_policies: "not json".into(),
        };
        assert!(DesiredPolicies::resolve(&inputs, &svc(), cooldowns()).is_err());
    }

    #[test]
    fn declared_or_empty_without_payloads() {
        assert!(PolicyInputs::default().declared_or_empty().unwrap().is_empty());
    }
}
