//! Run settings — positional arguments resolved against fallbacks.
//!
//! Every numeric argument may be passed as an empty string, in which
//! case the fallback from [`ScalingDefaults`] applies. Anything else must
//! parse; a bad value aborts the run before any remote call.

use std::str::FromStr;

use crate::error::{CoreError, CoreResult};
use crate::naming::ServiceRef;
use crate::types::{ScalableTargetSpec, ScaleDirection};

/// Fallback values for omitted numeric arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingDefaults {
    pub min_capacity: i32,
    pub max_capacity: i32,
    pub scale_out_cooldown: i32,
    pub scale_in_cooldown: i32,
    pub cpu_out: f64,
    pub cpu_in: f64,
    pub memory_out: f64,
    pub memory_in: f64,
}

impl Default for ScalingDefaults {
    fn default() -> Self {
        Self {
            min_capacity: 1,
            max_capacity: 10,
            scale_out_cooldown: 300,
            scale_in_cooldown: 300,
            cpu_out: 75.0,
            cpu_in: 65.0,
            memory_out: 80.0,
            memory_in: 70.0,
        }
    }
}

/// Scale-out / scale-in cooldowns in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldowns {
    pub scale_out: i32,
    pub scale_in: i32,
}

impl Cooldowns {
    /// Scale-in cooldown for `In`, scale-out otherwise.
    pub fn for_direction(&self, direction: ScaleDirection) -> i32 {
        match direction {
            ScaleDirection::In => self.scale_in,
            ScaleDirection::Out | ScaleDirection::Unspecified => self.scale_out,
        }
    }
}

/// Alarm thresholds for one utilization metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtilizationThresholds {
    pub scale_out: f64,
    pub scale_in: f64,
}

impl UtilizationThresholds {
    /// Scale-in threshold for `In`, scale-out otherwise.
    pub fn for_direction(&self, direction: ScaleDirection) -> f64 {
        match direction {
            ScaleDirection::In => self.scale_in,
            ScaleDirection::Out | ScaleDirection::Unspecified => self.scale_out,
        }
    }
}

/// The two raw policy payloads, kept unparsed until a run needs them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyInputs {
    pub default_policies: String,
    pub custom_policies: String,
}

/// Positional arguments exactly as received, all as strings.
#[derive(Debug, Clone, Default)]
pub struct RawSettings {
    pub cluster: String,
    pub service: String,
    pub enabled: String,
    pub min_capacity: String,
    pub max_capacity: String,
    pub scale_out_cooldown: String,
    pub scale_in_cooldown: String,
    pub cpu_out: String,
    pub cpu_in: String,
    pub memory_out: String,
    pub memory_in: String,
    pub default_policies: String,
    pub custom_policies: String,
}

/// Fully resolved, validated parameters for one run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub service: ServiceRef,
    pub enabled: bool,
    pub target: ScalableTargetSpec,
    pub cooldowns: Cooldowns,
    pub cpu: UtilizationThresholds,
    pub memory: UtilizationThresholds,
    pub policies: PolicyInputs,
}

impl RunSettings {
    /// Resolve raw arguments against `defaults` and validate them.
    pub fn resolve(raw: &RawSettings, defaults: &ScalingDefaults) -> CoreResult<Self> {
        require_non_empty(&raw.cluster, "cluster")?;
        require_non_empty(&raw.service, "service")?;

        let min_capacity = int_with_default(&raw.min_capacity, "min-capacity", defaults.min_capacity)?;
        let max_capacity = int_with_default(&raw.max_capacity, "max-capacity", defaults.max_capacity)?;
        let scale_out_cooldown = int_with_default(
            &raw.scale_out_cooldown,
            "scale-out-cooldown",
            defaults.scale_out_cooldown,
        )?;
        let scale_in_cooldown = int_with_default(
            &raw.scale_in_cooldown,
            "scale-in-cooldown",
            defaults.scale_in_cooldown,
        )?;

        let cpu = UtilizationThresholds {
            scale_out: float_with_default(&raw.cpu_out, "target-cpu-utilization-out", defaults.cpu_out)?,
            scale_in: float_with_default(&raw.cpu_in, "target-cpu-utilization-in", defaults.cpu_in)?,
        };
        let memory = UtilizationThresholds {
            scale_out: float_with_default(
                &raw.memory_out,
                "target-memory-utilization-out",
                defaults.memory_out,
            )?,
            scale_in: float_with_default(
                &raw.memory_in,
                "target-memory-utilization-in",
                defaults.memory_in,
            )?,
        };

        require_non_negative(min_capacity, "min-capacity")?;
        require_non_negative(max_capacity, "max-capacity")?;
        require_non_negative(scale_out_cooldown, "scale-out-cooldown")?;
        require_non_negative(scale_in_cooldown, "scale-in-cooldown")?;
        if min_capacity > max_capacity {
            return Err(CoreError::InvalidArgument {
                name: "min-capacity".to_string(),
                value: min_capacity.to_string(),
                reason: format!("must not exceed max-capacity ({max_capacity})"),
            });
        }

        Ok(Self {
            service: ServiceRef::new(raw.cluster.clone(), raw.service.clone()),
            enabled: raw.enabled == "true",
            target: ScalableTargetSpec {
                min_capacity,
                max_capacity,
            },
            cooldowns: Cooldowns {
                scale_out: scale_out_cooldown,
                scale_in: scale_in_cooldown,
            },
            cpu,
            memory,
            policies: PolicyInputs {
                default_policies: raw.default_policies.clone(),
                custom_policies: raw.custom_policies.clone(),
            },
        })
    }
}

/// Parse an integer argument, falling back to `default` when empty.
pub fn int_with_default(arg: &str, name: &str, default: i32) -> CoreResult<i32> {
    parse_with_default(arg, name, default)
}

/// Parse a float argument, falling back to `default` when empty.
pub fn float_with_default(arg: &str, name: &str, default: f64) -> CoreResult<f64> {
    parse_with_default(arg, name, default)
}

fn parse_with_default<T>(arg: &str, name: &str, default: T) -> CoreResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if arg.is_empty() {
        return Ok(default);
    }
    arg.parse::<T>().map_err(|e| CoreError::InvalidArgument {
        name: name.to_string(),
        value: arg.to_string(),
        reason: e.to_string(),
    })
}

fn require_non_empty(value: &str, name: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::InvalidArgument {
            name: name.to_string(),
            value: value.to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

fn require_non_negative(value: i32, name: &str) -> CoreResult<()> {
    if value < 0 {
        return Err(CoreError::InvalidArgument {
            name: name.to_string(),
            value: value.to_string(),
            reason: "must not be negative".to_string(),
        });
    }
    Ok(())
}
