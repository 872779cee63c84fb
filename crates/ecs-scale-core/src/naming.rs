//! Deterministic naming for generated resources.
//!
//! Every name is derived from the cluster and service so that repeated
//! runs (and the teardown flow) address exactly the same resources.
//!
//! ```text
//! resource id      service/{cluster}/{service}
//! default policy   {cluster}-{service}-scale-out | -scale-in
//! default alarm    {cluster}-{service}-cpu-high | cpu-low | mem-high | mem-low
//! policy alarm     {cluster}-{service}-{policy_name}
//! ```

use std::collections::HashSet;

use crate::types::ScaleDirection;

/// The ECS service whose scaling configuration is managed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRef {
    pub cluster: String,
    pub service: String,
}

impl ServiceRef {
    pub fn new(cluster: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            service: service.into(),
        }
    }

    /// Control-plane resource id of the service.
    pub fn resource_id(&self) -> String {
        format!("service/{}/{}", self.cluster, self.service)
    }

    /// `{cluster}-{service}-{suffix}`.
    pub fn scoped_name(&self, suffix: &str) -> String {
        format!("{}-{}-{}", self.cluster, self.service, suffix)
    }

    pub fn scale_out_policy_name(&self) -> String {
        self.scoped_name("scale-out")
    }

    pub fn scale_in_policy_name(&self) -> String {
        self.scoped_name("scale-in")
    }

    /// Built-in policy names, scale-out first.
    pub fn default_policy_names(&self) -> [String; 2] {
        [self.scale_out_policy_name(), self.scale_in_policy_name()]
    }

    /// Built-in alarm names in [`DefaultAlarm::ALL`] order.
    pub fn default_alarm_names(&self) -> [String; 4] {
        DefaultAlarm::ALL.map(|alarm| self.scoped_name(alarm.suffix()))
    }

    /// Alarm generated for a custom policy.
    pub fn policy_alarm_name(&self, policy_name: &str) -> String {
        self.scoped_name(policy_name)
    }
}

/// The four alarms installed alongside the built-in policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultAlarm {
    CpuHigh,
    CpuLow,
    MemHigh,
    MemLow,
}

impl DefaultAlarm {
    pub const ALL: [DefaultAlarm; 4] = [
        DefaultAlarm::CpuHigh,
        DefaultAlarm::CpuLow,
        DefaultAlarm::MemHigh,
        DefaultAlarm::MemLow,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            DefaultAlarm::CpuHigh => "cpu-high",
            DefaultAlarm::CpuLow => "cpu-low",
            DefaultAlarm::MemHigh => "mem-high",
            DefaultAlarm::MemLow => "mem-low",
        }
    }

    pub fn metric_name(&self) -> &'static str {
        match self {
            DefaultAlarm::CpuHigh | DefaultAlarm::CpuLow => "CPUUtilization",
            DefaultAlarm::MemHigh | DefaultAlarm::MemLow => "MemoryUtilization",
        }
    }

    /// High alarms drive the scale-out policy, low alarms the scale-in one.
    pub fn direction(&self) -> ScaleDirection {
        match self {
            DefaultAlarm::CpuHigh | DefaultAlarm::MemHigh => ScaleDirection::Out,
            DefaultAlarm::CpuLow | DefaultAlarm::MemLow => ScaleDirection::In,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DefaultAlarm::CpuHigh => "Scale out on high CPU",
            DefaultAlarm::CpuLow => "Scale in on low CPU",
            DefaultAlarm::MemHigh => "Scale out on high memory",
            DefaultAlarm::MemLow => "Scale in on low memory",
        }
    }
}

/// Drop repeated names, keeping the first occurrence of each.
pub fn deduplicate<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
