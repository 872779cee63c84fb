//! ecs-scale-core — desired-state model for ECS service auto-scaling.
//!
//! Turns the flat run parameters and the declarative policy JSON into
//! validated, strongly-typed values consumed by the reconciler:
//!
//! - **`types`** — scalable target, scaling policy, and direction types
//! - **`desired`** — policy JSON parsing and custom/default/built-in resolution
//! - **`naming`** — deterministic resource ids, policy names, and alarm names
//! - **`settings`** — run parameters with numeric fallbacks and validation
//! - **`config`** — optional TOML file overriding the built-in fallbacks

pub mod config;
pub mod desired;
pub mod error;
pub mod naming;
pub mod settings;
pub mod types;

pub use config::{LogFormat, ScalerConfig};
pub use desired::{DesiredPolicies, PolicySource, built_in_policies, parse_policies};
pub use error::{CoreError, CoreResult, PayloadOrigin};
pub use naming::{DefaultAlarm, ServiceRef, deduplicate};
pub use settings::{
    Cooldowns, PolicyInputs, RawSettings, RunSettings, ScalingDefaults, UtilizationThresholds,
    float_with_default, int_with_default,
};
pub use types::*;
