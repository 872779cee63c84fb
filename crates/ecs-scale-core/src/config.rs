//! ecs-scale.toml configuration parser.
//!
//! The file is optional. It overrides the built-in fallbacks used for
//! empty positional arguments and selects the log output format.
//!
//! ```toml
//! [defaults]
//! min_capacity = 2
//! cpu_out = 70.0
//!
//! [logging]
//! format = "json"
//! filter = "info,ecs_scale=debug"
//! ```

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::settings::ScalingDefaults;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScalerConfig {
    pub defaults: Option<DefaultsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsConfig {
    pub min_capacity: Option<i32>,
    pub max_capacity: Option<i32>,
    pub scale_out_cooldown: Option<i32>,
    pub scale_in_cooldown: Option<i32>,
    pub cpu_out: Option<f64>,
    pub cpu_in: Option<f64>,
    pub memory_out: Option<f64>,
    pub memory_in: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: Option<LogFormat>,
    pub filter: Option<String>,
}

/// Log line encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other:?} (expected text or json)")),
        }
    }
}

impl ScalerConfig {
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        toml::from_str(content).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Layer the `[defaults]` table over `base`.
    pub fn scaling_defaults(&self, base: ScalingDefaults) -> ScalingDefaults {
        let Some(d) = &self.defaults else {
            return base;
        };
        ScalingDefaults {
            min_capacity: d.min_capacity.unwrap_or(base.min_capacity),
            max_capacity: d.max_capacity.unwrap_or(base.max_capacity),
            scale_out_cooldown: d.scale_out_cooldown.unwrap_or(base.scale_out_cooldown),
            scale_in_cooldown: d.scale_in_cooldown.unwrap_or(base.scale_in_cooldown),
            cpu_out: d.cpu_out.unwrap_or(base.cpu_out),
            cpu_in: d.cpu_in.unwrap_or(base.cpu_in),
            memory_out: d.memory_out.unwrap_or(base.memory_out),
            memory_in: d.memory_in.unwrap_or(base.memory_in),
        }
    }

    pub fn log_format(&self) -> Option<LogFormat> {
        self.logging.as_ref().and_then(|l| l.format)
    }

    pub fn log_filter(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.filter.as_deref())
    }
}
