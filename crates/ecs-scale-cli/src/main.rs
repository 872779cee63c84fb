//! ecs-scale — converge an ECS service's auto-scaling configuration.
//!
//! Takes a fixed list of positional arguments (as passed by CI actions),
//! registers or removes the scalable target, its scaling policies, and
//! their CloudWatch alarms, then exits 0 on success.
//!
//! # Usage
//!
//! ```text
//! ecs-scale KEY_ID KEY_SECRET REGION CLUSTER SERVICE ENABLED \
//!     [MIN] [MAX] [OUT_COOLDOWN] [IN_COOLDOWN] \
//!     [CPU_OUT] [CPU_IN] [MEM_OUT] [MEM_IN] \
//!     [DEFAULT_POLICIES_JSON] [SCALING_POLICIES_JSON]
//! ```
//!
//! Empty numeric arguments fall back to the `[defaults]` table of the
//! optional config file, then to the built-in defaults.

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ecs_scale_aws::{AwsAlarmApi, AwsScalingApi, StaticCredentials};
use ecs_scale_core::{LogFormat, RawSettings, RunSettings, ScalerConfig, ScalingDefaults};
use ecs_scale_reconcile::Reconciler;

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser, Debug)]
#[command(
    name = "ecs-scale",
    about = "Enable or disable auto-scaling for an ECS service",
    version
)]
struct Cli {
    /// AWS access key id (empty: default credential chain).
    access_key_id: String,
    /// AWS secret access key (empty: default credential chain).
    secret_access_key: String,
    /// AWS region (empty: default region chain).
    region: String,
    /// ECS cluster name.
    cluster: String,
    /// ECS service name.
    service: String,
    /// "true" to enable auto-scaling; anything else tears it down.
    enabled: String,

    #[arg(default_value = "")]
    min_capacity: String,
    #[arg(default_value = "")]
    max_capacity: String,
    /// Seconds.
    #[arg(default_value = "")]
    scale_out_cooldown: String,
    /// Seconds.
    #[arg(default_value = "")]
    scale_in_cooldown: String,
    /// Percent.
    #[arg(default_value = "")]
    cpu_out: String,
    /// Percent.
    #[arg(default_value = "")]
    cpu_in: String,
    /// Percent.
    #[arg(default_value = "")]
    memory_out: String,
    /// Percent.
    #[arg(default_value = "")]
    memory_in: String,
    /// JSON array of policies used when no scaling policies are given.
    #[arg(default_value = "")]
    default_policies: String,
    /// JSON array of policies; overrides the default policies entirely.
    #[arg(default_value = "")]
    scaling_policies: String,

    /// Optional TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format: text or json.
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn raw_settings(&self) -> RawSettings {
        RawSettings {
            cluster: self.cluster.clone(),
            service: self.service.clone(),
            enabled: self.enabled.clone(),
            min_capacity: self.min_capacity.clone(),
            max_capacity: self.max_capacity.clone(),
            scale_out_cooldown: self.scale_out_cooldown.clone(),
            scale_in_cooldown: self.scale_in_cooldown.clone(),
            cpu_out: self.cpu_out.clone(),
            cpu_in: self.cpu_in.clone(),
            memory_out: self.memory_out.clone(),
            memory_in: self.memory_in.clone(),
            default_policies: self.default_policies.clone(),
            custom_policies: self.scaling_policies.clone(),
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ScalerConfig> {
    match path {
        Some(path) => Ok(ScalerConfig::from_file(path)?),
        None => Ok(ScalerConfig::default()),
    }
}

/// `RUST_LOG` wins over the config file's filter.
fn init_tracing(format: LogFormat, filter: Option<&str>) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter.unwrap_or(DEFAULT_LOG_FILTER))?,
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let log_format = cli.log_format.or(config.log_format()).unwrap_or_default();
    init_tracing(log_format, config.log_filter())?;

    let defaults = config.scaling_defaults(ScalingDefaults::default());
    let settings = RunSettings::resolve(&cli.raw_settings(), &defaults).inspect_err(|e| {
        error!(error = %e, "invalid arguments");
    })?;

    let credentials = StaticCredentials::from_pair(&cli.access_key_id, &cli.secret_access_key);
    let sdk_config = ecs_scale_aws::load_sdk_config(&cli.region, credentials).await;

    let reconciler = Reconciler::new(
        AwsScalingApi::new(&sdk_config),
        AwsAlarmApi::new(&sdk_config),
        settings,
    );
    let report = reconciler.run().await?;
    for action in &report.actions {
        info!(%action, "applied");
    }
    Ok(())
}
