//! ecs-scale-aws — AWS implementations of the reconciler's capabilities.
//!
//! [`AwsScalingApi`] wraps the Application Auto Scaling client and
//! [`AwsAlarmApi`] the CloudWatch client. Both are thin: every trait
//! method is exactly one SDK call (plus pagination), and SDK errors are
//! flattened into [`ecs_scale_reconcile::ApiError`].

pub mod alarms;
pub mod convert;
pub mod scaling;

pub use alarms::AwsAlarmApi;
pub use scaling::AwsScalingApi;

use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_applicationautoscaling::config::{Credentials, Region};
use tracing::debug;

/// Access key pair passed on the command line.
#[derive(Clone)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl StaticCredentials {
    /// `Some` only when both halves are non-empty.
    pub fn from_pair(access_key_id: &str, secret_access_key: &str) -> Option<Self> {
        if access_key_id.is_empty() || secret_access_key.is_empty() {
            return None;
        }
        Some(Self {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
        })
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Shared SDK configuration for both clients.
///
/// An empty `region` leaves region resolution to the default provider
/// chain, as does `credentials == None` for credentials.
pub async fn load_sdk_config(region: &str, credentials: Option<StaticCredentials>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if !region.is_empty() {
        loader = loader.region(Region::new(region.to_string()));
    }
    match credentials {
        Some(creds) => {
            debug!(access_key_id = %creds.access_key_id, "using static credentials");
            loader = loader.credentials_provider(Credentials::new(
                creds.access_key_id,
                creds.secret_access_key,
                None,
                None,
                "ecs-scale-arguments",
            ));
        }
        None => debug!("using default credential provider chain"),
    }
    loader.load().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_need_both_halves() {
        assert!(StaticCredentials::from_pair("AKIA", "secret").is_some());
        assert!(StaticCredentials::from_pair("AKIA", "").is_none());
        assert!(StaticCredentials::from_pair("", "secret").is_none());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let creds = StaticCredentials::from_pair("AKIA", "hunter2").unwrap();
        let shown = format!("{creds:?}");
        assert!(shown.contains("AKIA"));
        assert!(!shown.contains("hunter2"));
    }
}
