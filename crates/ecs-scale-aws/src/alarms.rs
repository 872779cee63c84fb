//! CloudWatch alarm adapter.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudwatch::Client;
use aws_sdk_cloudwatch::error::DisplayErrorContext;
use aws_sdk_cloudwatch::types::{ComparisonOperator as SdkComparison, Statistic};
use tracing::debug;

use ecs_scale_reconcile::{AlarmApi, AlarmRequest, ApiError, ApiResult, LiveAlarm};

use crate::convert;

/// [`AlarmApi`] over CloudWatch metric alarms.
#[derive(Debug, Clone)]
pub struct AwsAlarmApi {
    client: Client,
}

impl AwsAlarmApi {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl AlarmApi for AwsAlarmApi {
    async fn describe_alarms(&self, names: &[String]) -> ApiResult<Vec<LiveAlarm>> {
        let output = self
            .client
            .describe_alarms()
            .set_alarm_names(Some(names.to_vec()))
            .send()
            .await
            .map_err(|e| ApiError::new("DescribeAlarms", DisplayErrorContext(e)))?;

        Ok(output
            .metric_alarms()
            .iter()
            .filter_map(|a| a.alarm_name())
            .map(|name| LiveAlarm {
                name: name.to_string(),
            })
            .collect())
    }

    async fn put_alarm(&self, alarm: &AlarmRequest) -> ApiResult<()> {
        self.client
            .put_metric_alarm()
            .alarm_name(&alarm.name)
            .alarm_description(&alarm.description)
            .namespace(&alarm.namespace)
            .metric_name(&alarm.metric_name)
            .statistic(Statistic::from(alarm.statistic.as_str()))
            .period(alarm.period)
            .evaluation_periods(alarm.evaluation_periods)
            .threshold(alarm.threshold)
            .comparison_operator(SdkComparison::from(alarm.comparison.as_str()))
            .set_dimensions(Some(convert::alarm_dimensions(&alarm.dimensions)))
            .set_alarm_actions(Some(alarm.actions.clone()))
            .send()
            .await
            .map_err(|e| ApiError::new("PutMetricAlarm", DisplayErrorContext(e)))?;
        debug!(alarm_name = %alarm.name, "metric alarm stored");
        Ok(())
    }

    async fn delete_alarms(&self, names: &[String]) -> ApiResult<()> {
        self.client
            .delete_alarms()
            .set_alarm_names(Some(names.to_vec()))
            .send()
            .await
            .map_err(|e| ApiError::new("DeleteAlarms", DisplayErrorContext(e)))?;
        Ok(())
    }
}
