//! Application Auto Scaling adapter.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_applicationautoscaling::Client;
use aws_sdk_applicationautoscaling::error::DisplayErrorContext;
use aws_sdk_applicationautoscaling::types::{PolicyType, ScalableDimension, ServiceNamespace};
use tracing::debug;

use ecs_scale_core::{PolicyKind, ScalableTargetSpec};
use ecs_scale_reconcile::{ApiError, ApiResult, LivePolicy, LiveTarget, ScalingApi};

use crate::convert;

const SERVICE_NAMESPACE: ServiceNamespace = ServiceNamespace::Ecs;
const DIMENSION: ScalableDimension = ScalableDimension::EcsServiceDesiredCount;

/// [`ScalingApi`] over ECS service desired count.
#[derive(Debug, Clone)]
pub struct AwsScalingApi {
    client: Client,
}

impl AwsScalingApi {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl ScalingApi for AwsScalingApi {
    async fn describe_target(&self, resource_id: &str) -> ApiResult<Option<LiveTarget>> {
        let output = self
            .client
            .describe_scalable_targets()
            .service_namespace(SERVICE_NAMESPACE)
            .scalable_dimension(DIMENSION)
            .resource_ids(resource_id)
            .send()
            .await
            .map_err(|e| ApiError::new("DescribeScalableTargets", DisplayErrorContext(e)))?;

        Ok(output
            .scalable_targets()
            .iter()
            .find(|t| t.resource_id() == resource_id)
            .map(|t| LiveTarget {
                min_capacity: t.min_capacity(),
                max_capacity: t.max_capacity(),
            }))
    }

    async fn describe_policies(
        &self,
        resource_id: &str,
        names: &[String],
    ) -> ApiResult<Vec<LivePolicy>> {
        let mut policies = Vec::new();
        let mut next_token = None;
        loop {
            let output = self
                .client
                .describe_scaling_policies()
                .service_namespace(SERVICE_NAMESPACE)
                .scalable_dimension(DIMENSION)
                .resource_id(resource_id)
                .set_policy_names((!names.is_empty()).then(|| names.to_vec()))
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| ApiError::new("DescribeScalingPolicies", DisplayErrorContext(e)))?;

            policies.extend(output.scaling_policies().iter().map(|p| LivePolicy {
                name: p.policy_name().to_string(),
                arn: p.policy_arn().to_string(),
                kind: convert::live_policy_kind(p),
            }));

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }
        debug!(%resource_id, count = policies.len(), "described scaling policies");
        Ok(policies)
    }

    async fn register_target(&self, resource_id: &str, target: ScalableTargetSpec) -> ApiResult<()> {
        self.client
            .register_scalable_target()
            .service_namespace(SERVICE_NAMESPACE)
            .scalable_dimension(DIMENSION)
            .resource_id(resource_id)
            .min_capacity(target.min_capacity)
            .max_capacity(target.max_capacity)
            .send()
            .await
            .map_err(|e| ApiError::new("RegisterScalableTarget", DisplayErrorContext(e)))?;
        Ok(())
    }

    async fn put_policy(&self, resource_id: &str, name: &str, kind: &PolicyKind) -> ApiResult<()> {
        const OP: &str = "PutScalingPolicy";
        let request = self
            .client
            .put_scaling_policy()
            .service_namespace(SERVICE_NAMESPACE)
            .scalable_dimension(DIMENSION)
            .resource_id(resource_id)
            .policy_name(name);

        let request = match kind {
            PolicyKind::StepScaling(cfg) => request
                .policy_type(PolicyType::StepScaling)
                .step_scaling_policy_configuration(
                    convert::step_to_sdk(cfg).map_err(|e| ApiError::new(OP, e))?,
                ),
            PolicyKind::TargetTrackingScaling(cfg) => request
                .policy_type(PolicyType::TargetTrackingScaling)
                .target_tracking_scaling_policy_configuration(
                    convert::target_tracking_to_sdk(cfg).map_err(|e| ApiError::new(OP, e))?,
                ),
        };

        let output = request.send().await.map_err(|e| ApiError::new(OP, DisplayErrorContext(e)))?;
        debug!(policy_name = %name, arn = output.policy_arn(), "scaling policy stored");
        Ok(())
    }

    async fn delete_policy(&self, resource_id: &str, name: &str) -> ApiResult<()> {
        self.client
            .delete_scaling_policy()
            .service_namespace(SERVICE_NAMESPACE)
            .scalable_dimension(DIMENSION)
            .resource_id(resource_id)
            .policy_name(name)
            .send()
            .await
            .map_err(|e| ApiError::new("DeleteScalingPolicy", DisplayErrorContext(e)))?;
        Ok(())
    }

    async fn deregister_target(&self, resource_id: &str) -> ApiResult<()> {
        self.client
            .deregister_scalable_target()
            .service_namespace(SERVICE_NAMESPACE)
            .scalable_dimension(DIMENSION)
            .resource_id(resource_id)
            .send()
            .await
            .map_err(|e| ApiError::new("DeregisterScalableTarget", DisplayErrorContext(e)))?;
        Ok(())
    }
}
