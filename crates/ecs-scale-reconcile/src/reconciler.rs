//! Reconciler — drives one enable or disable run to completion.
//!
//! A run issues remote calls strictly one at a time. Any failed call
//! aborts the run; nothing already written is rolled back, so recovery is
//! simply running again.

use std::fmt;
use std::future::Future;

use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, Instrument, Span, debug, error, info, info_span, warn};

use ecs_scale_core::{
    DefaultAlarm, DesiredPolicies, PolicyDef, PolicyKind, RunSettings, ScaleDirection, deduplicate,
};

use crate::alarm;
use crate::api::{AlarmApi, ScalingApi};
use crate::compare;
use crate::error::{ReconcileError, ReconcileResult};

/// A write issued during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    RegisterTarget { min_capacity: i32, max_capacity: i32 },
    /// `created` is false when an existing policy was updated in place.
    PutPolicy { name: String, created: bool },
    PutAlarm { name: String },
    DeleteAlarms { names: Vec<String> },
    DeletePolicy { name: String },
    DeregisterTarget,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::RegisterTarget {
                min_capacity,
                max_capacity,
            } => write!(f, "register target ({min_capacity}..={max_capacity})"),
            Action::PutPolicy { name, created: true } => write!(f, "create policy {name}"),
            Action::PutPolicy {
                name,
                created: false,
            } => write!(f, "update policy {name}"),
            Action::PutAlarm { name } => write!(f, "create alarm {name}"),
            Action::DeleteAlarms { names } => write!(f, "delete alarms [{}]", names.join(", ")),
            Action::DeletePolicy { name } => write!(f, "delete policy {name}"),
            Action::DeregisterTarget => f.write_str("deregister target"),
        }
    }
}

/// Writes issued by one run, in order. Empty means already converged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub actions: Vec<Action>,
}

impl RunReport {
    pub fn is_converged(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn writes(&self) -> usize {
        self.actions.len()
    }

    fn push(&mut self, action: Action) {
        debug!(%action, "write issued");
        self.actions.push(action);
    }
}

/// Converges one ECS service's scaling configuration.
pub struct Reconciler<S, A> {
    scaling: S,
    alarms: A,
    settings: RunSettings,
    dispatch: Option<Dispatch>,
}

impl<S, A> Reconciler<S, A>
where
    S: ScalingApi,
    A: AlarmApi,
{
    pub fn new(scaling: S, alarms: A, settings: RunSettings) -> Self {
        Self {
            scaling,
            alarms,
            settings,
            dispatch: None,
        }
    }

    /// Emit this reconciler's logs to `dispatch` instead of the global
    /// default subscriber.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Enable or disable, according to the `enabled` setting.
    pub async fn run(&self) -> ReconcileResult<RunReport> {
        if self.settings.enabled {
            self.enable().await
        } else {
            self.disable().await
        }
    }

    pub async fn enable(&self) -> ReconcileResult<RunReport> {
        self.scoped("enable", self.apply_enable()).await
    }

    pub async fn disable(&self) -> ReconcileResult<RunReport> {
        self.scoped("disable", self.apply_disable()).await
    }

    // ── Logging scope ──────────────────────────────────────────────

    fn run_span(&self, mode: &'static str) -> Span {
        let service = &self.settings.service;
        info_span!(
            "reconcile",
            mode = %mode,
            resource = %service.resource_id(),
            cluster = %service.cluster,
            service = %service.service,
        )
    }

    /// Run `work` inside the per-run span and log its outcome, routing
    /// every event to the injected dispatch when there is one.
    async fn scoped<F>(&self, mode: &'static str, work: F) -> ReconcileResult<RunReport>
    where
        F: Future<Output = ReconcileResult<RunReport>>,
    {
        let work = async move {
            let result = work.await;
            match &result {
                Ok(report) if report.is_converged() => info!("already converged"),
                Ok(report) => info!(writes = report.writes(), "reconciled"),
                Err(e) => error!(error = %e, "reconcile failed"),
            }
            result
        };

        match &self.dispatch {
            Some(dispatch) => {
                let span = tracing::dispatcher::with_default(dispatch, || self.run_span(mode));
                work.instrument(span).with_subscriber(dispatch.clone()).await
            }
            None => work.instrument(self.run_span(mode)).await,
        }
    }

    // ── Enable ─────────────────────────────────────────────────────

    async fn apply_enable(&self) -> ReconcileResult<RunReport> {
        let settings = &self.settings;
        let resource_id = settings.service.resource_id();

        // Resolve before touching anything remote.
        let desired = DesiredPolicies::resolve(&settings.policies, &settings.service, settings.cooldowns)?;
        info!(source = ?desired.source, policies = desired.policies.len(), "desired policies resolved");

        let mut report = RunReport::default();

        if compare::target_matches(&self.scaling, &resource_id, settings.target).await? {
            debug!("scalable target already matches");
        } else {
            info!(
                min_capacity = settings.target.min_capacity,
                max_capacity = settings.target.max_capacity,
                "registering scalable target"
            );
            self.scaling
                .register_target(&resource_id, settings.target)
                .await?;
            report.push(Action::RegisterTarget {
                min_capacity: settings.target.min_capacity,
                max_capacity: settings.target.max_capacity,
            });
        }

        for policy in &desired.policies {
            let existed = self.reconcile_policy(&resource_id, policy, &mut report).await?;
            if !existed {
                self.attach_policy_alarm(&resource_id, policy, &mut report)
                    .await?;
            }
        }

        if desired.is_built_in() {
            self.reconcile_default_alarms(&resource_id, &mut report)
                .await?;
        }

        Ok(report)
    }

    /// Converge one policy. Returns whether it existed before this run.
    async fn reconcile_policy(
        &self,
        resource_id: &str,
        policy: &PolicyDef,
        report: &mut RunReport,
    ) -> ReconcileResult<bool> {
        if compare::policy_matches(&self.scaling, resource_id, &policy.name, &policy.kind).await? {
            debug!(policy_name = %policy.name, "scaling policy already matches");
            return Ok(true);
        }

        let existed = compare::policy_exists(&self.scaling, resource_id, &policy.name).await?;
        info!(
            policy_name = %policy.name,
            policy_type = policy.kind.type_name(),
            update = existed,
            "putting scaling policy"
        );
        self.scaling
            .put_policy(resource_id, &policy.name, &policy.kind)
            .await?;
        report.push(Action::PutPolicy {
            name: policy.name.clone(),
            created: !existed,
        });
        Ok(existed)
    }

    /// Create the alarm for a newly created step policy that names a metric.
    async fn attach_policy_alarm(
        &self,
        resource_id: &str,
        policy: &PolicyDef,
        report: &mut RunReport,
    ) -> ReconcileResult<()> {
        let PolicyKind::StepScaling(step) = &policy.kind else {
            return Ok(());
        };
        let Some(metric) = &policy.alarm_metric else {
            return Ok(());
        };

        let alarm_name = self.settings.service.policy_alarm_name(&policy.name);
        if compare::alarm_exists(&self.alarms, &alarm_name).await? {
            debug!(%alarm_name, "alarm already exists");
            return Ok(());
        }

        let (direction, name_suggests_in) = match policy.scale_direction {
            ScaleDirection::Unspecified => (
                ScaleDirection::Out,
                ScaleDirection::infer_from_name(&policy.name) == ScaleDirection::In,
            ),
            explicit => (explicit, false),
        };

        let arn = self.policy_arn(resource_id, &policy.name).await?;
        let request = alarm::policy_alarm(&self.settings, &policy.name, metric, step, direction, &arn);
        if name_suggests_in {
            warn!(
                policy_name = %policy.name,
                threshold = request.threshold,
                comparison = %request.comparison,
                "scale_direction unset; policy name suggests scale-in but the alarm uses the scale-out threshold {} with {}",
                request.threshold,
                request.comparison,
            );
        }
        info!(
            %alarm_name,
            threshold = request.threshold,
            comparison = %request.comparison,
            "creating policy alarm"
        );
        self.alarms.put_alarm(&request).await?;
        report.push(Action::PutAlarm { name: alarm_name });
        Ok(())
    }

    async fn reconcile_default_alarms(
        &self,
        resource_id: &str,
        report: &mut RunReport,
    ) -> ReconcileResult<()> {
        let service = &self.settings.service;
        for kind in DefaultAlarm::ALL {
            let alarm_name = service.scoped_name(kind.suffix());
            if compare::alarm_exists(&self.alarms, &alarm_name).await? {
                debug!(%alarm_name, "default alarm already exists");
                continue;
            }

            let policy_name = match kind.direction() {
                ScaleDirection::In => service.scale_in_policy_name(),
                ScaleDirection::Out | ScaleDirection::Unspecified => service.scale_out_policy_name(),
            };
            let arn = self.policy_arn(resource_id, &policy_name).await?;
            let request = alarm::default_alarm(&self.settings, kind, &arn);
            info!(
                %alarm_name,
                threshold = request.threshold,
                comparison = %request.comparison,
                "creating default alarm"
            );
            self.alarms.put_alarm(&request).await?;
            report.push(Action::PutAlarm { name: alarm_name });
        }
        Ok(())
    }

    async fn policy_arn(&self, resource_id: &str, policy_name: &str) -> ReconcileResult<String> {
        compare::find_policy(&self.scaling, resource_id, policy_name)
            .await?
            .map(|p| p.arn)
            .filter(|arn| !arn.is_empty())
            .ok_or_else(|| ReconcileError::PolicyArnMissing(policy_name.to_string()))
    }

    // ── Disable ────────────────────────────────────────────────────

    async fn apply_disable(&self) -> ReconcileResult<RunReport> {
        let settings = &self.settings;
        let service = &settings.service;
        let resource_id = service.resource_id();
        let mut report = RunReport::default();

        if !compare::target_exists(&self.scaling, &resource_id).await? {
            info!("no scalable target registered, nothing to tear down");
            return Ok(report);
        }

        let declared = settings.policies.declared_or_empty()?;

        let alarm_candidates = deduplicate(
            service.default_alarm_names().into_iter().chain(
                declared
                    .iter()
                    .filter(|p| p.alarm_metric.is_some())
                    .map(|p| service.policy_alarm_name(&p.name)),
            ),
        );
        let mut alarms_to_delete = Vec::new();
        for alarm_name in alarm_candidates {
            match compare::alarm_exists(&self.alarms, &alarm_name).await {
                Ok(true) => alarms_to_delete.push(alarm_name),
                Ok(false) => debug!(%alarm_name, "alarm absent"),
                Err(e) => warn!(%alarm_name, error = %e, "alarm probe failed, skipping"),
            }
        }
        if alarms_to_delete.is_empty() {
            debug!("no alarms to delete");
        } else {
            info!(alarms = ?alarms_to_delete, "deleting alarms");
            self.alarms.delete_alarms(&alarms_to_delete).await?;
            report.push(Action::DeleteAlarms {
                names: alarms_to_delete,
            });
        }

        let policy_candidates = deduplicate(
            service
                .default_policy_names()
                .into_iter()
                .chain(declared.iter().map(|p| p.name.clone())),
        );
        let mut policies_to_delete = Vec::new();
        for policy_name in policy_candidates {
            if compare::policy_exists(&self.scaling, &resource_id, &policy_name).await? {
                policies_to_delete.push(policy_name);
            } else {
                debug!(%policy_name, "policy absent");
            }
        }
        for policy_name in policies_to_delete {
            info!(%policy_name, "deleting scaling policy");
            self.scaling
                .delete_policy(&resource_id, &policy_name)
                .await?;
            report.push(Action::DeletePolicy { name: policy_name });
        }

        info!("deregistering scalable target");
        self.scaling.deregister_target(&resource_id).await?;
        report.push(Action::DeregisterTarget);

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Call, InMemoryControlPlane, Operation};
    use ecs_scale_core::{
        Cooldowns, PolicyInputs, ScalableTargetSpec, ServiceRef, UtilizationThresholds,
    };
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    const RID: &str = "service/cluster/svc";

    fn settings(enabled: bool, custom: &str) -> RunSettings {
        RunSettings {
            service: ServiceRef::new("cluster", "svc"),
            enabled,
            target: ScalableTargetSpec {
                min_capacity: 1,
                max_capacity: 10,
            },
            cooldowns: Cooldowns {
                scale_out: 300,
                scale_in: 300,
            },
            cpu: UtilizationThresholds {
                scale_out: 75.0,
                scale_in: 65.0,
            },
            memory: UtilizationThresholds {
                scale_out: 80.0,
                scale_in: 70.0,
            },
            policies: PolicyInputs {
                default_policies: String::new(),
                custom_policies: custom.to_string(),
            },
        }
    }

    fn reconciler(
        plane: &InMemoryControlPlane,
        settings: RunSettings,
    ) -> Reconciler<InMemoryControlPlane, InMemoryControlPlane> {
        Reconciler::new(plane.clone(), plane.clone(), settings)
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capturing_dispatch() -> (Dispatch, Captured) {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        (Dispatch::new(subscriber), captured)
    }

    #[tokio::test]
    async fn enable_from_scratch_builds_everything() {
        let plane = InMemoryControlPlane::new();
        let report = reconciler(&plane, settings(true, "")).run().await.unwrap();

        assert_eq!(
            report.actions[0],
            Action::RegisterTarget {
                min_capacity: 1,
                max_capacity: 10
            }
        );
        assert_eq!(
            report.actions[1],
            Action::PutPolicy {
                name: "cluster-svc-scale-out".into(),
                created: true
            }
        );
        // target + 2 policies + 4 default alarms
        assert_eq!(report.writes(), 7);
        assert_eq!(plane.alarm_names().len(), 4);
    }

    #[tokio::test]
    async fn second_enable_is_a_no_op() {
        let plane = InMemoryControlPlane::new();
        reconciler(&plane, settings(true, "")).run().await.unwrap();
        plane.clear_calls();

        let report = reconciler(&plane, settings(true, "")).run().await.unwrap();
        assert!(report.is_converged());
        assert!(plane.writes().is_empty());
    }

    #[tokio::test]
    async fn changed_policy_is_updated_without_touching_alarms() {
        let custom = r#"[{"policy_name":"p1","policy_type":"StepScaling",
            "metric_name":"CPUUtilization","metric_namespace":"AWS/ECS",
            "step_adjustments":[{"ScalingAdjustment":2}]}]"#;
        let plane = InMemoryControlPlane::new();
        plane.seed_target(RID, 1, 10);
        plane.seed_policy(
            RID,
            "p1",
            PolicyKind::StepScaling(ecs_scale_core::StepScalingConfig {
                adjustment_type: None,
                cooldown: None,
                metric_aggregation_type: None,
                step_adjustments: vec![],
            }),
        );

        let report = reconciler(&plane, settings(true, custom)).run().await.unwrap();
        assert_eq!(
            report.actions,
            vec![Action::PutPolicy {
                name: "p1".into(),
                created: false
            }]
        );
        assert!(plane.alarm_names().is_empty());
        assert!(!plane
            .calls()
            .iter()
            .any(|c| c.operation() == Operation::DescribeAlarms));
    }

    #[tokio::test]
    async fn malformed_payload_makes_no_calls() {
        let plane = InMemoryControlPlane::new();
        let err = reconciler(&plane, settings(true, "[{oops"))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Input(_)));
        assert!(plane.calls().is_empty());
    }

    /// Scaling API whose policy listings never carry an ARN.
    struct ArnlessScaling(InMemoryControlPlane);

    #[async_trait::async_trait]
    impl ScalingApi for ArnlessScaling {
        async fn describe_target(
            &self,
            resource_id: &str,
        ) -> crate::ApiResult<Option<crate::LiveTarget>> {
            self.0.describe_target(resource_id).await
        }

        async fn describe_policies(
            &self,
            resource_id: &str,
            names: &[String],
        ) -> crate::ApiResult<Vec<crate::LivePolicy>> {
            let mut policies = self.0.describe_policies(resource_id, names).await?;
            for policy in &mut policies {
                policy.arn.clear();
            }
            Ok(policies)
        }

        async fn register_target(
            &self,
            resource_id: &str,
            target: ScalableTargetSpec,
        ) -> crate::ApiResult<()> {
            self.0.register_target(resource_id, target).await
        }

        async fn put_policy(
            &self,
            resource_id: &str,
            name: &str,
            kind: &PolicyKind,
        ) -> crate::ApiResult<()> {
            self.0.put_policy(resource_id, name, kind).await
        }

        async fn delete_policy(&self, resource_id: &str, name: &str) -> crate::ApiResult<()> {
            self.0.delete_policy(resource_id, name).await
        }

        async fn deregister_target(&self, resource_id: &str) -> crate::ApiResult<()> {
            self.0.deregister_target(resource_id).await
        }
    }

    #[tokio::test]
    async fn missing_arn_is_fatal_before_alarm_write() {
        let custom = r#"[{"policy_name":"p1","policy_type":"StepScaling",
            "metric_name":"M","metric_namespace":"N",
            "step_adjustments":[{"ScalingAdjustment":1}]}]"#;
        let plane = InMemoryControlPlane::new();
        let r = Reconciler::new(ArnlessScaling(plane.clone()), plane.clone(), settings(true, custom));

        let err = r.run().await.unwrap_err();
        assert!(matches!(err, ReconcileError::PolicyArnMissing(ref name) if name == "p1"));
        assert!(plane.policy(RID, "p1").is_some());
        assert!(plane.alarm_names().is_empty());
    }

    #[tokio::test]
    async fn disable_without_target_does_nothing() {
        let plane = InMemoryControlPlane::new();
        let report = reconciler(&plane, settings(false, "not even json"))
            .run()
            .await
            .unwrap();
        assert!(report.is_converged());
        assert_eq!(
            plane.calls(),
            vec![Call::DescribeTarget {
                resource_id: RID.into()
            }]
        );
    }

    #[tokio::test]
    async fn disable_tears_down_in_order() {
        let plane = InMemoryControlPlane::new();
        reconciler(&plane, settings(true, "")).run().await.unwrap();

        let report = reconciler(&plane, settings(false, "")).run().await.unwrap();
        assert!(matches!(&report.actions[0], Action::DeleteAlarms { names } if names.len() == 4));
        assert_eq!(
            report.actions[1],
            Action::DeletePolicy {
                name: "cluster-svc-scale-out".into()
            }
        );
        assert_eq!(report.actions.last(), Some(&Action::DeregisterTarget));
        assert!(plane.target(RID).is_none());
        assert!(plane.alarm_names().is_empty());
    }

    #[tokio::test]
    async fn injected_dispatch_captures_run_logs() {
        let (dispatch, captured) = capturing_dispatch();
        let custom = r#"[{"policy_name":"drain-in","policy_type":"StepScaling",
            "metric_name":"CPUUtilization","metric_namespace":"AWS/ECS",
            "step_adjustments":[{"ScalingAdjustment":-1}]}]"#;
        let plane = InMemoryControlPlane::new();

        reconciler(&plane, settings(true, custom))
            .with_dispatch(dispatch)
            .run()
            .await
            .unwrap();

        let logs = captured.contents();
        assert!(logs.contains("resource=service/cluster/svc"), "{logs}");
        assert!(logs.contains("registering scalable target"), "{logs}");
        assert!(logs.contains("policy name suggests scale-in"), "{logs}");
        assert!(
            logs.contains("scale-out threshold 75 with GreaterThanOrEqualToThreshold"),
            "{logs}"
        );
        assert!(logs.contains("reconciled"), "{logs}");

        let alarm = plane.alarm("cluster-svc-drain-in").unwrap();
        assert_eq!(alarm.threshold, 75.0);
    }

    #[tokio::test]
    async fn failures_are_logged_to_the_injected_dispatch() {
        let (dispatch, captured) = capturing_dispatch();
        let plane = InMemoryControlPlane::new();
        plane.fail(Operation::DescribeTarget, "throttled");

        let err = reconciler(&plane, settings(true, ""))
            .with_dispatch(dispatch)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Api(_)));
        let logs = captured.contents();
        assert!(logs.contains("reconcile failed"), "{logs}");
        assert!(logs.contains("throttled"), "{logs}");
    }
}
