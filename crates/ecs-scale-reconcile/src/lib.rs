//! ecs-scale-reconcile — idempotent reconciliation of ECS auto-scaling.
//!
//! Reads live state through the [`ScalingApi`] and [`AlarmApi`]
//! capabilities, compares it against the desired state from
//! `ecs-scale-core`, and issues at most one corrective write per
//! resource. Resources that already match are never touched.
//!
//! # Enable
//!
//! ```text
//! target   : matches?            → no-op | register (upsert)
//! policy   : equivalent?         → no-op | put (create or update)
//! alarm    : new step policy with metric, alarm absent → create
//! built-in : 4 CPU/memory alarms, each created only if absent
//! ```
//!
//! # Disable
//!
//! ```text
//! target absent → done
//! alarms        : probe candidates, batch-delete the existing ones
//! policies      : probe deduplicated candidates, delete one by one
//! target        : deregister
//! ```
//!
//! Every remote call is issued sequentially, in the order above.

pub mod alarm;
pub mod api;
pub mod compare;
pub mod error;
pub mod memory;
pub mod reconciler;

pub use api::{
    AlarmApi, AlarmRequest, ApiError, ApiResult, ComparisonOperator, LiveAlarm, LivePolicy,
    LiveTarget, ScalingApi,
};
pub use error::{ReconcileError, ReconcileResult};
pub use memory::{Call, InMemoryControlPlane, Operation};
pub use reconciler::{Action, Reconciler, RunReport};
