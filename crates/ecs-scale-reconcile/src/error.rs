//! Reconciler error types.

use thiserror::Error;

use crate::api::ApiError;

/// Errors that abort a reconciliation run.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Input(#[from] ecs_scale_core::CoreError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("scaling policy {0:?} not found when resolving its ARN")]
    PolicyArnMissing(String),
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
