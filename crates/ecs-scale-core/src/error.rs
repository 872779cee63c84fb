//! Error types for desired-state parsing and run settings.

use std::fmt;

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Which input payload a policy document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadOrigin {
    /// The user's `scaling-policies` payload.
    Custom,
    /// The `default-policies` payload.
    Defaults,
}

impl fmt::Display for PayloadOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadOrigin::Custom => f.write_str("scaling-policies"),
            PayloadOrigin::Defaults => f.write_str("default-policies"),
        }
    }
}

/// Input validation errors. All of them abort a run before any remote call.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid {name} {value:?}: {reason}")]
    InvalidArgument {
        name: String,
        value: String,
        reason: String,
    },

    #[error("invalid {origin} JSON: {source}")]
    PolicyJson {
        origin: PayloadOrigin,
        #[source]
        source: serde_json::Error,
    },

    #[error("policy {policy:?}: unknown policy_type {policy_type:?}")]
    UnknownPolicyType { policy: String, policy_type: String },

    #[error("policy {policy:?}: {reason}")]
    InvalidPolicy { policy: String, reason: String },

    #[error("config error: {0}")]
    Config(String),
}

impl CoreError {
    pub(crate) fn invalid_policy(policy: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            policy: policy.to_string(),
            reason: reason.into(),
        }
    }
}
