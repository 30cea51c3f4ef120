//! Workflow results shared by every reconciler
//!
//! A reconcile pass starts fresh and ends in exactly one [`WorkflowResult`]:
//!
//! ```text
//!            ┌──> Ok                 (converged, or nothing to do)
//! Initial ───┼──> Ok with message    (intentionally skipped, e.g. disabled)
//!            └──> Terminate(reason)  (could not converge this pass)
//! ```
//!
//! No intermediate state is persisted between passes. The result is reduced
//! into status conditions and a [`Requeue`] instruction for the controller
//! runtime; the reason code alone decides whether a failure is retried.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::crd::{Condition, ConditionStatus, ConditionType};

/// Stable, machine-readable reason attached to a failed pass
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum ReasonCode {
    /// The organization has no federation settings at all
    FederatedAuthNotAvailable,
    /// Federation settings exist but this organization is not connected yet
    FederatedAuthOrgNotConnected,
    /// The remote update applied but users are left in an identity conflict
    FederatedAuthUsersConflict,
    /// The referenced connection secret is missing or incomplete
    ConnectionSecretInvalid,
    /// Unexpected failure talking to the management API
    Internal,
}

impl ReasonCode {
    /// Wire representation used in condition `reason` fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FederatedAuthNotAvailable => "FederatedAuthNotAvailable",
            Self::FederatedAuthOrgNotConnected => "FederatedAuthOrgNotConnected",
            Self::FederatedAuthUsersConflict => "FederatedAuthUsersConflict",
            Self::ConnectionSecretInvalid => "ConnectionSecretInvalid",
            Self::Internal => "Internal",
        }
    }

    /// Whether a failure with this reason should be requeued automatically.
    ///
    /// Missing federation and user conflicts only clear after someone changes
    /// organization-level state outside the operator.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::FederatedAuthNotAvailable | Self::FederatedAuthUsersConflict
        )
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the controller runtime should do after a pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requeue {
    /// Converged; check again after the resync interval to catch drift
    Resync,
    /// Failed with a retryable reason; try again after the retry interval
    Retry,
    /// Failed terminally; wait until the object itself changes
    AwaitChange,
}

/// Outcome of one reconcile pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkflowResult {
    /// Convergence achieved or nothing to do
    Ok {
        /// Why the pass was a no-op, when it was skipped on purpose
        message: Option<String>,
    },
    /// Convergence could not be achieved this pass
    Terminate {
        /// Stable reason code
        reason: ReasonCode,
        /// Human-readable detail
        message: String,
    },
}

impl WorkflowResult {
    /// Converged, or nothing to do
    pub fn ok() -> Self {
        Self::Ok { message: None }
    }

    /// Intentionally skipped; the message records why
    pub fn ok_with_message(message: impl Into<String>) -> Self {
        Self::Ok {
            message: Some(message.into()),
        }
    }

    /// Could not converge this pass
    pub fn terminate(reason: ReasonCode, message: impl Into<String>) -> Self {
        Self::Terminate {
            reason,
            message: message.into(),
        }
    }

    /// True for both `ok()` and `ok_with_message()`
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    /// Reason code of a terminated pass
    pub fn reason(&self) -> Option<ReasonCode> {
        match self {
            Self::Ok { .. } => None,
            Self::Terminate { reason, .. } => Some(*reason),
        }
    }

    /// Message carried by the result, empty for a plain `ok()`
    pub fn message(&self) -> &str {
        match self {
            Self::Ok { message } => message.as_deref().unwrap_or_default(),
            Self::Terminate { message, .. } => message,
        }
    }

    /// Requeue instruction derived from the reason code
    pub fn requeue(&self) -> Requeue {
        match self {
            Self::Ok { .. } => Requeue::Resync,
            Self::Terminate { reason, .. } if reason.is_retryable() => Requeue::Retry,
            Self::Terminate { .. } => Requeue::AwaitChange,
        }
    }

    /// Render the result as a condition of the given type
    pub fn to_condition(&self, type_: ConditionType) -> Condition {
        match self {
            Self::Ok { message } => Condition::new(
                type_,
                ConditionStatus::True,
                "",
                message.clone().unwrap_or_default(),
            ),
            Self::Terminate { reason, message } => {
                Condition::new(type_, ConditionStatus::False, reason.as_str(), message.trim())
            }
        }
    }
}

impl std::fmt::Display for WorkflowResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok { message: None } => write!(f, "ok"),
            Self::Ok {
                message: Some(message),
            } => write!(f, "ok: {message}"),
            Self::Terminate { reason, message } => write!(f, "{reason}: {message}"),
        }
    }
}
