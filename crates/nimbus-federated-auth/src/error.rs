//! Error types for the FederatedAuth reconciler
//!
//! Nothing here crosses the reconciler boundary as an error: every
//! [`ReconcileError`] is reduced into a [`WorkflowResult`] with a stable
//! reason code before the controller sees it.

use nimbus_common::{ReasonCode, WorkflowResult};
use thiserror::Error;

use crate::api::ApiError;

/// Failure resolving a project name into a remote project id
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The role assignment did not name a project
    #[error("project name is empty")]
    EmptyName,

    /// No project with this name exists in the organization
    #[error("project {name} not found in organization {org_id}")]
    NotFound {
        /// Project name that was looked up
        name: String,
        /// Organization the lookup was bound to
        org_id: String,
    },

    /// The lookup itself failed
    #[error("failed to look up project {name}: {source}")]
    Api {
        /// Project name that was looked up
        name: String,
        /// Underlying API failure
        #[source]
        source: ApiError,
    },
}

/// Failure translating a `FederatedAuth` spec into a connected-org config
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TranslateError {
    /// A role assignment references a project that could not be resolved
    #[error("role mapping {external_group}: {source}")]
    UnresolvedProject {
        /// Role mapping the assignment belongs to
        external_group: String,
        /// Project name from the assignment
        project: String,
        /// Why resolution failed
        #[source]
        source: ResolveError,
    },
}

/// A step of the convergence sequence that could not complete
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    /// The organization has no federation settings
    #[error("{0}")]
    NotAvailable(ApiError),

    /// The connected-org configuration could not be read
    #[error("{0}")]
    OrgNotConnected(ApiError),

    /// The organization is connected but has no identity provider linked
    #[error("organization {org_id} is not linked to an identity provider")]
    NoIdentityProvider {
        /// Organization id
        org_id: String,
    },

    /// The desired spec could not be translated
    #[error("can not convert federated auth spec: {0}")]
    Translate(#[from] TranslateError),

    /// Identity provider settings could not be read or written
    #[error("can not reconcile identity provider settings: {0}")]
    IdentityProvider(ApiError),

    /// The connected-org configuration could not be written
    #[error("can not update federation settings: {0}")]
    Update(ApiError),

    /// The write succeeded but some users are in conflict
    #[error("the following users are in conflict: {}", .0.join(", "))]
    UsersConflict(Vec<String>),

    /// The pass was cancelled before it finished
    #[error("reconcile cancelled")]
    Cancelled,
}

impl ReconcileError {
    /// Wrap an API failure from a step, keeping cancellation distinct
    pub fn from_api(err: ApiError, step: impl FnOnce(ApiError) -> Self) -> Self {
        match err {
            ApiError::Cancelled => Self::Cancelled,
            other => step(other),
        }
    }

    /// Reason code recorded on the status condition
    pub fn reason(&self) -> ReasonCode {
        match self {
            Self::NotAvailable(_) => ReasonCode::FederatedAuthNotAvailable,
            Self::OrgNotConnected(_) | Self::NoIdentityProvider { .. } => {
                ReasonCode::FederatedAuthOrgNotConnected
            }
            Self::UsersConflict(_) => ReasonCode::FederatedAuthUsersConflict,
            Self::Translate(_) | Self::IdentityProvider(_) | Self::Update(_) | Self::Cancelled => {
                ReasonCode::Internal
            }
        }
    }

    /// Reduce into a terminated workflow result
    pub fn into_workflow_result(self) -> WorkflowResult {
        WorkflowResult::terminate(self.reason(), self.to_string())
    }
}
