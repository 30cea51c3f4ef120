//! Custom Resource Definitions for Nimbus
//!
//! This module contains all CRD definitions used by the Nimbus operator.

mod federated_auth;
mod types;

pub use federated_auth::{
    FederatedAuth, FederatedAuthSpec, FederatedAuthStatus, RoleAssignment, RoleMapping,
};
pub use types::{Condition, ConditionStatus, ConditionType, SecretRef};
