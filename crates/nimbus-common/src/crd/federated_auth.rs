//! FederatedAuth CRD for organization-level federated authentication
//!
//! A FederatedAuth declares how an organization on the managed database
//! service should trust its identity provider: which email domains are
//! allowed, which roles every federated user gets, and how identity provider
//! groups map to project roles.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, ConditionType, SecretRef};

/// FederatedAuth configures federated authentication for one organization.
///
/// Example:
/// ```yaml
/// apiVersion: nimbus.dev/v1alpha1
/// kind: FederatedAuth
/// metadata:
///   name: corporate-sso
///   namespace: platform
/// spec:
///   enabled: true
///   connectionSecretRef:
///     name: org-api-key
///   domainAllowList:
///     - example.com
///   domainRestrictionEnabled: true
///   ssoDebugEnabled: false
///   postAuthRoleGrants:
///     - ORG_MEMBER
///   roleMappings:
///     - externalGroupName: dba-team
///       roleAssignments:
///         - projectName: payments
///           role: GROUP_OWNER
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "nimbus.dev",
    version = "v1alpha1",
    kind = "FederatedAuth",
    namespaced,
    status = "FederatedAuthStatus",
    shortname = "fedauth",
    printcolumn = r#"{"name":"Enabled","type":"boolean","jsonPath":".spec.enabled"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Reason","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].reason"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct FederatedAuthSpec {
    /// Whether the operator manages federated authentication.
    /// Unset and false both leave the remote configuration untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Secret holding the organization id and API credentials
    pub connection_secret_ref: SecretRef,

    /// Email domains allowed to authenticate through the identity provider
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_allow_list: Vec<String>,

    /// Restrict organization membership to users from allowed domains
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_restriction_enabled: Option<bool>,

    /// Enable SSO debug mode on the identity provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sso_debug_enabled: Option<bool>,

    /// Organization roles granted to every user after federated login
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_auth_role_grants: Vec<String>,

    /// Mappings from identity provider groups to project roles
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role_mappings: Vec<RoleMapping>,
}

impl FederatedAuthSpec {
    /// True only when `enabled` is explicitly set to true
    pub fn is_enabled(&self) -> bool {
        self.enabled == Some(true)
    }
}

/// Maps an identity provider group to a list of project roles
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoleMapping {
    /// Group name as reported by the identity provider
    pub external_group_name: String,

    /// Roles granted to members of the group
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role_assignments: Vec<RoleAssignment>,
}

/// A role granted within a project, referenced by the project's name
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    /// Human-readable project name, resolved to the project id on every pass
    pub project_name: String,

    /// Role name (e.g. GROUP_OWNER, GROUP_READ_ONLY)
    pub role: String,
}

/// FederatedAuth status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FederatedAuthStatus {
    /// Generation of the spec the conditions were computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Conditions representing the reconcile outcome
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl FederatedAuthStatus {
    /// Get the condition of the given type, if present
    pub fn condition(&self, type_: ConditionType) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    /// Write a condition, replacing any existing condition of the same type.
    ///
    /// `lastTransitionTime` is carried over from the existing condition when
    /// the status value did not change.
    pub fn set_condition(&mut self, mut condition: Condition) {
        match self.conditions.iter_mut().find(|c| c.type_ == condition.type_) {
            Some(existing) => {
                if existing.status == condition.status {
                    condition.last_transition_time = existing.last_transition_time;
                }
                *existing = condition;
            }
            None => self.conditions.push(condition),
        }
    }

    /// Set the observed generation and return self for chaining
    pub fn observed_generation(mut self, generation: Option<i64>) -> Self {
        self.observed_generation = generation;
        self
    }

    /// Write a condition and return self for chaining
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.set_condition(condition);
        self
    }
}
