//! Management API model and the capabilities the reconciler consumes
//!
//! The reconciler never talks HTTP itself. It depends on two narrow traits:
//! [`ProjectLookup`] for reference resolution and [`FederationApi`] for the
//! federation settings it reads and writes. The operator binary supplies the
//! HTTP implementation; tests supply mocks or in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

/// Error codes the management API uses when a referenced entity does not exist
pub const NOT_FOUND_ERROR_CODES: &[&str] = &[
    "NOT_IN_GROUP",
    "GROUP_NAME_NOT_FOUND",
    "GROUP_NOT_FOUND",
    "RESOURCE_NOT_FOUND",
];

/// Failure of a management API call
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ApiError {
    /// The requested entity does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The API answered with an error status
    #[error("management API returned {status} {error_code}: {detail}")]
    Status {
        /// HTTP status code
        status: u16,
        /// API error code (e.g. `INVALID_ATTRIBUTE`)
        error_code: String,
        /// Human-readable detail from the response body
        detail: String,
    },

    /// The request never produced a response (DNS, TLS, timeout, auth exchange)
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The reconcile pass was cancelled before the call completed
    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    /// Build an error from an error response, folding not-found codes into
    /// [`ApiError::NotFound`]
    pub fn from_response(status: u16, error_code: &str, detail: &str) -> Self {
        if status == 404 || NOT_FOUND_ERROR_CODES.contains(&error_code) {
            Self::NotFound(if detail.is_empty() {
                error_code.to_string()
            } else {
                detail.to_string()
            })
        } else {
            Self::Status {
                status,
                error_code: error_code.to_string(),
                detail: detail.to_string(),
            }
        }
    }

    /// True when the entity does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// A project (group) on the management API
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Remote-assigned project id
    pub id: String,
    /// Human-readable project name
    pub name: String,
    /// Organization that owns the project
    #[serde(default)]
    pub org_id: String,
}

/// Federation settings root of an organization
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FederationSettings {
    /// Federation settings id
    pub id: String,
    /// Identity provider currently attached to the federation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_provider_id: Option<String>,
    /// Activation status of the identity provider (ACTIVE, INACTIVE)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_provider_status: Option<String>,
}

/// A role granted by a role mapping
///
/// Exactly one of `group_id` (project-scoped) and `org_id` (org-scoped) is
/// set on the remote side. Roles produced from a `FederatedAuth` are always
/// project-scoped.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrgRoleAssignment {
    /// Project id for project-scoped roles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Organization id for org-scoped roles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    /// Role name
    pub role: String,
}

/// Identity provider group to role mapping
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrgRoleMapping {
    /// Group name reported by the identity provider
    pub external_group_name: String,
    /// Mapping id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Roles granted to members of the group
    #[serde(default)]
    pub role_assignments: Vec<OrgRoleAssignment>,
}

/// A user whose identity collides with a federated identity
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserConflict {
    /// Contact address of the conflicting user
    pub email_address: String,
    /// Federation settings the conflict belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federation_settings_id: Option<String>,
    /// First name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Last name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// User id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Connected-org configuration as observed on the management API
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedOrgConfig {
    /// Organization id
    pub org_id: String,
    /// Identity provider the organization is linked to, empty when unlinked
    #[serde(default)]
    pub identity_provider_id: String,
    /// Allowed email domains
    #[serde(default)]
    pub domain_allow_list: Vec<String>,
    /// Domain restriction flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_restriction_enabled: Option<bool>,
    /// Roles granted after federated login
    #[serde(default)]
    pub post_auth_role_grants: Vec<String>,
    /// Group to role mappings
    #[serde(default)]
    pub role_mappings: Vec<OrgRoleMapping>,
    /// Users in conflict with federated identities; observed only, never written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_conflicts: Option<Vec<UserConflict>>,
}

impl ConnectedOrgConfig {
    /// Email addresses of every conflicting user, in response order
    pub fn conflicting_users(&self) -> Vec<&str> {
        self.user_conflicts
            .iter()
            .flatten()
            .map(|c| c.email_address.as_str())
            .collect()
    }
}

/// Connected-org configuration computed from a `FederatedAuth` spec
///
/// This is the body of the update call. It has no user-conflicts field:
/// conflicts are observed, never written.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedOrgConfig {
    /// Organization id
    pub org_id: String,
    /// Identity provider id
    pub identity_provider_id: String,
    /// Allowed email domains
    pub domain_allow_list: Vec<String>,
    /// Domain restriction flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_restriction_enabled: Option<bool>,
    /// Roles granted after federated login
    pub post_auth_role_grants: Vec<String>,
    /// Group to role mappings with resolved project ids
    pub role_mappings: Vec<OrgRoleMapping>,
}

/// Identity provider settings, a sub-resource with its own endpoint
///
/// Fields the operator does not manage are kept in `other` so that a
/// read-modify-write round trip does not drop them.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProviderSettings {
    /// Identity provider id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// SSO debug mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sso_debug_enabled: Option<bool>,
    /// Unmanaged fields, passed through untouched
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

/// Read-only project lookup used for reference resolution
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProjectLookup: Send + Sync {
    /// Find a project by its name
    ///
    /// Returns [`ApiError::NotFound`] when no project has that name.
    async fn project_by_name(&self, name: &str) -> Result<Project, ApiError>;
}

/// Federation settings operations used by the reconciler
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FederationApi: Send + Sync {
    /// Get the federation settings root of an organization
    async fn federation_settings(&self, org_id: &str) -> Result<FederationSettings, ApiError>;

    /// Get the connected-org configuration of an organization
    async fn connected_org_config(
        &self,
        settings_id: &str,
        org_id: &str,
    ) -> Result<ConnectedOrgConfig, ApiError>;

    /// Replace the connected-org configuration; the response is the stored config
    async fn update_connected_org_config(
        &self,
        settings_id: &str,
        org_id: &str,
        config: &ResolvedOrgConfig,
    ) -> Result<ConnectedOrgConfig, ApiError>;

    /// Get identity provider settings
    async fn identity_provider(
        &self,
        settings_id: &str,
        idp_id: &str,
    ) -> Result<IdentityProviderSettings, ApiError>;

    /// Update identity provider settings
    async fn update_identity_provider(
        &self,
        settings_id: &str,
        idp_id: &str,
        settings: &IdentityProviderSettings,
    ) -> Result<IdentityProviderSettings, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_codes_fold_into_not_found() {
        let err = ApiError::from_response(404, "NOT_IN_GROUP", "project test-project not found");
        assert!(err.is_not_found());
        assert_eq!(
            err,
            ApiError::NotFound("project test-project not found".to_string())
        );

        let err = ApiError::from_response(400, "GROUP_NAME_NOT_FOUND", "");
        assert_eq!(err, ApiError::NotFound("GROUP_NAME_NOT_FOUND".to_string()));
    }

    #[test]
    fn other_errors_keep_status_and_code() {
        let err = ApiError::from_response(401, "UNAUTHORIZED", "bad token");
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("UNAUTHORIZED"));
    }

    #[test]
    fn connected_org_config_decodes_remote_shape() {
        let json = serde_json::json!({
            "orgId": "org-1",
            "identityProviderId": "idp-1",
            "domainAllowList": ["example.com"],
            "domainRestrictionEnabled": true,
            "postAuthRoleGrants": ["ORG_MEMBER"],
            "roleMappings": [{
                "externalGroupName": "dba",
                "id": "rm-1",
                "roleAssignments": [
                    {"groupId": "p-1", "role": "GROUP_OWNER"},
                    {"orgId": "org-1", "role": "ORG_READ_ONLY"}
                ]
            }],
            "userConflicts": [
                {"emailAddress": "a@example.com", "userId": "u-1"}
            ],
            "dataAccessIdentityProviderIds": []
        });
        let config: ConnectedOrgConfig = serde_json::from_value(json).expect("decode");
        assert_eq!(config.identity_provider_id, "idp-1");
        assert_eq!(config.role_mappings[0].role_assignments.len(), 2);
        assert_eq!(
            config.role_mappings[0].role_assignments[1].org_id.as_deref(),
            Some("org-1")
        );
        assert_eq!(config.conflicting_users(), vec!["a@example.com"]);
    }

    #[test]
    fn unlinked_org_decodes_with_empty_identity_provider() {
        let config: ConnectedOrgConfig =
            serde_json::from_value(serde_json::json!({ "orgId": "org-1" })).expect("decode");
        assert!(config.identity_provider_id.is_empty());
        assert!(config.conflicting_users().is_empty());
    }

    #[test]
    fn resolved_config_never_carries_conflicts() {
        let resolved = ResolvedOrgConfig {
            org_id: "org-1".to_string(),
            identity_provider_id: "idp-1".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&resolved).unwrap();
        assert!(json.get("userConflicts").is_none());
        assert!(json.get("domainRestrictionEnabled").is_none());
        assert_eq!(json["orgId"], "org-1");
    }

    #[test]
    fn identity_provider_round_trip_keeps_unmanaged_fields() {
        let json = serde_json::json!({
            "id": "idp-1",
            "displayName": "Okta",
            "ssoDebugEnabled": false,
            "issuerUri": "https://example.okta.com",
            "associatedDomains": ["example.com"]
        });
        let mut settings: IdentityProviderSettings =
            serde_json::from_value(json).expect("decode");
        settings.sso_debug_enabled = Some(true);

        let back = serde_json::to_value(&settings).unwrap();
        assert_eq!(back["ssoDebugEnabled"], true);
        assert_eq!(back["issuerUri"], "https://example.okta.com");
        assert_eq!(back["associatedDomains"][0], "example.com");
    }
}
