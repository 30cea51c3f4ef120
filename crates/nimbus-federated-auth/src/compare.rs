//! Equality between the desired and the observed connected-org configuration
//!
//! Fields are compared one by one. Sequences are order-sensitive. The
//! observed `userConflicts` is never compared: it is reported by the remote
//! side and cannot be written.

use crate::api::{ConnectedOrgConfig, OrgRoleMapping, ResolvedOrgConfig};

/// Names of the fields that differ, in wire form
pub fn differences(desired: &ResolvedOrgConfig, observed: &ConnectedOrgConfig) -> Vec<&'static str> {
    let mut fields = Vec::new();

    if desired.org_id != observed.org_id {
        fields.push("orgId");
    }
    if desired.identity_provider_id != observed.identity_provider_id {
        fields.push("identityProviderId");
    }
    if desired.domain_allow_list != observed.domain_allow_list {
        fields.push("domainAllowList");
    }
    if desired.domain_restriction_enabled != observed.domain_restriction_enabled {
        fields.push("domainRestrictionEnabled");
    }
    if desired.post_auth_role_grants != observed.post_auth_role_grants {
        fields.push("postAuthRoleGrants");
    }
    if !role_mappings_match(&desired.role_mappings, &observed.role_mappings) {
        fields.push("roleMappings");
    }

    fields
}

fn role_mappings_match(desired: &[OrgRoleMapping], observed: &[OrgRoleMapping]) -> bool {
    desired.len() == observed.len()
        && desired.iter().zip(observed).all(|(d, o)| {
            d.external_group_name == o.external_group_name
                && d.id == o.id
                && d.role_assignments == o.role_assignments
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{OrgRoleAssignment, UserConflict};

    fn desired() -> ResolvedOrgConfig {
        ResolvedOrgConfig {
            org_id: "org-1".to_string(),
            identity_provider_id: "idp-1".to_string(),
            domain_allow_list: vec!["example.com".to_string()],
            domain_restriction_enabled: Some(true),
            post_auth_role_grants: vec!["ORG_MEMBER".to_string()],
            role_mappings: vec![OrgRoleMapping {
                external_group_name: "dba".to_string(),
                id: Some("idp-1".to_string()),
                role_assignments: vec![OrgRoleAssignment {
                    group_id: Some("p-1".to_string()),
                    org_id: None,
                    role: "GROUP_OWNER".to_string(),
                }],
            }],
        }
    }

    fn observed_from(desired: &ResolvedOrgConfig) -> ConnectedOrgConfig {
        ConnectedOrgConfig {
            org_id: desired.org_id.clone(),
            identity_provider_id: desired.identity_provider_id.clone(),
            domain_allow_list: desired.domain_allow_list.clone(),
            domain_restriction_enabled: desired.domain_restriction_enabled,
            post_auth_role_grants: desired.post_auth_role_grants.clone(),
            role_mappings: desired.role_mappings.clone(),
            user_conflicts: None,
        }
    }

    #[test]
    fn identical_configs_match() {
        let desired = desired();
        assert!(differences(&desired, &observed_from(&desired)).is_empty());
    }

    #[test]
    fn user_conflicts_are_ignored() {
        let desired = desired();
        let mut observed = observed_from(&desired);
        observed.user_conflicts = Some(vec![UserConflict {
            email_address: "a@example.com".to_string(),
            ..Default::default()
        }]);
        assert!(differences(&desired, &observed).is_empty());
    }

    #[test]
    fn each_field_is_reported_by_name() {
        let desired = desired();

        let mut observed = observed_from(&desired);
        observed.domain_allow_list.push("other.com".to_string());
        observed.domain_restriction_enabled = None;
        assert_eq!(
            differences(&desired, &observed),
            vec!["domainAllowList", "domainRestrictionEnabled"]
        );

        let mut observed = observed_from(&desired);
        observed.identity_provider_id = "idp-2".to_string();
        observed.post_auth_role_grants.clear();
        assert_eq!(
            differences(&desired, &observed),
            vec!["identityProviderId", "postAuthRoleGrants"]
        );
    }

    #[test]
    fn sequences_are_order_sensitive() {
        let mut desired = desired();
        desired.domain_allow_list = vec!["a.com".to_string(), "b.com".to_string()];
        let mut observed = observed_from(&desired);
        observed.domain_allow_list.reverse();

        assert_eq!(differences(&desired, &observed), vec!["domainAllowList"]);
    }

    #[test]
    fn role_assignment_changes_are_detected() {
        let desired = desired();

        let mut observed = observed_from(&desired);
        observed.role_mappings[0].role_assignments[0].role = "GROUP_READ_ONLY".to_string();
        assert_eq!(differences(&desired, &observed), vec!["roleMappings"]);

        let mut observed = observed_from(&desired);
        observed.role_mappings[0].role_assignments[0].org_id = Some("org-1".to_string());
        assert_eq!(differences(&desired, &observed), vec!["roleMappings"]);

        let mut observed = observed_from(&desired);
        observed.role_mappings.clear();
        assert_eq!(differences(&desired, &observed), vec!["roleMappings"]);
    }

    #[test]
    fn absent_and_empty_lists_compare_equal() {
        let desired = ResolvedOrgConfig {
            org_id: "org-1".to_string(),
            identity_provider_id: "idp-1".to_string(),
            ..Default::default()
        };
        // Absent lists decode to empty vectors
        let observed: ConnectedOrgConfig = serde_json::from_value(serde_json::json!({
            "orgId": "org-1",
            "identityProviderId": "idp-1"
        }))
        .unwrap();

        assert!(differences(&desired, &observed).is_empty());
    }
}
