//! Translation of a `FederatedAuth` spec into a connected-org configuration

use nimbus_common::crd::FederatedAuthSpec;

use crate::api::{OrgRoleAssignment, OrgRoleMapping, ResolvedOrgConfig};
use crate::error::TranslateError;
use crate::resolver::ProjectResolver;

/// Build the target connected-org configuration for `spec`
///
/// Lists and the restriction flag are copied verbatim. Every role mapping is
/// tagged with `idp_id` and every assignment becomes a project-scoped role
/// with the resolved project id. The first reference that fails to resolve
/// aborts the translation; no partial configuration is returned.
pub async fn translate(
    org_id: &str,
    idp_id: &str,
    spec: &FederatedAuthSpec,
    resolver: &mut ProjectResolver<'_>,
) -> Result<ResolvedOrgConfig, TranslateError> {
    let mut role_mappings = Vec::with_capacity(spec.role_mappings.len());

    for mapping in &spec.role_mappings {
        let mut role_assignments = Vec::with_capacity(mapping.role_assignments.len());
        for assignment in &mapping.role_assignments {
            let group_id = resolver
                .resolve(&assignment.project_name)
                .await
                .map_err(|source| TranslateError::UnresolvedProject {
                    external_group: mapping.external_group_name.clone(),
                    project: assignment.project_name.clone(),
                    source,
                })?;
            role_assignments.push(OrgRoleAssignment {
                group_id: Some(group_id),
                org_id: None,
                role: assignment.role.clone(),
            });
        }

        role_mappings.push(OrgRoleMapping {
            external_group_name: mapping.external_group_name.clone(),
            id: Some(idp_id.to_string()),
            role_assignments,
        });
    }

    Ok(ResolvedOrgConfig {
        org_id: org_id.to_string(),
        identity_provider_id: idp_id.to_string(),
        domain_allow_list: spec.domain_allow_list.clone(),
        domain_restriction_enabled: spec.domain_restriction_enabled,
        post_auth_role_grants: spec.post_auth_role_grants.clone(),
        role_mappings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, MockProjectLookup, Project};
    use crate::error::ResolveError;
    use nimbus_common::crd::{RoleAssignment, RoleMapping};
    use tokio_util::sync::CancellationToken;

    fn spec() -> FederatedAuthSpec {
        FederatedAuthSpec {
            enabled: Some(true),
            domain_allow_list: vec!["qwerty".to_string(), "cool-domain.com".to_string()],
            domain_restriction_enabled: Some(true),
            post_auth_role_grants: vec!["ORG_OWNER".to_string()],
            role_mappings: vec![RoleMapping {
                external_group_name: "test".to_string(),
                role_assignments: vec![
                    RoleAssignment {
                        project_name: "test-project".to_string(),
                        role: "GROUP_OWNER".to_string(),
                    },
                    RoleAssignment {
                        project_name: "test-project".to_string(),
                        role: "GROUP_DATA_ACCESS_READ_ONLY".to_string(),
                    },
                ],
            }],
            ..Default::default()
        }
    }

    fn lookup_returning(id: &'static str) -> MockProjectLookup {
        let mut lookup = MockProjectLookup::new();
        lookup.expect_project_by_name().returning(move |name| {
            Ok(Project {
                id: id.to_string(),
                name: name.to_string(),
                org_id: "test-org-id".to_string(),
            })
        });
        lookup
    }

    #[tokio::test]
    async fn translates_spec_with_resolved_projects() {
        let lookup = lookup_returning("test-project-id");
        let cancel = CancellationToken::new();
        let mut resolver = ProjectResolver::new(&lookup, "test-org-id", &cancel);

        let resolved = translate("test-org-id", "test-idp-id", &spec(), &mut resolver)
            .await
            .unwrap();

        assert_eq!(resolved.org_id, "test-org-id");
        assert_eq!(resolved.identity_provider_id, "test-idp-id");
        assert_eq!(resolved.domain_allow_list, vec!["qwerty", "cool-domain.com"]);
        assert_eq!(resolved.domain_restriction_enabled, Some(true));
        assert_eq!(resolved.post_auth_role_grants, vec!["ORG_OWNER"]);

        let mapping = &resolved.role_mappings[0];
        assert_eq!(mapping.external_group_name, "test");
        assert_eq!(mapping.id.as_deref(), Some("test-idp-id"));
        assert_eq!(
            mapping.role_assignments,
            vec![
                OrgRoleAssignment {
                    group_id: Some("test-project-id".to_string()),
                    org_id: None,
                    role: "GROUP_OWNER".to_string(),
                },
                OrgRoleAssignment {
                    group_id: Some("test-project-id".to_string()),
                    org_id: None,
                    role: "GROUP_DATA_ACCESS_READ_ONLY".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn unset_restriction_flag_stays_unset() {
        let lookup = MockProjectLookup::new();
        let cancel = CancellationToken::new();
        let mut resolver = ProjectResolver::new(&lookup, "org-1", &cancel);
        let spec = FederatedAuthSpec {
            enabled: Some(true),
            ..Default::default()
        };

        let resolved = translate("org-1", "idp-1", &spec, &mut resolver)
            .await
            .unwrap();

        assert_eq!(resolved.domain_restriction_enabled, None);
        assert!(resolved.role_mappings.is_empty());
    }

    #[tokio::test]
    async fn first_unresolved_reference_aborts() {
        let mut lookup = MockProjectLookup::new();
        lookup
            .expect_project_by_name()
            .times(1)
            .returning(|name| Err(ApiError::NotFound(name.to_string())));

        let cancel = CancellationToken::new();
        let mut resolver = ProjectResolver::new(&lookup, "test-org-id", &cancel);

        let mut spec = spec();
        spec.role_mappings[0].role_assignments[1].project_name = "other-project".to_string();

        let err = translate("test-org-id", "test-idp-id", &spec, &mut resolver)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TranslateError::UnresolvedProject {
                external_group: "test".to_string(),
                project: "test-project".to_string(),
                source: ResolveError::NotFound {
                    name: "test-project".to_string(),
                    org_id: "test-org-id".to_string(),
                },
            }
        );
    }

    #[tokio::test]
    async fn empty_project_name_fails_translation() {
        let lookup = MockProjectLookup::new();
        let cancel = CancellationToken::new();
        let mut resolver = ProjectResolver::new(&lookup, "org-1", &cancel);

        let mut spec = spec();
        spec.role_mappings[0].role_assignments[0].project_name = String::new();

        let err = translate("org-1", "idp-1", &spec, &mut resolver)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TranslateError::UnresolvedProject {
                source: ResolveError::EmptyName,
                ..
            }
        ));
    }
}
