//! Project name resolution
//!
//! Role assignments name projects; the connected-org configuration needs
//! their remote ids. A [`ProjectResolver`] is bound to one organization and
//! lives for a single reconcile pass, so its cache never outlives the pass.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::ProjectLookup;
use crate::error::ResolveError;
use crate::reconcile::cancellable;

/// Resolves project names to ids within one organization
pub struct ProjectResolver<'a> {
    lookup: &'a dyn ProjectLookup,
    org_id: &'a str,
    cancel: &'a CancellationToken,
    cache: HashMap<String, String>,
}

impl<'a> ProjectResolver<'a> {
    /// Create a resolver bound to `org_id`
    pub fn new(
        lookup: &'a dyn ProjectLookup,
        org_id: &'a str,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            lookup,
            org_id,
            cancel,
            cache: HashMap::new(),
        }
    }

    /// Resolve a project name into its remote id
    pub async fn resolve(&mut self, name: &str) -> Result<String, ResolveError> {
        if name.is_empty() {
            return Err(ResolveError::EmptyName);
        }
        if let Some(id) = self.cache.get(name) {
            return Ok(id.clone());
        }

        let lookup = self.lookup;
        let project = match cancellable(self.cancel, || lookup.project_by_name(name)).await {
            Ok(project) => project,
            Err(err) if err.is_not_found() => return Err(self.not_found(name)),
            Err(source) => {
                return Err(ResolveError::Api {
                    name: name.to_string(),
                    source,
                })
            }
        };

        // Project names are only unique within an organization
        if project.org_id != self.org_id {
            debug!(
                project = %name,
                project_org = %project.org_id,
                org_id = %self.org_id,
                "project belongs to another organization"
            );
            return Err(self.not_found(name));
        }

        debug!(project = %name, project_id = %project.id, "resolved project");
        self.cache.insert(name.to_string(), project.id.clone());
        Ok(project.id)
    }

    fn not_found(&self, name: &str) -> ResolveError {
        ResolveError::NotFound {
            name: name.to_string(),
            org_id: self.org_id.to_string(),
        }
    }
}
