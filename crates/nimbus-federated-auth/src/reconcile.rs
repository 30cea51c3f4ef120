//! Convergence of an organization's federated authentication settings
//!
//! One pass runs these steps strictly in order, stopping at the first
//! failure:
//!
//! 1. Skip when the spec is not enabled (no remote call).
//! 2. Read the federation settings of the organization.
//! 3. Read the connected-org configuration; it names the identity provider.
//! 4. Translate the spec, resolving project names.
//! 5. Converge identity provider settings (`ssoDebugEnabled`).
//! 6. Compare the translated config with the observed one; stop if equal.
//! 7. Write the translated config.
//! 8. Report users left in conflict by the write.
//!
//! Every remote call is raced against the pass's cancellation token. The
//! pass performs no retries of its own.

use std::future::Future;

use nimbus_common::crd::FederatedAuthSpec;
use nimbus_common::WorkflowResult;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ApiError, FederationApi, ProjectLookup};
use crate::compare;
use crate::error::ReconcileError;
use crate::resolver::ProjectResolver;
use crate::translate::translate;

/// Message recorded when a pass is skipped because the spec is disabled
pub const NOT_ENABLED_MESSAGE: &str = "federated authentication is not enabled";

/// Run `call` unless `cancel` fires first
///
/// The token is checked before the call is issued, so a cancelled pass makes
/// no further remote calls.
pub(crate) async fn cancellable<T, F, Fut>(cancel: &CancellationToken, call: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    if cancel.is_cancelled() {
        return Err(ApiError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApiError::Cancelled),
        result = call() => result,
    }
}

/// Converge the organization's federated authentication with `spec`
pub async fn ensure_federated_auth(
    spec: &FederatedAuthSpec,
    org_id: &str,
    api: &dyn FederationApi,
    projects: &dyn ProjectLookup,
    cancel: &CancellationToken,
) -> WorkflowResult {
    if !spec.is_enabled() {
        debug!(org_id = %org_id, "federated authentication disabled, skipping");
        return WorkflowResult::ok_with_message(NOT_ENABLED_MESSAGE);
    }

    match converge(spec, org_id, api, projects, cancel).await {
        Ok(()) => WorkflowResult::ok(),
        Err(err) => {
            warn!(org_id = %org_id, reason = %err.reason(), error = %err, "federated auth did not converge");
            err.into_workflow_result()
        }
    }
}

async fn converge(
    spec: &FederatedAuthSpec,
    org_id: &str,
    api: &dyn FederationApi,
    projects: &dyn ProjectLookup,
    cancel: &CancellationToken,
) -> Result<(), ReconcileError> {
    let settings = cancellable(cancel, || api.federation_settings(org_id))
        .await
        .map_err(|e| ReconcileError::from_api(e, ReconcileError::NotAvailable))?;
    let settings_id = settings.id.as_str();

    let observed = cancellable(cancel, || api.connected_org_config(settings_id, org_id))
        .await
        .map_err(|e| ReconcileError::from_api(e, ReconcileError::OrgNotConnected))?;

    let idp_id = observed.identity_provider_id.as_str();
    if idp_id.is_empty() {
        return Err(ReconcileError::NoIdentityProvider {
            org_id: org_id.to_string(),
        });
    }

    let mut resolver = ProjectResolver::new(projects, org_id, cancel);
    let desired = match translate(org_id, idp_id, spec, &mut resolver).await {
        Ok(desired) => desired,
        Err(_) if cancel.is_cancelled() => return Err(ReconcileError::Cancelled),
        Err(e) => return Err(e.into()),
    };

    ensure_identity_provider(spec, settings_id, idp_id, api, cancel).await?;

    let diff = compare::differences(&desired, &observed);
    if diff.is_empty() {
        debug!(org_id = %org_id, "connected org config up to date");
        return Ok(());
    }
    info!(org_id = %org_id, fields = ?diff, "updating connected org config");

    let updated = cancellable(cancel, || {
        api.update_connected_org_config(settings_id, org_id, &desired)
    })
    .await
    .map_err(|e| ReconcileError::from_api(e, ReconcileError::Update))?;

    let conflicts = updated.conflicting_users();
    if !conflicts.is_empty() {
        return Err(ReconcileError::UsersConflict(
            conflicts.into_iter().map(str::to_string).collect(),
        ));
    }

    Ok(())
}

/// Converge identity provider settings
///
/// Only `ssoDebugEnabled` is managed. The settings are written back when the
/// spec sets the flag and the remote value differs or is unset.
async fn ensure_identity_provider(
    spec: &FederatedAuthSpec,
    settings_id: &str,
    idp_id: &str,
    api: &dyn FederationApi,
    cancel: &CancellationToken,
) -> Result<(), ReconcileError> {
    let mut idp = cancellable(cancel, || api.identity_provider(settings_id, idp_id))
        .await
        .map_err(|e| ReconcileError::from_api(e, ReconcileError::IdentityProvider))?;

    let Some(desired) = spec.sso_debug_enabled else {
        return Ok(());
    };
    if idp.sso_debug_enabled == Some(desired) {
        return Ok(());
    }

    info!(idp_id = %idp_id, sso_debug_enabled = desired, "updating identity provider settings");
    idp.sso_debug_enabled = Some(desired);
    cancellable(cancel, || api.update_identity_provider(settings_id, idp_id, &idp))
        .await
        .map_err(|e| ReconcileError::from_api(e, ReconcileError::IdentityProvider))?;

    Ok(())
}
