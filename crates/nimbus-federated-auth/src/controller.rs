//! FederatedAuth controller glue
//!
//! Connects the convergence sequence in [`crate::reconcile`] to the kube
//! runtime: obtains a management API connection for the object, runs one
//! pass, persists the outcome as status conditions and turns the outcome
//! into a requeue [`Action`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

#[cfg(test)]
use mockall::automock;

use nimbus_common::crd::{ConditionType, FederatedAuth, FederatedAuthStatus};
use nimbus_common::{Error, ReasonCode, Requeue, WorkflowResult, FIELD_MANAGER};

use crate::api::{FederationApi, ProjectLookup};
use crate::reconcile::{ensure_federated_auth, NOT_ENABLED_MESSAGE};

/// Requeue interval after a converged pass, to pick up remote drift
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Requeue interval after a retryable failure
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(30);

/// Trait abstracting Kubernetes writes for FederatedAuth
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Patch the status subresource of a FederatedAuth
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &FederatedAuthStatus,
    ) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &FederatedAuthStatus,
    ) -> Result<(), Error> {
        let api: Api<FederatedAuth> = Api::namespaced(self.client.clone(), namespace);

        let status_patch = serde_json::json!({
            "status": status
        });

        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&status_patch),
        )
        .await?;

        Ok(())
    }
}

/// Management API handles for one organization
pub struct Connection {
    /// Organization the credentials belong to
    pub org_id: String,
    /// Federation settings operations
    pub api: Arc<dyn FederationApi>,
    /// Project lookup for reference resolution
    pub projects: Arc<dyn ProjectLookup>,
}

/// Supplies a management API connection for a FederatedAuth
///
/// Implementations return [`Error::Connection`] when the referenced
/// credentials are missing or incomplete; that is reported on the object's
/// status. Any other error goes to [`error_policy`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Build a connection from the object's connection secret
    async fn connect(&self, fedauth: &FederatedAuth) -> Result<Connection, Error>;
}

/// Controller context shared by every reconcile
pub struct Context {
    /// Kubernetes client for status writes (trait object for testability)
    pub kube: Arc<dyn KubeClient>,
    /// Management API connections
    pub connections: Arc<dyn ConnectionProvider>,
    /// Requeue interval after a converged pass
    pub resync_interval: Duration,
    /// Requeue interval after a retryable failure
    pub retry_interval: Duration,
    /// Cancelled on shutdown; every pass runs on a child token
    pub shutdown: CancellationToken,
}

impl Context {
    /// Create a context with the default requeue intervals
    pub fn new(kube: Arc<dyn KubeClient>, connections: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            kube,
            connections,
            resync_interval: DEFAULT_RESYNC_INTERVAL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            shutdown: CancellationToken::new(),
        }
    }

    /// Override the requeue intervals
    pub fn with_intervals(mut self, resync: Duration, retry: Duration) -> Self {
        self.resync_interval = resync;
        self.retry_interval = retry;
        self
    }

    /// Use `token` as the shutdown signal
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Create a context for testing with mock clients
    #[cfg(test)]
    pub fn for_testing(
        kube: Arc<dyn KubeClient>,
        connections: Arc<dyn ConnectionProvider>,
    ) -> Self {
        Self::new(kube, connections)
    }

    fn action_for(&self, requeue: Requeue) -> Action {
        match requeue {
            Requeue::Resync => Action::requeue(self.resync_interval),
            Requeue::Retry => Action::requeue(self.retry_interval),
            Requeue::AwaitChange => Action::await_change(),
        }
    }
}

/// Reconcile a FederatedAuth
///
/// Runs one convergence pass and records the outcome on `Ready` and
/// `FederatedAuthReady`. Only Kubernetes-side failures are returned as
/// errors; remote failures are part of the recorded outcome.
#[instrument(
    skip(fedauth, ctx),
    fields(federated_auth = %fedauth.name_any(), namespace = %fedauth.namespace().unwrap_or_default())
)]
pub async fn reconcile(fedauth: Arc<FederatedAuth>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = fedauth.name_any();
    let namespace = fedauth
        .namespace()
        .ok_or_else(|| Error::validation_for(&name, "FederatedAuth must be namespaced"))?;

    let result = run_pass(&fedauth, &ctx).await?;
    if ctx.shutdown.is_cancelled() {
        // The pass was cut short; the next start reconciles from scratch
        info!("shutting down, leaving status untouched");
        return Ok(Action::await_change());
    }
    info!(result = %result, "reconcile pass finished");

    let status = next_status(&fedauth, &result);
    // Skip identical writes to avoid an update loop
    if fedauth.status.as_ref() != Some(&status) {
        ctx.kube.patch_status(&namespace, &name, &status).await?;
    } else {
        debug!("status unchanged, skipping patch");
    }

    Ok(ctx.action_for(result.requeue()))
}

async fn run_pass(fedauth: &FederatedAuth, ctx: &Context) -> Result<WorkflowResult, Error> {
    if !fedauth.spec.is_enabled() {
        return Ok(WorkflowResult::ok_with_message(NOT_ENABLED_MESSAGE));
    }

    let connection = match ctx.connections.connect(fedauth).await {
        Ok(connection) => connection,
        Err(Error::Connection { resource, message }) => {
            return Ok(WorkflowResult::terminate(
                ReasonCode::ConnectionSecretInvalid,
                format!("connection secret {resource}: {message}"),
            ))
        }
        Err(e) => return Err(e),
    };

    let cancel = ctx.shutdown.child_token();
    Ok(ensure_federated_auth(
        &fedauth.spec,
        &connection.org_id,
        connection.api.as_ref(),
        connection.projects.as_ref(),
        &cancel,
    )
    .await)
}

/// Status that records `result` on top of the object's current status
fn next_status(fedauth: &FederatedAuth, result: &WorkflowResult) -> FederatedAuthStatus {
    fedauth
        .status
        .clone()
        .unwrap_or_default()
        .observed_generation(fedauth.metadata.generation)
        .with_condition(result.to_condition(ConditionType::Ready))
        .with_condition(result.to_condition(ConditionType::FederatedAuthReady))
}

/// Error policy for the controller
///
/// Called when reconcile returns a Kubernetes-side error. Errors that need a
/// change to the object wait for that change instead of retrying.
pub fn error_policy(fedauth: Arc<FederatedAuth>, error: &Error, ctx: Arc<Context>) -> Action {
    let retryable = error.is_retryable();
    error!(
        ?error,
        federated_auth = %fedauth.name_any(),
        resource = error.resource().unwrap_or_default(),
        retryable,
        "reconciliation failed"
    );

    if retryable {
        Action::requeue(ctx.retry_interval)
    } else {
        Action::await_change()
    }
}
