//! Controller runner - builds the FederatedAuth controller future

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};
use tokio_util::sync::CancellationToken;

use nimbus_common::crd::FederatedAuth;
use nimbus_federated_auth::{error_policy, reconcile, Context, KubeClientImpl};

use crate::config::OperatorConfig;
use crate::connection::SecretConnectionProvider;

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// This forces the API server to close the watch before the client times out,
/// preventing "body read timed out" errors on idle watches.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Build the FederatedAuth controller future
///
/// The controller stops taking new work once `shutdown` is cancelled, and
/// in-flight passes observe the same token through the context.
pub fn build_federated_auth_controller(
    client: Client,
    config: &OperatorConfig,
    shutdown: CancellationToken,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    let connections = SecretConnectionProvider::new(
        client.clone(),
        config.api_base_url.clone(),
        config.request_timeout,
    );
    let ctx = Arc::new(
        Context::new(
            Arc::new(KubeClientImpl::new(client.clone())),
            Arc::new(connections),
        )
        .with_intervals(config.resync_interval, config.retry_interval)
        .with_shutdown(shutdown.clone()),
    );

    let resources: Api<FederatedAuth> = match &config.watch_namespace {
        Some(namespace) => {
            tracing::info!(namespace = %namespace, "- FederatedAuth controller (namespaced)");
            Api::namespaced(client, namespace)
        }
        None => {
            tracing::info!("- FederatedAuth controller");
            Api::all(client)
        }
    };

    Box::pin(
        Controller::new(
            resources,
            WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
        )
        .graceful_shutdown_on(async move { shutdown.cancelled().await })
        .run(reconcile, error_policy, ctx)
        .for_each(log_reconcile_result("FederatedAuth")),
    )
}

fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
