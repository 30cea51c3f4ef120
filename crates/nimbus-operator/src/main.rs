//! Nimbus Operator - keeps federated authentication on the managed database
//! service in sync with FederatedAuth resources

use clap::Parser;
use kube::{Client, CustomResourceExt};
use tokio_util::sync::CancellationToken;

use nimbus_common::crd::FederatedAuth;
use nimbus_common::telemetry::{init_tracing, TelemetryConfig};
use nimbus_operator::config::{OperatorArgs, OperatorConfig};
use nimbus_operator::controller_runner::build_federated_auth_controller;

/// Nimbus - Kubernetes operator for managed database-service federated authentication
#[derive(Parser, Debug)]
#[command(name = "nimbus-operator", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    #[command(flatten)]
    operator: OperatorArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // kube and reqwest share one TLS stack; pin the provider before either builds a client
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("WARNING: a rustls crypto provider was already installed");
    }

    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&FederatedAuth::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    let config = OperatorConfig::try_from(cli.operator)?;
    init_tracing(&TelemetryConfig {
        format: config.log_format,
        ..Default::default()
    })?;

    tracing::info!(
        api_base_url = %config.api_base_url,
        watch_namespace = ?config.watch_namespace,
        "Starting Nimbus operator"
    );

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    build_federated_auth_controller(client, &config, shutdown).await;

    tracing::info!("Nimbus operator stopped");
    Ok(())
}

/// Cancel `shutdown` on SIGINT or SIGTERM
async fn cancel_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
    shutdown.cancel();
}
