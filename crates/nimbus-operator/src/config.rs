//! Operator configuration
//!
//! Flags fall back to `NIMBUS_*` environment variables so the same binary
//! can be configured from a Deployment without a wrapper script.

use std::time::Duration;

use clap::Args;
use nimbus_common::telemetry::LogFormat;
use nimbus_common::Error;
use url::Url;

/// Default management API endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://cloud.mongodb.com";

/// Command-line arguments for running the controller
#[derive(Args, Debug, Clone)]
pub struct OperatorArgs {
    /// Base URL of the management API
    #[arg(long, env = "NIMBUS_API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    pub api_base_url: String,

    /// Only watch FederatedAuth resources in this namespace (all namespaces when unset)
    #[arg(long, env = "NIMBUS_WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// Seconds between passes for a converged resource
    #[arg(long, env = "NIMBUS_RESYNC_INTERVAL_SECS", default_value_t = 300)]
    pub resync_interval_secs: u64,

    /// Seconds before retrying a resource that failed with a retryable reason
    #[arg(long, env = "NIMBUS_RETRY_INTERVAL_SECS", default_value_t = 30)]
    pub retry_interval_secs: u64,

    /// Timeout for a single management API request
    #[arg(long, env = "NIMBUS_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Log output format (json or text)
    #[arg(long, env = "NIMBUS_LOG_FORMAT", default_value = "json")]
    pub log_format: String,
}

/// Validated operator configuration
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Base URL of the management API
    pub api_base_url: Url,
    /// Namespace to watch, `None` for all namespaces
    pub watch_namespace: Option<String>,
    /// Requeue interval after a converged pass
    pub resync_interval: Duration,
    /// Requeue interval after a retryable failure
    pub retry_interval: Duration,
    /// Timeout for a single management API request
    pub request_timeout: Duration,
    /// Log output format
    pub log_format: LogFormat,
}

impl TryFrom<OperatorArgs> for OperatorConfig {
    type Error = Error;

    fn try_from(args: OperatorArgs) -> Result<Self, Self::Error> {
        let api_base_url = Url::parse(&args.api_base_url).map_err(|e| {
            Error::validation_for("api-base-url", format!("{}: {e}", args.api_base_url))
        })?;
        if !matches!(api_base_url.scheme(), "http" | "https") {
            return Err(Error::validation_for(
                "api-base-url",
                format!("unsupported scheme {}", api_base_url.scheme()),
            ));
        }

        for (flag, value) in [
            ("resync-interval-secs", args.resync_interval_secs),
            ("retry-interval-secs", args.retry_interval_secs),
            ("request-timeout-secs", args.request_timeout_secs),
        ] {
            if value == 0 {
                return Err(Error::validation_for(flag, "must be greater than zero"));
            }
        }

        let watch_namespace = args.watch_namespace.filter(|ns| !ns.is_empty());

        Ok(Self {
            api_base_url,
            watch_namespace,
            resync_interval: Duration::from_secs(args.resync_interval_secs),
            retry_interval: Duration::from_secs(args.retry_interval_secs),
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            log_format: args.log_format.parse()?,
        })
    }
}
