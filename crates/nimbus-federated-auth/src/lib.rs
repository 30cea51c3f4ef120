//! FederatedAuth reconciler
//!
//! Keeps an organization's federated authentication settings on the managed
//! database service in line with a `FederatedAuth` custom resource:
//!
//! - [`resolver`]: project names to remote project ids
//! - [`translate`]: desired spec to the remote connected-org configuration
//! - [`compare`]: field-by-field diff against the observed configuration
//! - [`mod@reconcile`]: the fetch, diff, apply, verify sequence
//! - [`controller`]: kube-runtime glue (status conditions, requeue)

pub mod api;
pub mod compare;
pub mod controller;
pub mod error;
pub mod reconcile;
pub mod resolver;
pub mod translate;

pub use api::{ApiError, FederationApi, ProjectLookup};
pub use controller::{
    error_policy, reconcile, Connection, ConnectionProvider, Context, KubeClient, KubeClientImpl,
};
pub use error::{ReconcileError, ResolveError, TranslateError};
pub use reconcile::{ensure_federated_auth, NOT_ENABLED_MESSAGE};
pub use resolver::ProjectResolver;
