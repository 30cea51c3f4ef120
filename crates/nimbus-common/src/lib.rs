//! Common types for Nimbus: CRDs, status conditions, workflow results, and errors

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod telemetry;
pub mod workflow;

pub use error::Error;
pub use workflow::{ReasonCode, Requeue, WorkflowResult};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// API group for all Nimbus custom resources
pub const API_GROUP: &str = "nimbus.dev";

/// Field manager used for server-side apply and status patches
pub const FIELD_MANAGER: &str = "nimbus-operator";
