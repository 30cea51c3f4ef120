//! Nimbus operator: runtime wiring for the FederatedAuth reconciler
//!
//! The reconciler itself lives in `nimbus-federated-auth`. This crate
//! supplies what it needs to run against a cluster: configuration, the
//! connection-secret provider, the HTTP management API client and the
//! kube-runtime controller.

pub mod config;
pub mod connection;
pub mod controller_runner;
pub mod management_api;
