//! Management API connections from connection secrets
//!
//! A FederatedAuth names a Secret holding a service account for its
//! organization. Clients are cached per service account so the OAuth token
//! and connection pool survive between passes; a rotated secret yields a
//! new client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client, ResourceExt};
use tracing::debug;
use url::Url;
use zeroize::Zeroizing;

use nimbus_common::crd::FederatedAuth;
use nimbus_common::Error;
use nimbus_federated_auth::{Connection, ConnectionProvider};

use crate::management_api::{Credentials, HttpManagementApi};

/// Secret key holding the organization id
pub const ORG_ID_KEY: &str = "orgId";
/// Secret key holding the OAuth client id
pub const CLIENT_ID_KEY: &str = "clientId";
/// Secret key holding the OAuth client secret
pub const CLIENT_SECRET_KEY: &str = "clientSecret";

/// Read service account credentials from a Secret
///
/// Values are trimmed; a missing, empty or non-UTF-8 key is an error.
pub fn credentials_from_secret(secret: &Secret) -> Result<Credentials, String> {
    Ok(Credentials {
        org_id: secret_value(secret, ORG_ID_KEY)?.to_string(),
        client_id: secret_value(secret, CLIENT_ID_KEY)?.to_string(),
        client_secret: Zeroizing::new(secret_value(secret, CLIENT_SECRET_KEY)?.to_string()),
    })
}

fn secret_value<'a>(secret: &'a Secret, key: &str) -> Result<&'a str, String> {
    let bytes = secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .ok_or_else(|| format!("missing key {key}"))?;
    let text = std::str::from_utf8(&bytes.0)
        .map_err(|_| format!("key {key} is not valid UTF-8"))?
        .trim();
    if text.is_empty() {
        return Err(format!("key {key} is empty"));
    }
    Ok(text)
}

/// Service account a cached client belongs to
type AccountKey = (String, String);

/// Management API clients, one per service account
///
/// A rotated client secret replaces the account's client, dropping the old
/// secret and its cached access token.
struct ClientCache {
    api_base_url: Url,
    request_timeout: Duration,
    clients: DashMap<AccountKey, Arc<HttpManagementApi>>,
}

impl ClientCache {
    fn new(api_base_url: Url, request_timeout: Duration) -> Self {
        Self {
            api_base_url,
            request_timeout,
            clients: DashMap::new(),
        }
    }

    fn client_for(&self, credentials: Credentials) -> Result<Arc<HttpManagementApi>, Error> {
        let key = (credentials.org_id.clone(), credentials.client_id.clone());
        if let Some(existing) = self.clients.get(&key) {
            if existing.uses(&credentials) {
                return Ok(existing.clone());
            }
            debug!(client_id = %key.1, "connection secret rotated, replacing client");
        }

        let api = Arc::new(
            HttpManagementApi::new(self.api_base_url.clone(), credentials, self.request_timeout)
                .map_err(|e| Error::internal_with_context("management-api", e.to_string()))?,
        );
        self.clients.insert(key, api.clone());
        Ok(api)
    }
}

/// [`ConnectionProvider`] backed by Kubernetes Secrets
pub struct SecretConnectionProvider {
    client: Client,
    clients: ClientCache,
}

impl SecretConnectionProvider {
    /// Create a provider talking to the management API at `api_base_url`
    pub fn new(client: Client, api_base_url: Url, request_timeout: Duration) -> Self {
        Self {
            client,
            clients: ClientCache::new(api_base_url, request_timeout),
        }
    }
}

#[async_trait]
impl ConnectionProvider for SecretConnectionProvider {
    async fn connect(&self, fedauth: &FederatedAuth) -> Result<Connection, Error> {
        let own_namespace = fedauth.namespace().unwrap_or_default();
        let secret_ref = &fedauth.spec.connection_secret_ref;
        let namespace = secret_ref.namespace_or(&own_namespace);
        let resource = format!("{namespace}/{}", secret_ref.name);

        if secret_ref.name.is_empty() {
            return Err(Error::connection_for(resource, "connectionSecretRef.name is empty"));
        }

        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = secrets
            .get_opt(&secret_ref.name)
            .await?
            .ok_or_else(|| Error::connection_for(&resource, "secret not found"))?;

        let credentials =
            credentials_from_secret(&secret).map_err(|msg| Error::connection_for(&resource, msg))?;
        debug!(secret = %resource, org_id = %credentials.org_id, "loaded connection secret");

        let api = self.clients.client_for(credentials)?;
        Ok(Connection {
            org_id: api.org_id().to_string(),
            api: api.clone(),
            projects: api,
        })
    }
}
