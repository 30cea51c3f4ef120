//! HTTP client for the managed database service's management API
//!
//! Authenticates with OAuth2 client credentials and implements the
//! reconciler's [`FederationApi`] and [`ProjectLookup`] capabilities.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, trace};
use url::Url;
use zeroize::Zeroizing;

use nimbus_federated_auth::api::{
    ConnectedOrgConfig, FederationSettings, IdentityProviderSettings, Project, ResolvedOrgConfig,
};
use nimbus_federated_auth::{ApiError, FederationApi, ProjectLookup};

/// Versioned media type the API is pinned to
pub const API_MEDIA_TYPE: &str = "application/vnd.atlas.2023-01-01+json";

/// Refresh the access token this long before it expires
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Service account credentials read from a connection secret
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Organization the service account belongs to
    pub org_id: String,
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret (zeroized on drop)
    pub client_secret: Zeroizing<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("org_id", &self.org_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: Zeroizing<String>,
    refresh_at: Instant,
}

/// Error body returned by the API
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

/// Management API client bound to one service account
pub struct HttpManagementApi {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    token: Mutex<Option<CachedToken>>,
}

impl HttpManagementApi {
    /// Create a client with its own connection pool
    pub fn new(base_url: Url, credentials: Credentials, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("nimbus-operator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(http, base_url, credentials))
    }

    /// Create a client on top of an existing HTTP client
    pub fn with_client(http: reqwest::Client, base_url: Url, credentials: Credentials) -> Self {
        Self {
            http,
            base_url,
            credentials,
            token: Mutex::new(None),
        }
    }

    /// Organization the credentials belong to
    pub fn org_id(&self) -> &str {
        &self.credentials.org_id
    }

    /// Whether this client was built from `credentials`
    pub fn uses(&self, credentials: &Credentials) -> bool {
        self.credentials == *credentials
    }

    /// Build an endpoint URL, percent-encoding each segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Transport(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn access_token(&self) -> Result<Zeroizing<String>, ApiError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let url = self.endpoint(&["api", "oauth", "token"])?;
        debug!(client_id = %self.credentials.client_id, "requesting access token");

        let response = self
            .http
            .post(url)
            .basic_auth(
                &self.credentials.client_id,
                Some(self.credentials.client_secret.as_str()),
            )
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| ApiError::Transport(format!("token request failed: {e}")))?;

        let token: TokenResponse = decode(response).await?;
        let value = Zeroizing::new(token.access_token);
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        *cached = Some(CachedToken {
            value: value.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        });

        Ok(value)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let request = self.http.get(self.endpoint(segments)?);
        self.send(request).await
    }

    async fn patch<B, T>(&self, segments: &[&str], body: &B) -> Result<T, ApiError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let body = serde_json::to_vec(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        let request = self
            .http
            .patch(self.endpoint(segments)?)
            .header(CONTENT_TYPE, API_MEDIA_TYPE)
            .body(body);
        self.send(request).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let token = self.access_token().await?;
        let request = request
            .bearer_auth(token.as_str())
            .header(ACCEPT, API_MEDIA_TYPE)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        trace!(method = %request.method(), url = %request.url(), "management API request");

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        decode(response).await
    }
}

/// Decode a success body, or map an error response to [`ApiError`]
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::Transport(format!("failed to read response: {e}")))?;

    if !status.is_success() {
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap_or_default();
        return Err(ApiError::from_response(
            status.as_u16(),
            body.error_code.as_deref().unwrap_or_default(),
            body.detail
                .as_deref()
                .unwrap_or_else(|| status.canonical_reason().unwrap_or_default()),
        ));
    }

    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

const V2: [&str; 3] = ["api", "atlas", "v2"];

fn v2<'a>(rest: &[&'a str]) -> Vec<&'a str> {
    let mut path: Vec<&'a str> = V2.to_vec();
    path.extend_from_slice(rest);
    path
}

#[async_trait]
impl FederationApi for HttpManagementApi {
    async fn federation_settings(&self, org_id: &str) -> Result<FederationSettings, ApiError> {
        self.get(&v2(&["orgs", org_id, "federationSettings"])).await
    }

    async fn connected_org_config(
        &self,
        settings_id: &str,
        org_id: &str,
    ) -> Result<ConnectedOrgConfig, ApiError> {
        self.get(&v2(&["federationSettings", settings_id, "connectedOrgConfigs", org_id]))
            .await
    }

    async fn update_connected_org_config(
        &self,
        settings_id: &str,
        org_id: &str,
        config: &ResolvedOrgConfig,
    ) -> Result<ConnectedOrgConfig, ApiError> {
        self.patch(
            &v2(&["federationSettings", settings_id, "connectedOrgConfigs", org_id]),
            config,
        )
        .await
    }

    async fn identity_provider(
        &self,
        settings_id: &str,
        idp_id: &str,
    ) -> Result<IdentityProviderSettings, ApiError> {
        self.get(&v2(&["federationSettings", settings_id, "identityProviders", idp_id]))
            .await
    }

    async fn update_identity_provider(
        &self,
        settings_id: &str,
        idp_id: &str,
        settings: &IdentityProviderSettings,
    ) -> Result<IdentityProviderSettings, ApiError> {
        self.patch(
            &v2(&["federationSettings", settings_id, "identityProviders", idp_id]),
            settings,
        )
        .await
    }
}

#[async_trait]
impl ProjectLookup for HttpManagementApi {
    async fn project_by_name(&self, name: &str) -> Result<Project, ApiError> {
        self.get(&v2(&["groups", "byName", name])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpManagementApi {
        HttpManagementApi::with_client(
            reqwest::Client::new(),
            Url::parse(base).unwrap(),
            Credentials {
                org_id: "org-1".to_string(),
                client_id: "mdb_sa_id".to_string(),
                client_secret: Zeroizing::new("s3cr3t".to_string()),
            },
        )
    }

    #[test]
    fn endpoints_are_built_from_segments() {
        let api = client("https://cloud.example.com");
        let url = api
            .endpoint(&v2(&["federationSettings", "fs-1", "connectedOrgConfigs", "org-1"]))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://cloud.example.com/api/atlas/v2/federationSettings/fs-1/connectedOrgConfigs/org-1"
        );
    }

    #[test]
    fn base_url_path_prefix_is_kept() {
        let api = client("http://localhost:8080/proxy/");
        let url = api.endpoint(&["api", "oauth", "token"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/proxy/api/oauth/token");
    }

    #[test]
    fn project_names_are_percent_encoded() {
        let api = client("https://cloud.example.com");
        let url = api.endpoint(&v2(&["groups", "byName", "team a/b"])).unwrap();
        assert_eq!(
            url.as_str(),
            "https://cloud.example.com/api/atlas/v2/groups/byName/team%20a%2Fb"
        );
    }

    #[test]
    fn credentials_debug_hides_the_secret() {
        let rendered = format!("{:?}", client("https://cloud.example.com").credentials);
        assert!(rendered.contains("mdb_sa_id"));
        assert!(!rendered.contains("s3cr3t"));
    }

    #[tokio::test]
    async fn error_bodies_map_to_api_errors() {
        let not_found = http_response(
            404,
            r#"{"error":404,"errorCode":"GROUP_NAME_NOT_FOUND","detail":"No group with name payments"}"#,
        );
        assert_eq!(
            decode::<Project>(not_found).await,
            Err(ApiError::NotFound("No group with name payments".to_string()))
        );

        let unauthorized = http_response(401, "not json");
        assert_eq!(
            decode::<Project>(unauthorized).await,
            Err(ApiError::Status {
                status: 401,
                error_code: String::new(),
                detail: "Unauthorized".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn success_bodies_are_decoded() {
        let ok = http_response(200, r#"{"id":"p-1","name":"payments","orgId":"org-1"}"#);
        let project: Project = decode(ok).await.unwrap();
        assert_eq!(project.id, "p-1");

        let garbage = http_response(200, "{");
        assert!(matches!(
            decode::<Project>(garbage).await,
            Err(ApiError::Decode(_))
        ));
    }

    fn http_response(status: u16, body: &'static str) -> Response {
        Response::from(
            http::Response::builder()
                .status(status)
                .body(body)
                .unwrap(),
        )
    }
}
