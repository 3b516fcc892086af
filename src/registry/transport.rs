//! Transport API for the registry endpoints the mirror speaks to
//!
//! [`RegistryTransport`] is the only place HTTP happens. The operations in
//! [`crate::registry::operations`] are written against the trait so they can
//! run over [`StandardRegistryTransport`] in production and over an
//! in-memory registry in tests.

use crate::cli::config::{AuthConfig, RegistryConfig};
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{RegistryError, Result};
use crate::registry::auth::{AuthChallenge, TokenRequest, TokenResponse};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, WWW_AUTHENTICATE};
use std::future::Future;
use std::time::Duration;

/// Registry operations used by the mirror
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    /// Ask the token endpoint for a bearer token
    async fn request_token(
        &self,
        request: &TokenRequest,
        credentials: Option<&AuthConfig>,
    ) -> Result<TokenResponse>;

    /// GET /v2/{repository}/manifests/{reference}
    async fn get_manifest(&self, request: &ManifestRequest) -> Result<ManifestResponse>;

    /// PUT /v2/{repository}/manifests/{reference}
    async fn put_manifest(&self, request: &ManifestPutRequest) -> Result<PutResponse>;

    /// POST /v2/{target}/blobs/uploads/?mount={digest}&from={source}
    ///
    /// Returns the success or redirect status the registry answered with.
    async fn mount_blob(&self, request: &BlobMountRequest) -> Result<u16>;
}

/// Manifest request parameters
#[derive(Debug, Clone)]
pub struct ManifestRequest {
    pub repository: String,
    pub reference: String, // tag or digest
    pub accept_types: Vec<String>,
    pub token: String,
}

/// Manifest response data
#[derive(Debug, Clone)]
pub struct ManifestResponse {
    pub data: Vec<u8>,
    pub digest: Option<String>,
}

/// Manifest upload request
#[derive(Debug, Clone)]
pub struct ManifestPutRequest {
    pub repository: String,
    pub reference: String,
    pub data: Vec<u8>,
    pub content_type: String,
    pub token: String,
}

/// Registry answer to a manifest upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResponse {
    pub status: u16,
    pub body: String,
    pub digest: Option<String>,
}

/// Cross-repository blob mount request
#[derive(Debug, Clone)]
pub struct BlobMountRequest {
    pub source_repository: String,
    pub target_repository: String,
    pub digest: String,
    pub token: String,
}

/// Bounded retry for transient failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RegistryConfig) -> Self {
        Self {
            max_attempts: config.retry_attempts.max(1),
            base_delay: config.retry_base_delay(),
        }
    }
}

/// reqwest-backed transport for one registry host
pub struct StandardRegistryTransport {
    client: reqwest::Client,
    base_url: String,
    token_url: String,
    service: String,
    retry: RetryPolicy,
}

impl StandardRegistryTransport {
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(format!("image-mirror/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RegistryError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            token_url: config
                .token_url
                .clone()
                .unwrap_or_else(|| config.default_token_url()),
            service: config.service.clone(),
            retry: RetryPolicy::from_config(config),
        })
    }

    /// Use the realm and service announced by a registry challenge
    pub fn with_token_endpoint(mut self, realm: String, service: Option<String>) -> Self {
        self.token_url = realm;
        if let Some(service) = service {
            self.service = service;
        }
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Probe `GET /v2/` for a bearer challenge naming the token endpoint
    pub async fn discover_challenge(&self) -> Result<Option<AuthChallenge>> {
        let url = format!("{}/v2/", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "Registry probe"))?;

        tracing::debug!(status = response.status().as_u16(), "registry probe answered");

        if response.status() != reqwest::StatusCode::UNAUTHORIZED {
            return Ok(None);
        }

        Ok(response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|h| h.to_str().ok())
            .and_then(AuthChallenge::parse))
    }

    fn manifest_url(&self, repository: &str, reference: &str) -> String {
        format!("{}/v2/{}/manifests/{}", self.base_url, repository, reference)
    }

    /// Run `operation` until it succeeds, fails permanently, or the retry
    /// budget is exhausted
    async fn with_retry<T, F, Fut>(&self, operation: &str, f: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match f().await {
                Err(err) if err.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = HttpErrorHandler::retry_delay(attempt, self.retry.base_delay);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient registry failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn request_token_once(
        &self,
        request: &TokenRequest,
        credentials: Option<&AuthConfig>,
    ) -> Result<TokenResponse> {
        let mut url = url::Url::parse(&self.token_url)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("service", &self.service);
            for scope in request.scope_params() {
                query.append_pair("scope", &scope);
            }
        }

        let mut req = self.client.get(url);
        if let Some(auth) = credentials {
            req = req.basic_auth(&auth.username, Some(&auth.password));
        }

        let response = req
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "Token request"))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(HttpErrorHandler::handle_auth_error(status, &error_text));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "Token request"))?;

        serde_json::from_slice(&body).map_err(|e| {
            RegistryError::Protocol(format!("Token response is not valid JSON: {}", e))
        })
    }

    async fn get_manifest_once(&self, request: &ManifestRequest) -> Result<ManifestResponse> {
        let url = self.manifest_url(&request.repository, &request.reference);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, request.accept_types.join(", "))
            .bearer_auth(&request.token)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "Manifest fetch"))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(HttpErrorHandler::handle_manifest_fetch_error(
                status,
                &error_text,
                &request.repository,
                &request.reference,
            ));
        }

        let digest = header_string(response.headers(), "docker-content-digest");

        let data = response
            .bytes()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "Manifest fetch"))?
            .to_vec();

        Ok(ManifestResponse { data, digest })
    }

    async fn put_manifest_once(&self, request: &ManifestPutRequest) -> Result<PutResponse> {
        let url = self.manifest_url(&request.repository, &request.reference);

        let response = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, &request.content_type)
            .bearer_auth(&request.token)
            .body(request.data.clone())
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "Manifest publish"))?;

        let status = response.status();
        let digest = header_string(response.headers(), "docker-content-digest");
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read response".to_string());

        if !status.is_success() {
            return Err(HttpErrorHandler::handle_registry_error(
                status,
                &body,
                "Manifest publish",
            ));
        }

        Ok(PutResponse {
            status: status.as_u16(),
            body,
            digest,
        })
    }

    async fn mount_blob_once(&self, request: &BlobMountRequest) -> Result<u16> {
        let url = format!(
            "{}/v2/{}/blobs/uploads/?mount={}&from={}",
            self.base_url, request.target_repository, request.digest, request.source_repository
        );

        let response = self
            .client
            .post(&url)
            .header(CONTENT_LENGTH, 0)
            .bearer_auth(&request.token)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "Blob mount"))?;

        let status = response.status();
        if status.is_success() || status.is_redirection() {
            return Ok(status.as_u16());
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());
        Err(HttpErrorHandler::handle_registry_error(
            status,
            &error_text,
            "Blob mount",
        ))
    }
}

fn header_string(headers: &reqwest::header::HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
}

#[async_trait]
impl RegistryTransport for StandardRegistryTransport {
    async fn request_token(
        &self,
        request: &TokenRequest,
        credentials: Option<&AuthConfig>,
    ) -> Result<TokenResponse> {
        self.with_retry("token request", || {
            self.request_token_once(request, credentials)
        })
        .await
    }

    async fn get_manifest(&self, request: &ManifestRequest) -> Result<ManifestResponse> {
        self.with_retry("manifest fetch", || self.get_manifest_once(request))
            .await
    }

    async fn put_manifest(&self, request: &ManifestPutRequest) -> Result<PutResponse> {
        self.with_retry("manifest publish", || self.put_manifest_once(request))
            .await
    }

    async fn mount_blob(&self, request: &BlobMountRequest) -> Result<u16> {
        self.with_retry("blob mount", || self.mount_blob_once(request))
            .await
    }
}
