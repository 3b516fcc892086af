//! Authentication operations
//!
//! Exchanges optional Basic credentials for a repository-scoped bearer token.
//! Credentials are only ever sent to the token endpoint; every other request
//! carries the resulting [`BearerToken`].

use crate::cli::config::AuthConfig;
use crate::error::{RegistryError, Result};
use crate::logging::{EventSink, MirrorEvent};
use crate::registry::auth::{BearerToken, Scope, TokenRequest};
use crate::registry::transport::RegistryTransport;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthOperations {
    transport: Arc<dyn RegistryTransport>,
    events: Arc<dyn EventSink>,
}

impl AuthOperations {
    pub fn new(transport: Arc<dyn RegistryTransport>, events: Arc<dyn EventSink>) -> Self {
        Self { transport, events }
    }

    /// Token for `scope` on a single repository
    pub async fn fetch_token(
        &self,
        repository: &str,
        scope: Scope,
        credentials: Option<&AuthConfig>,
    ) -> Result<BearerToken> {
        self.fetch_token_for(&TokenRequest::new(repository, scope), credentials)
            .await
    }

    /// Token for a request that may cover further repositories
    ///
    /// The returned token is bound to the primary repository and scope.
    pub async fn fetch_token_for(
        &self,
        request: &TokenRequest,
        credentials: Option<&AuthConfig>,
    ) -> Result<BearerToken> {
        tracing::debug!(
            repository = %request.repository,
            scope = %request.scope,
            authenticated = credentials.is_some(),
            "requesting registry token"
        );

        let response = self.transport.request_token(request, credentials).await?;
        let value = response.into_token().ok_or_else(|| {
            RegistryError::Protocol(format!(
                "Token endpoint returned no token for {}",
                request.scope.for_repository(&request.repository)
            ))
        })?;

        self.events.emit(MirrorEvent::TokenIssued {
            repository: request.repository.clone(),
            scope: request.scope,
        });

        Ok(BearerToken::new(value, &request.repository, request.scope))
    }

    /// Token allowed to publish into `target` with blobs mounted from `source`
    pub async fn fetch_publish_token(
        &self,
        target: &str,
        source: &str,
        credentials: Option<&AuthConfig>,
    ) -> Result<BearerToken> {
        let request =
            TokenRequest::new(target, Scope::PullPush).with_additional_scope(source, Scope::Pull);
        self.fetch_token_for(&request, credentials).await
    }
}
