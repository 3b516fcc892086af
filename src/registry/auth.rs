//! Bearer token model for registry access
//!
//! Registries following the Docker token scheme hand out short-lived bearer
//! tokens scoped to `repository:<name>:<actions>`. A [`BearerToken`] remembers
//! the repository and actions it was issued for so that a pull token can
//! never be presented for a write, nor a token reused on another repository.

use crate::error::{RegistryError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Actions requested on a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Pull,
    Push,
    PullPush,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Pull => "pull",
            Scope::Push => "push",
            Scope::PullPush => "pull,push",
        }
    }

    pub fn allows_pull(&self) -> bool {
        matches!(self, Scope::Pull | Scope::PullPush)
    }

    pub fn allows_push(&self) -> bool {
        matches!(self, Scope::Push | Scope::PullPush)
    }

    /// Scope string understood by the token endpoint
    pub fn for_repository(&self, repository: &str) -> String {
        format!("repository:{}:{}", repository, self.as_str())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to ask the token endpoint for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub repository: String,
    pub scope: Scope,
    /// Further scopes granted by the same token, e.g. read access to the
    /// repository blobs are mounted from
    pub additional_scopes: Vec<(String, Scope)>,
}

impl TokenRequest {
    pub fn new(repository: impl Into<String>, scope: Scope) -> Self {
        Self {
            repository: repository.into(),
            scope,
            additional_scopes: Vec::new(),
        }
    }

    pub fn with_additional_scope(mut self, repository: impl Into<String>, scope: Scope) -> Self {
        self.additional_scopes.push((repository.into(), scope));
        self
    }

    /// Every `scope` query parameter, primary scope first
    pub fn scope_params(&self) -> Vec<String> {
        std::iter::once(self.scope.for_repository(&self.repository))
            .chain(
                self.additional_scopes
                    .iter()
                    .map(|(repository, scope)| scope.for_repository(repository)),
            )
            .collect()
    }
}

/// Token endpoint response body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl TokenResponse {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    /// `token` as specified by the Docker scheme, `access_token` for OAuth2
    pub fn into_token(self) -> Option<String> {
        self.token
            .or(self.access_token)
            .filter(|token| !token.is_empty())
    }
}

/// A token bound to the repository and actions it was issued for
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
    value: String,
    repository: String,
    scope: Scope,
}

impl BearerToken {
    pub fn new(value: impl Into<String>, repository: impl Into<String>, scope: Scope) -> Self {
        Self {
            value: value.into(),
            repository: repository.into(),
            scope,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    fn ensure_repository(&self, repository: &str) -> Result<()> {
        if self.repository != repository {
            return Err(RegistryError::Authorization(format!(
                "token issued for {} cannot be used on {}",
                self.repository, repository
            )));
        }
        Ok(())
    }

    pub fn ensure_read(&self, repository: &str) -> Result<()> {
        self.ensure_repository(repository)?;
        if !self.scope.allows_pull() {
            return Err(RegistryError::Authorization(format!(
                "token for {} has scope '{}' and cannot read",
                self.repository, self.scope
            )));
        }
        Ok(())
    }

    pub fn ensure_write(&self, repository: &str) -> Result<()> {
        self.ensure_repository(repository)?;
        if !self.scope.allows_push() {
            return Err(RegistryError::Authorization(format!(
                "token for {} has scope '{}' and cannot write",
                self.repository, self.scope
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("repository", &self.repository)
            .field("scope", &self.scope)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Parsed `WWW-Authenticate: Bearer ...` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

impl AuthChallenge {
    /// Parse `Bearer realm="...",service="...",scope="..."`
    ///
    /// Quoted values may themselves contain commas (`pull,push`).
    pub fn parse(header: &str) -> Option<Self> {
        let params_str = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))?;

        let mut params = HashMap::new();
        let mut key = String::new();
        let mut value = String::new();
        let mut in_value = false;
        let mut in_quotes = false;

        for c in params_str.chars() {
            match c {
                '"' if in_value => in_quotes = !in_quotes,
                '=' if !in_value => in_value = true,
                ',' if !in_quotes => {
                    params.insert(key.trim().to_lowercase(), value.clone());
                    key.clear();
                    value.clear();
                    in_value = false;
                }
                _ if in_value => value.push(c),
                _ => key.push(c),
            }
        }
        if !key.trim().is_empty() {
            params.insert(key.trim().to_lowercase(), value);
        }

        let realm = params.remove("realm")?;
        Some(Self {
            realm,
            service: params.remove("service"),
            scope: params.remove("scope"),
        })
    }
}
