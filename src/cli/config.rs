//! Configuration management module
//!
//! Everything a mirror or sync-check run needs is collected once into an
//! immutable [`MirrorConfig`] and handed to the orchestrator and planner.

use crate::error::{RegistryError, Result};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Authentication configuration
#[derive(Clone)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

impl AuthConfig {
    pub fn new(username: String, password: String) -> Self {
        Self { username, password }
    }

    /// Build from a username/password pair where either side may be missing
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Result<Option<Self>> {
        match (username, password) {
            (Some(username), Some(password)) => {
                let auth = Self::new(username, password);
                auth.validate()?;
                Ok(Some(auth))
            }
            (None, None) => Ok(None),
            (Some(_), None) => Err(RegistryError::Validation(
                "Password is required when username is provided".to_string(),
            )),
            (None, Some(_)) => Err(RegistryError::Validation(
                "Username is required when password is provided".to_string(),
            )),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(RegistryError::Validation(
                "Username cannot be empty".to_string(),
            ));
        }
        if self.password.is_empty() {
            return Err(RegistryError::Validation(
                "Password cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Registry host, optionally with port (`ghcr.io`, `localhost:5000`)
    pub host: String,
    /// `service` parameter sent to the token endpoint
    pub service: String,
    /// Explicit token endpoint; discovered from the registry when absent
    pub token_url: Option<String>,
    /// Talk plain HTTP instead of HTTPS
    pub insecure_http: bool,
    /// Per-request timeout in seconds
    pub timeout: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
}

impl RegistryConfig {
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into();
        Self {
            service: host.clone(),
            host,
            token_url: None,
            insecure_http: false,
            timeout: 30,
            retry_attempts: 3,
            retry_base_delay_ms: 500,
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    pub fn with_token_url(mut self, token_url: Option<String>) -> Self {
        self.token_url = token_url;
        self
    }

    pub fn with_insecure_http(mut self, insecure_http: bool) -> Self {
        self.insecure_http = insecure_http;
        self
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, attempts: u32, base_delay_ms: u64) -> Self {
        self.retry_attempts = attempts;
        self.retry_base_delay_ms = base_delay_ms;
        self
    }

    pub fn base_url(&self) -> String {
        let scheme = if self.insecure_http { "http" } else { "https" };
        format!("{}://{}", scheme, self.host)
    }

    /// `{base}/token`, the endpoint used by ghcr.io and most token registries
    pub fn default_token_url(&self) -> String {
        format!("{}/token", self.base_url())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(RegistryError::Validation(
                "Registry host cannot be empty".to_string(),
            ));
        }

        if self.host.contains("://") || self.host.contains('/') {
            return Err(RegistryError::Validation(format!(
                "Invalid registry host: {}. Expected a bare host such as ghcr.io",
                self.host
            )));
        }

        if let Some(token_url) = &self.token_url {
            url::Url::parse(token_url).map_err(|e| {
                RegistryError::Validation(format!("Invalid token URL {}: {}", token_url, e))
            })?;
        }

        if self.timeout == 0 {
            return Err(RegistryError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if self.retry_attempts == 0 {
            return Err(RegistryError::Validation(
                "retry_attempts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Immutable settings for one mirror or sync-check invocation
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub registry: RegistryConfig,
    pub source_repository: String,
    pub target_repository: String,
    pub tags: Vec<String>,
    /// Credentials for reading the source; anonymous when absent
    pub pull_auth: Option<AuthConfig>,
    /// Credentials for the destination
    pub push_auth: Option<AuthConfig>,
    /// Upper bound on concurrent sub-manifest transfers
    pub max_concurrent: usize,
    /// Where the sync-check remediation script is written
    pub script_path: Option<PathBuf>,
}

impl MirrorConfig {
    pub fn new(
        registry: RegistryConfig,
        source_repository: impl Into<String>,
        target_repository: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            source_repository: source_repository.into(),
            target_repository: target_repository.into(),
            tags: Vec::new(),
            pull_auth: None,
            push_auth: None,
            max_concurrent: 4,
            script_path: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pull_auth(mut self, auth: Option<AuthConfig>) -> Self {
        self.pull_auth = auth;
        self
    }

    pub fn with_push_auth(mut self, auth: Option<AuthConfig>) -> Self {
        self.push_auth = auth;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_script_path(mut self, path: Option<PathBuf>) -> Self {
        self.script_path = path;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.registry.validate()?;

        for (label, repository) in [
            ("Source", &self.source_repository),
            ("Target", &self.target_repository),
        ] {
            if repository.is_empty() {
                return Err(RegistryError::Validation(format!(
                    "{} repository cannot be empty",
                    label
                )));
            }
            if repository.contains(':') || repository.contains('@') {
                return Err(RegistryError::Validation(format!(
                    "{} repository must not carry a tag or digest: {}",
                    label, repository
                )));
            }
        }

        if self.source_repository == self.target_repository {
            return Err(RegistryError::Validation(
                "Source and target repositories must differ".to_string(),
            ));
        }

        if self.tags.is_empty() {
            return Err(RegistryError::Validation(
                "At least one tag must be given".to_string(),
            ));
        }

        if let Some(tag) = self.tags.iter().find(|t| t.is_empty()) {
            return Err(RegistryError::Validation(format!(
                "Invalid empty tag in tag list: {:?}",
                tag
            )));
        }

        if self.max_concurrent == 0 {
            return Err(RegistryError::Validation(
                "max_concurrent must be greater than 0".to_string(),
            ));
        }

        if let Some(auth) = &self.pull_auth {
            auth.validate()?;
        }
        if let Some(auth) = &self.push_auth {
            auth.validate()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MirrorConfig {
        MirrorConfig::new(RegistryConfig::new("ghcr.io"), "upstream/app", "owner/mirror")
            .with_tags(["server", "light"])
    }

    #[test]
    fn registry_defaults() {
        let registry = RegistryConfig::new("ghcr.io");
        assert_eq!(registry.service, "ghcr.io");
        assert_eq!(registry.base_url(), "https://ghcr.io");
        assert_eq!(registry.default_token_url(), "https://ghcr.io/token");
        assert_eq!(registry.request_timeout(), Duration::from_secs(30));
        assert!(registry.validate().is_ok());
    }

    #[test]
    fn insecure_http_changes_scheme() {
        let registry = RegistryConfig::new("localhost:5000").with_insecure_http(true);
        assert_eq!(registry.base_url(), "http://localhost:5000");
    }

    #[test]
    fn rejects_host_with_scheme() {
        assert!(RegistryConfig::new("https://ghcr.io").validate().is_err());
    }

    #[test]
    fn valid_mirror_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn rejects_same_repository() {
        let cfg = MirrorConfig::new(RegistryConfig::new("ghcr.io"), "a/b", "a/b").with_tags(["x"]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_empty_tags() {
        assert!(config().with_tags(Vec::<String>::new()).validate().is_err());
        assert!(config().with_tags(["ok", ""]).validate().is_err());
    }

    #[test]
    fn rejects_zero_concurrency() {
        assert!(config().with_max_concurrent(0).validate().is_err());
    }

    #[test]
    fn credentials_must_be_paired() {
        assert!(AuthConfig::from_parts(Some("u".into()), None).is_err());
        assert!(AuthConfig::from_parts(None, Some("p".into())).is_err());
        assert!(AuthConfig::from_parts(None, None).unwrap().is_none());
        assert!(AuthConfig::from_parts(Some("u".into()), Some("p".into()))
            .unwrap()
            .is_some());
    }

    #[test]
    fn auth_debug_redacts_password() {
        let auth = AuthConfig::new("user".into(), "hunter2".into());
        assert!(!format!("{:?}", auth).contains("hunter2"));
    }
}
