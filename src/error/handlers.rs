//! Standardized mapping from HTTP failures to registry errors

use crate::error::RegistryError;
use reqwest::StatusCode;
use std::time::Duration;

/// Standard error handler for HTTP responses
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Handle token endpoint failures
    pub fn handle_auth_error(status: StatusCode, error_text: &str) -> RegistryError {
        let context = match status.as_u16() {
            400 => "Token request (invalid scope or service)",
            401 => "Token request (invalid credentials)",
            403 => "Token request (access denied)",
            404 => "Token request (endpoint not found)",
            _ => "Token request",
        };

        RegistryError::Transport {
            context: context.to_string(),
            status: status.as_u16(),
            body: error_text.to_string(),
        }
    }

    /// Handle registry API failures for the given operation
    pub fn handle_registry_error(
        status: StatusCode,
        error_text: &str,
        operation: &str,
    ) -> RegistryError {
        let context = match status.as_u16() {
            401 => format!("{} (unauthorized)", operation),
            403 => format!("{} (forbidden)", operation),
            404 => format!("{} (not found)", operation),
            429 => format!("{} (rate limited)", operation),
            500 => format!("{} (registry server error)", operation),
            502 | 503 => format!("{} (registry unavailable)", operation),
            _ => operation.to_string(),
        };

        RegistryError::Transport {
            context,
            status: status.as_u16(),
            body: error_text.to_string(),
        }
    }

    /// Manifest reads distinguish an absent reference from other failures
    pub fn handle_manifest_fetch_error(
        status: StatusCode,
        error_text: &str,
        repository: &str,
        reference: &str,
    ) -> RegistryError {
        if status == StatusCode::NOT_FOUND {
            RegistryError::not_found(repository, reference)
        } else {
            Self::handle_registry_error(status, error_text, "Manifest fetch")
        }
    }

    /// Exponential backoff delay for the given retry attempt (1-based)
    pub fn retry_delay(attempt: u32, base_delay: Duration) -> Duration {
        let backoff_multiplier = 2_u32.pow(attempt.saturating_sub(1).min(4));
        base_delay * backoff_multiplier
    }
}

/// Network error categorization and handling
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    /// Categorize and format network errors with helpful context
    pub fn handle_network_error(error: &reqwest::Error, context: &str) -> RegistryError {
        let message = if error.is_timeout() {
            format!("{} timeout: {}", context, error)
        } else if error.is_connect() {
            format!("Connection error during {}: {}", context, error)
        } else if error.to_string().contains("dns") {
            format!("DNS resolution error for {}: {}", context, error)
        } else if error.to_string().contains("certificate") {
            format!("TLS certificate error during {}: {}", context, error)
        } else {
            format!("{} network error: {}", context, error)
        };

        RegistryError::Network {
            message,
            timed_out: error.is_timeout(),
        }
    }
}
