//! Blob operations for the mirror
//!
//! Blobs are never copied byte by byte. A manifest push only needs its config
//! and layers to be present in the destination, so they are cross-mounted from
//! the source repository with `POST /v2/{dest}/blobs/uploads/?mount=&from=`.

use crate::logging::{EventSink, MirrorEvent};
use crate::registry::auth::BearerToken;
use crate::registry::transport::{BlobMountRequest, RegistryTransport};
use std::fmt;
use std::sync::Arc;

/// What the registry did with a mount request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOutcome {
    /// 201: blob now present in the destination
    Mounted,
    /// 202: registry opened an upload session instead of mounting
    UploadRequired,
    /// Any other accepted status
    Other(u16),
    /// Request failed; the manifest push will tell whether it mattered
    Failed { error: String },
}

impl MountOutcome {
    pub fn from_status(status: u16) -> Self {
        match status {
            201 => MountOutcome::Mounted,
            202 => MountOutcome::UploadRequired,
            other => MountOutcome::Other(other),
        }
    }

    pub fn is_mounted(&self) -> bool {
        matches!(self, MountOutcome::Mounted)
    }
}

impl fmt::Display for MountOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountOutcome::Mounted => write!(f, "mounted"),
            MountOutcome::UploadRequired => write!(f, "upload required"),
            MountOutcome::Other(status) => write!(f, "HTTP {}", status),
            MountOutcome::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

#[derive(Clone)]
pub struct BlobOperations {
    transport: Arc<dyn RegistryTransport>,
    events: Arc<dyn EventSink>,
}

impl BlobOperations {
    pub fn new(transport: Arc<dyn RegistryTransport>, events: Arc<dyn EventSink>) -> Self {
        Self { transport, events }
    }

    /// Best-effort cross-repository mount of one blob
    ///
    /// Never fails: errors are reported as [`MountOutcome::Failed`].
    pub async fn mount_blob(
        &self,
        digest: &str,
        from_repository: &str,
        token: &BearerToken,
    ) -> MountOutcome {
        let target = token.repository().to_string();

        let outcome = match token.ensure_write(&target) {
            Err(e) => MountOutcome::Failed {
                error: e.to_string(),
            },
            Ok(()) => {
                let request = BlobMountRequest {
                    source_repository: from_repository.to_string(),
                    target_repository: target.clone(),
                    digest: digest.to_string(),
                    token: token.value().to_string(),
                };
                match self.transport.mount_blob(&request).await {
                    Ok(status) => MountOutcome::from_status(status),
                    Err(e) => MountOutcome::Failed {
                        error: e.to_string(),
                    },
                }
            }
        };

        self.events.emit(MirrorEvent::MountAttempted {
            repository: target,
            from: from_repository.to_string(),
            digest: digest.to_string(),
            outcome: outcome.clone(),
        });

        outcome
    }

    /// Mount every digest in order, returning one outcome per digest
    pub async fn mount_all(
        &self,
        digests: &[&str],
        from_repository: &str,
        token: &BearerToken,
    ) -> Vec<(String, MountOutcome)> {
        let mut outcomes = Vec::with_capacity(digests.len());
        for digest in digests {
            let outcome = self.mount_blob(digest, from_repository, token).await;
            outcomes.push((digest.to_string(), outcome));
        }
        outcomes
    }
}
