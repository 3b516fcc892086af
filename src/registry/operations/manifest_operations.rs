//! Manifest operations
//!
//! Implements the two manifest calls the mirror needs:
//! - Manifest download (GET /v2/{name}/manifests/{reference}) with an Accept
//!   list covering OCI and Docker v2 single and multi-platform types
//! - Manifest upload (PUT /v2/{name}/manifests/{reference}) of the exact bytes
//!   that were fetched, after cross-mounting the blobs they reference

use crate::error::Result;
use crate::image::manifest::media_types;
use crate::image::{DigestUtils, ManifestDocument};
use crate::logging::{EventSink, MirrorEvent};
use crate::registry::auth::BearerToken;
use crate::registry::operations::blob_operations::{BlobOperations, MountOutcome};
use crate::registry::transport::{
    ManifestPutRequest, ManifestRequest, PutResponse, RegistryTransport,
};
use std::sync::Arc;

/// Result of a manifest upload
#[derive(Debug, Clone)]
pub struct PublishResult {
    pub response: PutResponse,
    /// Outcome of each blob mount attempted before the PUT
    pub mounts: Vec<(String, MountOutcome)>,
}

#[derive(Clone)]
pub struct ManifestOperations {
    transport: Arc<dyn RegistryTransport>,
    events: Arc<dyn EventSink>,
    blobs: BlobOperations,
}

impl ManifestOperations {
    pub fn new(transport: Arc<dyn RegistryTransport>, events: Arc<dyn EventSink>) -> Self {
        let blobs = BlobOperations::new(Arc::clone(&transport), Arc::clone(&events));
        Self {
            transport,
            events,
            blobs,
        }
    }

    /// Fetch and parse a manifest by tag or digest
    ///
    /// When the reference is a digest, the body is checked against it.
    pub async fn fetch_manifest(
        &self,
        repository: &str,
        reference: &str,
        token: &BearerToken,
    ) -> Result<ManifestDocument> {
        token.ensure_read(repository)?;

        self.events.emit(MirrorEvent::FetchStarted {
            repository: repository.to_string(),
            reference: reference.to_string(),
        });

        match self.fetch_manifest_inner(repository, reference, token).await {
            Ok(document) => {
                self.events.emit(MirrorEvent::FetchDone {
                    repository: repository.to_string(),
                    reference: reference.to_string(),
                    digest: document
                        .registry_digest()
                        .map(str::to_string)
                        .unwrap_or_else(|| document.computed_digest()),
                    bytes: document.raw().len(),
                });
                Ok(document)
            }
            Err(e) => {
                self.events.emit(MirrorEvent::FetchFailed {
                    repository: repository.to_string(),
                    reference: reference.to_string(),
                    error: e.to_string(),
                    not_found: e.is_not_found(),
                });
                Err(e)
            }
        }
    }

    async fn fetch_manifest_inner(
        &self,
        repository: &str,
        reference: &str,
        token: &BearerToken,
    ) -> Result<ManifestDocument> {
        let request = ManifestRequest {
            repository: repository.to_string(),
            reference: reference.to_string(),
            accept_types: media_types::ACCEPTED.iter().map(|t| t.to_string()).collect(),
            token: token.value().to_string(),
        };

        let response = self.transport.get_manifest(&request).await?;

        if DigestUtils::is_digest_reference(reference) {
            DigestUtils::verify_data_integrity(&response.data, reference)?;
        }

        tracing::debug!(
            repository,
            reference,
            bytes = response.data.len(),
            "manifest received"
        );

        Ok(ManifestDocument::parse(response.data)?.with_registry_digest(response.digest))
    }

    /// Mount the document's blobs from `mount_source`, then PUT its bytes
    ///
    /// Mount failures are not errors; a PUT rejection is.
    pub async fn publish_manifest(
        &self,
        repository: &str,
        reference: &str,
        document: &ManifestDocument,
        token: &BearerToken,
        mount_source: &str,
    ) -> Result<PublishResult> {
        token.ensure_write(repository)?;

        let mounts = self
            .blobs
            .mount_all(&document.blob_digests(), mount_source, token)
            .await;

        let request = ManifestPutRequest {
            repository: repository.to_string(),
            reference: reference.to_string(),
            data: document.raw().to_vec(),
            content_type: document.content_type().to_string(),
            token: token.value().to_string(),
        };

        match self.transport.put_manifest(&request).await {
            Ok(response) => {
                self.events.emit(MirrorEvent::PublishDone {
                    repository: repository.to_string(),
                    reference: reference.to_string(),
                    status: response.status,
                });
                Ok(PublishResult { response, mounts })
            }
            Err(e) => {
                self.events.emit(MirrorEvent::PublishFailed {
                    repository: repository.to_string(),
                    reference: reference.to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}
