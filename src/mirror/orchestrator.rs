//! Manifest-graph mirroring
//!
//! Copies one source reference to a destination tag. An index is walked into
//! its per-platform sub-manifests, each republished under its own digest,
//! before the index itself is published. Blob bytes never move: the publisher
//! cross-mounts them from the source repository.

use crate::cli::config::MirrorConfig;
use crate::error::{RegistryError, Result};
use crate::image::{Descriptor, ManifestDocument};
use crate::logging::{EventSink, MirrorEvent};
use crate::registry::auth::{BearerToken, Scope};
use crate::registry::operations::{AuthOperations, ManifestOperations};
use crate::registry::transport::RegistryTransport;
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// Result of mirroring one sub-manifest of an index
#[derive(Debug, Clone)]
pub struct ChildOutcome {
    pub digest: String,
    pub platform: String,
    /// HTTP status of the sub-manifest PUT
    pub result: std::result::Result<u16, RegistryError>,
}

impl ChildOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of a completed mirror run for one reference
#[derive(Debug, Clone)]
pub struct MirrorOutcome {
    pub source_reference: String,
    pub dest_tag: String,
    /// HTTP status of the top-level PUT
    pub status: u16,
    pub body: String,
    /// Digest the destination reported for the top-level manifest
    pub digest: Option<String>,
    /// One entry per index entry, in index order; empty for a single manifest
    pub children: Vec<ChildOutcome>,
}

impl MirrorOutcome {
    pub fn failed_children(&self) -> Vec<&ChildOutcome> {
        self.children.iter().filter(|c| !c.is_success()).collect()
    }

    /// Top-level publish succeeded and so did every child
    pub fn is_complete(&self) -> bool {
        self.children.iter().all(ChildOutcome::is_success)
    }
}

#[derive(Debug)]
pub struct TagReport {
    pub tag: String,
    pub result: std::result::Result<MirrorOutcome, RegistryError>,
}

/// Results of mirroring every configured tag
#[derive(Debug, Default)]
pub struct BatchReport {
    pub tags: Vec<TagReport>,
}

impl BatchReport {
    /// No tag failed fatally
    pub fn is_success(&self) -> bool {
        self.tags.iter().all(|t| t.result.is_ok())
    }

    pub fn failed(&self) -> Vec<&str> {
        self.tags
            .iter()
            .filter(|t| t.result.is_err())
            .map(|t| t.tag.as_str())
            .collect()
    }

    /// Tags published with at least one failed sub-manifest
    pub fn incomplete(&self) -> Vec<&str> {
        self.tags
            .iter()
            .filter(|t| matches!(&t.result, Ok(outcome) if !outcome.is_complete()))
            .map(|t| t.tag.as_str())
            .collect()
    }
}

pub struct MirrorOrchestrator {
    config: MirrorConfig,
    auth: AuthOperations,
    manifests: ManifestOperations,
    events: Arc<dyn EventSink>,
}

impl MirrorOrchestrator {
    pub fn new(
        config: MirrorConfig,
        transport: Arc<dyn RegistryTransport>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            auth: AuthOperations::new(Arc::clone(&transport), Arc::clone(&events)),
            manifests: ManifestOperations::new(transport, Arc::clone(&events)),
            config,
            events,
        }
    }

    /// Mirror every configured tag onto the same tag in the destination
    ///
    /// Tags run one after another with fresh tokens; a failed tag does not
    /// stop the batch.
    pub async fn mirror_tags(&self) -> BatchReport {
        let mut report = BatchReport::default();
        for tag in &self.config.tags {
            let result = self.mirror(tag, tag).await;
            if let Err(e) = &result {
                tracing::error!(tag = %tag, error = %e, "mirroring tag failed");
            }
            report.tags.push(TagReport {
                tag: tag.clone(),
                result,
            });
        }
        report
    }

    /// Mirror `source_reference` from the source repository to `dest_tag`
    ///
    /// Fails only when a token cannot be obtained, the top-level manifest
    /// cannot be fetched, or it cannot be published. Sub-manifest failures
    /// are recorded in the outcome.
    pub async fn mirror(&self, source_reference: &str, dest_tag: &str) -> Result<MirrorOutcome> {
        let source = self.config.source_repository.as_str();
        let target = self.config.target_repository.as_str();

        let pull_token = self
            .auth
            .fetch_token(source, Scope::Pull, self.config.pull_auth.as_ref())
            .await?;
        let push_token = self
            .auth
            .fetch_publish_token(target, source, self.config.push_auth.as_ref())
            .await?;

        let top = self
            .manifests
            .fetch_manifest(source, source_reference, &pull_token)
            .await?;

        let children = if top.is_index() {
            self.events.emit(MirrorEvent::IndexDetected {
                reference: source_reference.to_string(),
                entries: top.index_entries().len(),
            });
            self.mirror_children(&top, &pull_token, &push_token).await
        } else {
            self.events.emit(MirrorEvent::SingleDetected {
                reference: source_reference.to_string(),
                layers: top.layers().len(),
            });
            Vec::new()
        };

        let published = self
            .manifests
            .publish_manifest(target, dest_tag, &top, &push_token, source)
            .await?;

        Ok(MirrorOutcome {
            source_reference: source_reference.to_string(),
            dest_tag: dest_tag.to_string(),
            status: published.response.status,
            body: published.response.body,
            digest: published.response.digest,
            children,
        })
    }

    /// Mirror every index entry, at most `max_concurrent` at a time
    ///
    /// Resolves only after every child has finished.
    async fn mirror_children(
        &self,
        index: &ManifestDocument,
        pull_token: &BearerToken,
        push_token: &BearerToken,
    ) -> Vec<ChildOutcome> {
        stream::iter(
            index
                .index_entries()
                .iter()
                .map(|entry| self.mirror_child(entry, pull_token, push_token)),
        )
        .buffered(self.config.max_concurrent.max(1))
        .collect()
        .await
    }

    async fn mirror_child(
        &self,
        entry: &Descriptor,
        pull_token: &BearerToken,
        push_token: &BearerToken,
    ) -> ChildOutcome {
        let source = self.config.source_repository.as_str();
        let target = self.config.target_repository.as_str();
        let platform = entry.platform_label();

        self.events.emit(MirrorEvent::SubManifestStarted {
            platform: platform.clone(),
            digest: entry.digest.clone(),
        });

        let result: Result<u16> = async {
            let document = self
                .manifests
                .fetch_manifest(source, &entry.digest, pull_token)
                .await?;
            let published = self
                .manifests
                .publish_manifest(target, &entry.digest, &document, push_token, source)
                .await?;
            Ok(published.response.status)
        }
        .await;

        if let Err(e) = &result {
            self.events.emit(MirrorEvent::SubManifestFailed {
                platform: platform.clone(),
                digest: entry.digest.clone(),
                error: e.to_string(),
            });
        }

        ChildOutcome {
            digest: entry.digest.clone(),
            platform,
            result,
        }
    }
}
