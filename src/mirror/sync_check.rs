//! Digest-based sync check
//!
//! A tag is in sync when the source and destination manifests reference the
//! same digest set. Tags that are not become entries of a
//! [`RemediationPlan`]; nothing is pushed from here.

use crate::cli::config::{AuthConfig, MirrorConfig};
use crate::error::{RegistryError, Result};
use crate::logging::{EventSink, MirrorEvent};
use crate::mirror::plan::{PlanEntry, RemediationPlan};
use crate::registry::auth::Scope;
use crate::registry::operations::{AuthOperations, ManifestOperations};
use crate::registry::transport::RegistryTransport;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Verdict for one tag
#[derive(Debug, Clone)]
pub enum TagStatus {
    InSync,
    OutOfSync(PlanEntry),
    /// Source could not be read; the tag is left out of the plan
    Skipped(RegistryError),
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub in_sync: Vec<String>,
    pub out_of_sync: Vec<PlanEntry>,
    pub skipped: Vec<(String, RegistryError)>,
}

impl SyncReport {
    pub fn plan(&self) -> RemediationPlan {
        self.out_of_sync.iter().cloned().collect()
    }

    pub fn is_in_sync(&self) -> bool {
        self.out_of_sync.is_empty() && self.skipped.is_empty()
    }
}

pub struct SyncPlanner {
    config: MirrorConfig,
    auth: AuthOperations,
    manifests: ManifestOperations,
    events: Arc<dyn EventSink>,
}

impl SyncPlanner {
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

    /// Check every configured tag in order
    pub async fn check_tags(&self) -> SyncReport {
        let mut report = SyncReport::default();
        for tag in &self.config.tags {
            match self.check_tag(tag).await {
                TagStatus::InSync => report.in_sync.push(tag.clone()),
                TagStatus::OutOfSync(entry) => report.out_of_sync.push(entry),
                TagStatus::Skipped(e) => report.skipped.push((tag.clone(), e)),
            }
        }
        report
    }

    pub async fn check_tag(&self, tag: &str) -> TagStatus {
        let source = match self.source_digests(tag).await {
            Ok(set) => set,
            Err(e) => {
                self.events.emit(MirrorEvent::TagSkipped {
                    tag: tag.to_string(),
                    error: e.to_string(),
                });
                return TagStatus::Skipped(e);
            }
        };

        // an absent destination needs a push even when the source set is empty
        let (missing, unexpected) = match self.destination_digests(tag).await {
            Some(destination) if destination == source => {
                self.events.emit(MirrorEvent::TagInSync {
                    tag: tag.to_string(),
                });
                return TagStatus::InSync;
            }
            Some(destination) => (
                source.difference(&destination).count(),
                destination.difference(&source).count(),
            ),
            None => (source.len(), 0),
        };

        self.events.emit(MirrorEvent::TagOutOfSync {
            tag: tag.to_string(),
            missing,
            unexpected,
        });

        TagStatus::OutOfSync(PlanEntry::new(
            &self.config.registry.host,
            &self.config.source_repository,
            &self.config.target_repository,
            tag,
        ))
    }

    /// Digest set of `repository:reference`, read with a fresh pull token
    pub async fn digest_set(
        &self,
        repository: &str,
        reference: &str,
        credentials: Option<&AuthConfig>,
    ) -> Result<BTreeSet<String>> {
        let token = self
            .auth
            .fetch_token(repository, Scope::Pull, credentials)
            .await?;
        let document = self
            .manifests
            .fetch_manifest(repository, reference, &token)
            .await?;
        Ok(document.digest_set())
    }

    async fn source_digests(&self, tag: &str) -> Result<BTreeSet<String>> {
        self.digest_set(
            &self.config.source_repository,
            tag,
            self.config.pull_auth.as_ref(),
        )
        .await
    }

    /// `None` when the destination tag is missing or unreadable
    async fn destination_digests(&self, tag: &str) -> Option<BTreeSet<String>> {
        let target = &self.config.target_repository;
        match self
            .digest_set(target, tag, self.config.push_auth.as_ref())
            .await
        {
            Ok(set) => Some(set),
            Err(e) if e.is_not_found() => {
                tracing::debug!(repository = %target, tag, "destination tag absent");
                None
            }
            Err(e) => {
                tracing::warn!(
                    repository = %target,
                    tag,
                    error = %e,
                    "destination unreadable, treating as absent"
                );
                None
            }
        }
    }
}
