//! Manifest documents as fetched from a registry
//!
//! A [`ManifestDocument`] keeps the exact bytes the registry returned next
//! to a parsed view of them. Everything that goes back out to a registry is
//! taken from [`ManifestDocument::raw`]; the parsed view is only used to
//! decide what to do (classify, enumerate children and blobs, compare).

use crate::error::{RegistryError, Result};
use crate::image::digest::DigestUtils;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;

/// Media types the mirror needs to recognise
pub mod media_types {
    pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";
    pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
    pub const DOCKER_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
    pub const DOCKER_MANIFEST_LIST: &str =
        "application/vnd.docker.distribution.manifest.list.v2+json";

    /// Accept list for manifest reads, most preferred first
    pub const ACCEPTED: [&str; 4] = [
        OCI_INDEX,
        DOCKER_MANIFEST_V2,
        OCI_MANIFEST,
        DOCKER_MANIFEST_LIST,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Platform {
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub variant: Option<String>,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{}", variant)?;
        }
        Ok(())
    }
}

/// Content descriptor as it appears in `manifests`, `config` and `layers`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub media_type: Option<String>,
    pub digest: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub platform: Option<Platform>,
}

impl Descriptor {
    /// Platform label for logs; attestation entries often have none
    pub fn platform_label(&self) -> String {
        self.platform
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unknown platform".to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestView {
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    manifests: Option<Vec<Descriptor>>,
    #[serde(default)]
    config: Option<Descriptor>,
    #[serde(default)]
    layers: Vec<Descriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ManifestKind {
    /// Multi-platform index; entries point at per-platform manifests
    Index { entries: Vec<Descriptor> },
    /// Single-platform image manifest
    Single {
        config: Option<Descriptor>,
        layers: Vec<Descriptor>,
    },
}

#[derive(Debug, Clone)]
pub struct ManifestDocument {
    raw: Vec<u8>,
    media_type: Option<String>,
    kind: ManifestKind,
    registry_digest: Option<String>,
}

impl ManifestDocument {
    /// Parse a manifest body, keeping the bytes untouched
    pub fn parse(raw: Vec<u8>) -> Result<Self> {
        let view: ManifestView = serde_json::from_slice(&raw)
            .map_err(|e| RegistryError::Parse(format!("Invalid manifest JSON: {}", e)))?;

        let kind = match view.manifests {
            Some(entries) => ManifestKind::Index { entries },
            None => ManifestKind::Single {
                config: view.config,
                layers: view.layers,
            },
        };

        Ok(Self {
            raw,
            media_type: view.media_type,
            kind,
            registry_digest: None,
        })
    }

    /// Record the `Docker-Content-Digest` the registry reported
    pub fn with_registry_digest(mut self, digest: Option<String>) -> Self {
        self.registry_digest = digest;
        self
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn is_index(&self) -> bool {
        matches!(self.kind, ManifestKind::Index { .. })
    }

    /// Content-Type for a PUT of this document
    pub fn content_type(&self) -> &str {
        self.media_type.as_deref().unwrap_or(media_types::OCI_INDEX)
    }

    pub fn registry_digest(&self) -> Option<&str> {
        self.registry_digest.as_deref()
    }

    /// Digest of the exact bytes held by this document
    pub fn computed_digest(&self) -> String {
        DigestUtils::compute_docker_digest(&self.raw)
    }

    pub fn index_entries(&self) -> &[Descriptor] {
        match &self.kind {
            ManifestKind::Index { entries } => entries,
            ManifestKind::Single { .. } => &[],
        }
    }

    pub fn layers(&self) -> &[Descriptor] {
        match &self.kind {
            ManifestKind::Single { layers, .. } => layers,
            ManifestKind::Index { .. } => &[],
        }
    }

    /// Blobs that must exist in a repository before this manifest is
    /// accepted there: the config followed by the layers. Empty for an index.
    pub fn blob_digests(&self) -> Vec<&str> {
        match &self.kind {
            ManifestKind::Index { .. } => Vec::new(),
            ManifestKind::Single { config, layers } => config
                .iter()
                .chain(layers.iter())
                .map(|d| d.digest.as_str())
                .collect(),
        }
    }

    /// Sub-manifest digests for an index, layer digests otherwise
    pub fn digest_set(&self) -> BTreeSet<String> {
        match &self.kind {
            ManifestKind::Index { entries } => {
                entries.iter().map(|e| e.digest.clone()).collect()
            }
            ManifestKind::Single { layers, .. } => {
                layers.iter().map(|l| l.digest.clone()).collect()
            }
        }
    }
}
