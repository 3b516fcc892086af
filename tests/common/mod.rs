//! In-memory registry shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use image_mirror::cli::config::{AuthConfig, MirrorConfig, RegistryConfig};
use image_mirror::error::{RegistryError, Result};
use image_mirror::image::DigestUtils;
use image_mirror::registry::auth::{Scope, TokenRequest, TokenResponse};
use image_mirror::registry::transport::{
    BlobMountRequest, ManifestPutRequest, ManifestRequest, ManifestResponse, PutResponse,
    RegistryTransport,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub const SOURCE: &str = "upstream/app";
pub const TARGET: &str = "owner/mirror";

pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";
pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

/// Every request the fake registry received, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Token {
        repository: String,
        scope: Scope,
        additional: Vec<(String, Scope)>,
        authenticated: bool,
    },
    Get {
        repository: String,
        reference: String,
        token: String,
    },
    Put {
        repository: String,
        reference: String,
        data: Vec<u8>,
        content_type: String,
        token: String,
    },
    Mount {
        target: String,
        source: String,
        digest: String,
        token: String,
    },
}

#[derive(Default)]
pub struct FakeRegistry {
    manifests: Mutex<HashMap<(String, String), Vec<u8>>>,
    calls: Mutex<Vec<Call>>,
    failing_gets: Mutex<HashSet<(String, String)>>,
    failing_puts: Mutex<HashSet<(String, String)>>,
    failing_tokens: Mutex<HashSet<String>>,
    failing_mounts: Mutex<bool>,
}

pub fn token_value(repository: &str, scope: Scope) -> String {
    format!("token:{}:{}", repository, scope)
}

fn key(repository: &str, reference: &str) -> (String, String) {
    (repository.to_string(), reference.to_string())
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a manifest under a tag
    pub fn insert(&self, repository: &str, reference: &str, data: &[u8]) {
        self.manifests
            .lock()
            .unwrap()
            .insert(key(repository, reference), data.to_vec());
    }

    /// Store a manifest under its own digest and return the digest
    pub fn insert_by_digest(&self, repository: &str, data: &[u8]) -> String {
        let digest = DigestUtils::compute_docker_digest(data);
        self.insert(repository, &digest, data);
        digest
    }

    pub fn stored(&self, repository: &str, reference: &str) -> Option<Vec<u8>> {
        self.manifests
            .lock()
            .unwrap()
            .get(&key(repository, reference))
            .cloned()
    }

    pub fn fail_get(&self, repository: &str, reference: &str) {
        self.failing_gets
            .lock()
            .unwrap()
            .insert(key(repository, reference));
    }

    pub fn fail_put(&self, repository: &str, reference: &str) {
        self.failing_puts
            .lock()
            .unwrap()
            .insert(key(repository, reference));
    }

    pub fn fail_token(&self, repository: &str) {
        self.failing_tokens
            .lock()
            .unwrap()
            .insert(repository.to_string());
    }

    pub fn fail_mounts(&self) {
        *self.failing_mounts.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn puts(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Put { .. }))
            .collect()
    }

    /// References written with PUT, in order
    pub fn put_references(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Put { reference, .. } => Some(reference),
                _ => None,
            })
            .collect()
    }

    pub fn mounts(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Mount { .. }))
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn server_error(context: &str) -> RegistryError {
        RegistryError::Transport {
            context: context.to_string(),
            status: 500,
            body: "injected failure".to_string(),
        }
    }
}

#[async_trait]
impl RegistryTransport for FakeRegistry {
    async fn request_token(
        &self,
        request: &TokenRequest,
        credentials: Option<&AuthConfig>,
    ) -> Result<TokenResponse> {
        self.record(Call::Token {
            repository: request.repository.clone(),
            scope: request.scope,
            additional: request.additional_scopes.clone(),
            authenticated: credentials.is_some(),
        });

        if self.failing_tokens.lock().unwrap().contains(&request.repository) {
            return Err(RegistryError::Transport {
                context: "Token request".to_string(),
                status: 401,
                body: "denied".to_string(),
            });
        }

        Ok(TokenResponse::with_token(token_value(
            &request.repository,
            request.scope,
        )))
    }

    async fn get_manifest(&self, request: &ManifestRequest) -> Result<ManifestResponse> {
        self.record(Call::Get {
            repository: request.repository.clone(),
            reference: request.reference.clone(),
            token: request.token.clone(),
        });

        let key = key(&request.repository, &request.reference);
        if self.failing_gets.lock().unwrap().contains(&key) {
            return Err(Self::server_error("Manifest fetch"));
        }

        let data = self
            .manifests
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(&request.repository, &request.reference))?;

        Ok(ManifestResponse {
            digest: Some(DigestUtils::compute_docker_digest(&data)),
            data,
        })
    }

    async fn put_manifest(&self, request: &ManifestPutRequest) -> Result<PutResponse> {
        self.record(Call::Put {
            repository: request.repository.clone(),
            reference: request.reference.clone(),
            data: request.data.clone(),
            content_type: request.content_type.clone(),
            token: request.token.clone(),
        });

        let key = key(&request.repository, &request.reference);
        if self.failing_puts.lock().unwrap().contains(&key) {
            return Err(Self::server_error("Manifest publish"));
        }

        self.manifests
            .lock()
            .unwrap()
            .insert(key, request.data.clone());

        Ok(PutResponse {
            status: 201,
            body: String::new(),
            digest: Some(DigestUtils::compute_docker_digest(&request.data)),
        })
    }

    async fn mount_blob(&self, request: &BlobMountRequest) -> Result<u16> {
        self.record(Call::Mount {
            target: request.target_repository.clone(),
            source: request.source_repository.clone(),
            digest: request.digest.clone(),
            token: request.token.clone(),
        });

        if *self.failing_mounts.lock().unwrap() {
            return Err(RegistryError::Transport {
                context: "Blob mount".to_string(),
                status: 405,
                body: "mount unsupported".to_string(),
            });
        }
        Ok(201)
    }
}

pub fn config(tags: &[&str]) -> MirrorConfig {
    MirrorConfig::new(RegistryConfig::new("ghcr.io"), SOURCE, TARGET)
        .with_tags(tags.iter().copied())
        .with_push_auth(Some(AuthConfig::new("bot".into(), "secret".into())))
}

pub fn blob_digest(seed: &str) -> String {
    DigestUtils::compute_docker_digest(seed.as_bytes())
}

/// Single-platform manifest with unusual formatting, so any re-encoding
/// would change its bytes
pub fn single_manifest(config_seed: &str, layer_seeds: &[&str]) -> Vec<u8> {
    let layers: Vec<String> = layer_seeds
        .iter()
        .map(|seed| {
            format!(
                "   {{ \"mediaType\" : \"application/vnd.oci.image.layer.v1.tar+gzip\", \"digest\" : \"{}\", \"size\" : 1024 }}",
                blob_digest(seed)
            )
        })
        .collect();

    format!(
        "{{\n   \"schemaVersion\" : 2,\n   \"mediaType\" : \"{}\",\n   \"config\" : {{ \"mediaType\" : \"application/vnd.oci.image.config.v1+json\", \"digest\" : \"{}\", \"size\" : 512 }},\n   \"layers\" : [\n{}\n   ]\n}}\n",
        OCI_MANIFEST,
        blob_digest(config_seed),
        layers.join(",\n")
    )
    .into_bytes()
}

/// Index over `(child bytes, architecture)` pairs
pub fn index_manifest(children: &[(&[u8], &str)]) -> Vec<u8> {
    let entries: Vec<String> = children
        .iter()
        .map(|(data, arch)| {
            format!(
                "  {{\"mediaType\": \"{}\", \"digest\": \"{}\", \"size\": {}, \"platform\": {{\"architecture\": \"{}\", \"os\": \"linux\"}}}}",
                OCI_MANIFEST,
                DigestUtils::compute_docker_digest(data),
                data.len(),
                arch
            )
        })
        .collect();

    format!(
        "{{\"schemaVersion\": 2, \"mediaType\": \"{}\",\n \"manifests\": [\n{}\n ]}}",
        OCI_INDEX,
        entries.join(",\n")
    )
    .into_bytes()
}

/// Source repository holding an index under `tag` with an amd64 and an arm64
/// child; returns (index bytes, child digests)
pub fn seed_index(registry: &FakeRegistry, tag: &str) -> (Vec<u8>, Vec<String>) {
    let amd64 = single_manifest(&format!("{}-config-amd64", tag), &["base", "amd64-bin"]);
    let arm64 = single_manifest(&format!("{}-config-arm64", tag), &["base", "arm64-bin"]);
    let index = index_manifest(&[(&amd64, "amd64"), (&arm64, "arm64")]);

    let digests = vec![
        registry.insert_by_digest(SOURCE, &amd64),
        registry.insert_by_digest(SOURCE, &arm64),
    ];
    registry.insert(SOURCE, tag, &index);
    (index, digests)
}
