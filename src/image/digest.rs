//! Content digest utilities
//!
//! Digests address manifests and blobs as `<algorithm>:<hex>`. The mirror
//! only ever compares and verifies them; it never rewrites content, so a
//! digest computed here over fetched bytes must match the one the registry
//! and any parent index reference.

use crate::error::{RegistryError, Result};
use sha2::Digest;

/// Utilities for working with content digests
pub struct DigestUtils;

impl DigestUtils {
    /// Compute SHA256 hex digest from byte data
    pub fn compute_sha256(data: &[u8]) -> String {
        let mut hasher = sha2::Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// Compute full digest (with sha256: prefix) from byte data
    pub fn compute_docker_digest(data: &[u8]) -> String {
        format!("sha256:{}", Self::compute_sha256(data))
    }

    fn hex_len(algorithm: &str) -> Option<usize> {
        match algorithm {
            "sha256" => Some(64),
            "sha384" => Some(96),
            "sha512" => Some(128),
            _ => None,
        }
    }

    /// Validate `<algorithm>:<hex>` for the algorithms registries accept
    pub fn is_valid_digest(digest: &str) -> bool {
        let Some((algorithm, hex_part)) = digest.split_once(':') else {
            return false;
        };
        match Self::hex_len(algorithm) {
            Some(len) => {
                hex_part.len() == len
                    && hex_part
                        .chars()
                        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
            }
            None => false,
        }
    }

    /// Tags cannot contain ':', digests always do
    pub fn is_digest_reference(reference: &str) -> bool {
        reference.contains(':')
    }

    /// Verify data matches expected digest
    pub fn verify_data_integrity(data: &[u8], expected_digest: &str) -> Result<()> {
        if !Self::is_valid_digest(expected_digest) {
            return Err(RegistryError::Validation(format!(
                "Invalid digest format: {}",
                expected_digest
            )));
        }

        let computed = match expected_digest.split_once(':') {
            Some(("sha384", _)) => {
                let mut hasher = sha2::Sha384::new();
                hasher.update(data);
                format!("sha384:{}", hex::encode(hasher.finalize()))
            }
            Some(("sha512", _)) => {
                let mut hasher = sha2::Sha512::new();
                hasher.update(data);
                format!("sha512:{}", hex::encode(hasher.finalize()))
            }
            _ => Self::compute_docker_digest(data),
        };

        if computed != expected_digest {
            return Err(RegistryError::Protocol(format!(
                "Content digest mismatch: expected {}, computed {}",
                expected_digest, computed
            )));
        }

        Ok(())
    }

    /// Format digest for display (truncated for readability)
    pub fn format_digest_short(digest: &str) -> String {
        match digest.get(..23) {
            Some(prefix) if digest.len() > 23 => format!("{}...", prefix),
            _ => digest.to_string(),
        }
    }
}
