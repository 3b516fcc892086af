//! Image content model
//!
//! This module provides the types for interpreting manifests fetched from a
//! registry: classification into index or single-platform manifest, the
//! descriptors they reference, and digest handling.

pub mod digest;
pub mod manifest;

pub use digest::DigestUtils;
pub use manifest::{Descriptor, ManifestDocument, Platform};
