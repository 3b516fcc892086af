//! Registry operations used by the mirror
//!
//! Each operation set owns a shared [`crate::registry::RegistryTransport`]
//! and reports progress through an [`crate::logging::EventSink`].

pub mod auth_operations;
pub mod blob_operations;
pub mod manifest_operations;

pub use auth_operations::AuthOperations;
pub use blob_operations::{BlobOperations, MountOutcome};
pub use manifest_operations::{ManifestOperations, PublishResult};
