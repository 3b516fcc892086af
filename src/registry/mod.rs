//! Registry module for Docker Registry HTTP API v2 interactions
//!
//! Token model, the transport seam over HTTP, and the manifest, blob and
//! auth operations built on top of it.

pub mod auth;
pub mod operations;
pub mod transport;

pub use auth::{AuthChallenge, BearerToken, Scope, TokenRequest, TokenResponse};
pub use operations::{AuthOperations, BlobOperations, ManifestOperations, MountOutcome};
pub use transport::{
    BlobMountRequest, ManifestPutRequest, ManifestRequest, ManifestResponse, PutResponse,
    RegistryTransport, RetryPolicy, StandardRegistryTransport,
};
