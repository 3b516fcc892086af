//! Image Mirror Library
//!
//! Mirrors OCI/Docker manifests, including multi-platform indexes, from one
//! repository to another on the same registry, cross-mounting blobs instead
//! of copying them. Also compares tags between the two repositories and
//! renders a remediation script for the ones that drifted.

pub mod cli;
pub mod error;
pub mod image;
pub mod logging;
pub mod mirror;
pub mod registry;

pub use cli::config::{AuthConfig, MirrorConfig, RegistryConfig};
pub use error::{RegistryError, Result};
pub use logging::{EventLog, EventSink, Logger, MirrorEvent};
pub use mirror::{MirrorOrchestrator, SyncPlanner};
pub use registry::{RegistryTransport, StandardRegistryTransport};
