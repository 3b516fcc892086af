//! Command line interface module
//!
//! Argument parsing, the immutable run configuration built from it, and the
//! runner that drives the `mirror` and `check` commands.

pub mod args;
pub mod config;
pub mod runner;

pub use args::{Args, Command, RepositoryArgs};
pub use config::{AuthConfig, MirrorConfig, RegistryConfig};
pub use runner::Runner;
