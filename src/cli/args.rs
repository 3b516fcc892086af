//! Command-line argument parsing

use crate::cli::config::{AuthConfig, MirrorConfig, RegistryConfig};
use crate::error::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "image-mirror")]
#[command(about = "Mirror OCI/Docker image manifests between repositories of a registry")]
#[command(version)]
pub struct Args {
    /// Registry host
    #[arg(
        long = "registry",
        default_value = "ghcr.io",
        global = true,
        help = "Registry host, optionally with port"
    )]
    pub registry: String,

    #[arg(
        long = "service",
        global = true,
        help = "Service name sent to the token endpoint (defaults to the registry host)"
    )]
    pub service: Option<String>,

    #[arg(
        long = "token-url",
        global = true,
        help = "Token endpoint; discovered from the registry when omitted"
    )]
    pub token_url: Option<String>,

    #[arg(
        long = "insecure-http",
        global = true,
        help = "Talk plain HTTP to the registry"
    )]
    pub insecure_http: bool,

    /// Timeout in seconds for network operations
    #[arg(
        long = "timeout",
        short = 't',
        default_value = "30",
        global = true,
        help = "Timeout for each registry request in seconds"
    )]
    pub timeout: u64,

    #[arg(
        long = "retry",
        default_value = "3",
        global = true,
        help = "Attempts per request for transient failures"
    )]
    pub retry: u32,

    #[arg(
        long = "concurrency",
        short = 'j',
        default_value = "4",
        global = true,
        help = "Sub-manifests mirrored concurrently"
    )]
    pub concurrency: usize,

    #[arg(long = "verbose", short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(
        long = "quiet",
        short = 'q',
        global = true,
        conflicts_with = "verbose",
        help = "Only print errors"
    )]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Copy tags from the source repository to the target repository
    Mirror(RepositoryArgs),
    /// Compare tags and write a script that re-pushes the out-of-sync ones
    Check {
        #[command(flatten)]
        repositories: RepositoryArgs,

        #[arg(
            long = "output",
            short = 'o',
            default_value = "sync.sh",
            help = "Where to write the sync script"
        )]
        output: PathBuf,
    },
}

/// Repositories, tags and credentials shared by every command
#[derive(clap::Args, Debug, Clone)]
pub struct RepositoryArgs {
    #[arg(long = "source", short = 's', help = "Source repository, e.g. owner/name")]
    pub source: String,

    #[arg(long = "target", short = 'd', help = "Destination repository, e.g. owner/mirror")]
    pub target: String,

    #[arg(
        long = "tags",
        env = "MIRROR_TAGS",
        value_delimiter = ',',
        required = true,
        help = "Comma-separated tags to process"
    )]
    pub tags: Vec<String>,

    #[arg(long = "pull-username", env = "PULL_USERNAME", help = "Username for reading the source")]
    pub pull_username: Option<String>,

    #[arg(
        long = "pull-password",
        env = "PULL_PASSWORD",
        hide_env_values = true,
        help = "Password for reading the source"
    )]
    pub pull_password: Option<String>,

    #[arg(long = "push-username", env = "PUSH_USERNAME", help = "Username for the destination")]
    pub push_username: Option<String>,

    #[arg(
        long = "push-password",
        env = "PUSH_PASSWORD",
        hide_env_values = true,
        help = "Password for the destination"
    )]
    pub push_password: Option<String>,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    pub fn registry_config(&self) -> RegistryConfig {
        let mut registry = RegistryConfig::new(&self.registry)
            .with_token_url(self.token_url.clone())
            .with_insecure_http(self.insecure_http)
            .with_timeout(self.timeout);
        registry.retry_attempts = self.retry;
        if let Some(service) = &self.service {
            registry = registry.with_service(service);
        }
        registry
    }

    pub fn repositories(&self) -> &RepositoryArgs {
        match &self.command {
            Command::Mirror(repositories) => repositories,
            Command::Check { repositories, .. } => repositories,
        }
    }

    /// Build and validate the configuration for the chosen command
    pub fn mirror_config(&self) -> Result<MirrorConfig> {
        let repositories = self.repositories();
        let script_path = match &self.command {
            Command::Check { output, .. } => Some(output.clone()),
            Command::Mirror(_) => None,
        };

        let tags = repositories
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let config = MirrorConfig::new(
            self.registry_config(),
            &repositories.source,
            &repositories.target,
        )
        .with_tags(tags)
        .with_pull_auth(AuthConfig::from_parts(
            repositories.pull_username.clone(),
            repositories.pull_password.clone(),
        )?)
        .with_push_auth(AuthConfig::from_parts(
            repositories.push_username.clone(),
            repositories.push_password.clone(),
        )?)
        .with_max_concurrent(self.concurrency)
        .with_script_path(script_path);

        config.validate()?;
        Ok(config)
    }
}
