//! Runner for the `mirror` and `check` commands

use crate::cli::args::{Args, Command};
use crate::cli::config::MirrorConfig;
use crate::error::Result;
use crate::logging::{EventSink, Logger};
use crate::mirror::{write_script, MirrorOrchestrator, SyncPlanner};
use crate::registry::transport::{RegistryTransport, StandardRegistryTransport};
use std::sync::Arc;

pub struct Runner {
    args: Args,
    output: Arc<Logger>,
}

impl Runner {
    pub fn new(args: Args) -> Self {
        let output = if args.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(args.verbose)
        };

        Self {
            args,
            output: Arc::new(output),
        }
    }

    /// Run the selected command
    ///
    /// `Ok(false)` means the run finished but at least one tag failed.
    pub async fn run(&self) -> Result<bool> {
        self.output.section("Image Mirror");

        let config = self.args.mirror_config()?;
        self.output.info(&format!(
            "{}: {} -> {} ({} tags)",
            config.registry.host,
            config.source_repository,
            config.target_repository,
            config.tags.len()
        ));

        let transport: Arc<dyn RegistryTransport> = Arc::new(self.create_transport().await?);
        let events: Arc<dyn EventSink> = self.output.clone();

        let success = match &self.args.command {
            Command::Mirror(_) => self.run_mirror(config, transport, events).await,
            Command::Check { .. } => self.run_check(config, transport, events).await?,
        };

        let elapsed = self.output.format_duration(self.output.elapsed());
        if success {
            self.output
                .success(&format!("Operation completed successfully in {}", elapsed));
        } else {
            self.output
                .error(&format!("Operation finished with failures in {}", elapsed));
        }

        Ok(success)
    }

    /// Build the HTTP transport, discovering the token endpoint unless one
    /// was given
    async fn create_transport(&self) -> Result<StandardRegistryTransport> {
        let registry = self.args.registry_config();
        registry.validate()?;
        let transport = StandardRegistryTransport::new(&registry)?;

        if registry.token_url.is_some() {
            return Ok(transport);
        }

        self.output.step("Discovering token endpoint");
        match transport.discover_challenge().await {
            Ok(Some(challenge)) => {
                self.output
                    .detail(&format!("Token endpoint: {}", challenge.realm));
                let service = if self.args.service.is_none() {
                    challenge.service
                } else {
                    None
                };
                Ok(transport.with_token_endpoint(challenge.realm, service))
            }
            Ok(None) => {
                self.output.detail(&format!(
                    "No bearer challenge, using {}",
                    transport.token_url()
                ));
                Ok(transport)
            }
            Err(e) => {
                self.output.warning(&format!(
                    "Token endpoint discovery failed ({}), using {}",
                    e,
                    transport.token_url()
                ));
                Ok(transport)
            }
        }
    }

    async fn run_mirror(
        &self,
        config: MirrorConfig,
        transport: Arc<dyn RegistryTransport>,
        events: Arc<dyn EventSink>,
    ) -> bool {
        let orchestrator = MirrorOrchestrator::new(config, transport, events);
        let report = orchestrator.mirror_tags().await;

        let mut summary = Vec::new();
        for tag in &report.tags {
            let line = match &tag.result {
                Ok(outcome) if outcome.is_complete() => format!("HTTP {}", outcome.status),
                Ok(outcome) => format!(
                    "HTTP {}, {} of {} sub-manifests failed",
                    outcome.status,
                    outcome.failed_children().len(),
                    outcome.children.len()
                ),
                Err(e) => format!("failed: {}", e),
            };
            summary.push((tag.tag.as_str(), line));
        }
        self.output.summary_kv("Mirror summary", &summary);

        let incomplete = report.incomplete();
        if !incomplete.is_empty() {
            self.output.warning(&format!(
                "Published with missing sub-manifests: {}",
                incomplete.join(", ")
            ));
        }

        report.is_success()
    }

    async fn run_check(
        &self,
        config: MirrorConfig,
        transport: Arc<dyn RegistryTransport>,
        events: Arc<dyn EventSink>,
    ) -> Result<bool> {
        let script_path = config.script_path.clone();
        let planner = SyncPlanner::new(config, transport, events);
        let report = planner.check_tags().await;

        self.output.summary_kv(
            "Sync summary",
            &[
                ("In sync", report.in_sync.len().to_string()),
                ("Out of sync", report.out_of_sync.len().to_string()),
                ("Skipped", report.skipped.len().to_string()),
            ],
        );

        if let Some(path) = script_path {
            let plan = report.plan();
            write_script(&plan, &path).await?;
            self.output.success(&format!(
                "Wrote {} ({} tags to sync)",
                path.display(),
                plan.len()
            ));
        }

        Ok(report.skipped.is_empty())
    }
}
