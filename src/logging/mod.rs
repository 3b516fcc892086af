//! Console output control
//!
//! This module provides the [`Logger`] for user-visible output with quiet and
//! verbose levels. The logger is also an [`EventSink`]: it renders the
//! structured [`MirrorEvent`] stream as console lines. Internal diagnostics go
//! through `tracing` instead and are filtered with `RUST_LOG`.

pub mod events;

pub use events::{EventLog, EventSink, MirrorEvent};

use crate::image::DigestUtils;
use crate::registry::operations::blob_operations::MountOutcome;
use std::time::{Duration, Instant};

/// Logger responsible for all user-visible output
#[derive(Debug, Clone)]
pub struct Logger {
    pub verbose: bool,
    pub quiet: bool,
    pub start_time: Option<Instant>,
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            quiet: false,
            start_time: Some(Instant::now()),
        }
    }

    pub fn new_quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
            start_time: Some(Instant::now()),
        }
    }

    /// Main section heading
    pub fn section(&self, title: &str) {
        if !self.quiet {
            println!("\n=== {} ===", title);
        }
    }

    /// Sub-section heading
    pub fn subsection(&self, title: &str) {
        if !self.quiet {
            println!("\n--- {} ---", title);
        }
    }

    pub fn verbose(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("📝 {}", message);
        }
    }

    /// Information message
    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("ℹ️  {}", message);
        }
    }

    /// Success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("✅ {}", message);
        }
    }

    /// Warning message
    pub fn warning(&self, message: &str) {
        if !self.quiet {
            println!("⚠️  WARNING: {}", message);
        }
    }

    /// Error message
    pub fn error(&self, message: &str) {
        eprintln!("❌ ERROR: {}", message);
    }

    /// Step information
    pub fn step(&self, message: &str) {
        if !self.quiet {
            println!("▶️  {}", message);
        }
    }

    /// Detailed information (only shown in verbose mode)
    pub fn detail(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("   {}", message);
        }
    }

    /// Key-value pair summary display
    pub fn summary_kv(&self, title: &str, items: &[(&str, String)]) {
        if !self.quiet {
            self.subsection(title);
            for (key, value) in items {
                println!("  {}: {}", key, value);
            }
        }
    }

    /// Format duration in human-readable format
    pub fn format_duration(&self, duration: Duration) -> String {
        let secs = duration.as_secs();
        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m{}s", secs / 60, secs % 60)
        } else {
            format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }

    /// Time since the logger was created
    pub fn elapsed(&self) -> Duration {
        self.start_time
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }
}

impl EventSink for Logger {
    fn emit(&self, event: MirrorEvent) {
        tracing::debug!(?event, "mirror event");

        match event {
            MirrorEvent::TokenIssued { repository, scope } => {
                self.detail(&format!("Token issued for {} ({})", repository, scope));
            }
            MirrorEvent::FetchStarted {
                repository,
                reference,
            } => {
                self.verbose(&format!("Fetching manifest {}:{}", repository, reference));
            }
            MirrorEvent::FetchDone {
                repository,
                reference,
                digest,
                bytes,
            } => {
                self.detail(&format!(
                    "Fetched {}:{} -> {} ({} bytes)",
                    repository,
                    reference,
                    DigestUtils::format_digest_short(&digest),
                    bytes
                ));
            }
            MirrorEvent::FetchFailed {
                repository,
                reference,
                error,
                not_found,
            } => {
                if not_found {
                    self.detail(&format!("{}:{} does not exist", repository, reference));
                } else {
                    self.warning(&format!(
                        "Fetch of {}:{} failed: {}",
                        repository, reference, error
                    ));
                }
            }
            MirrorEvent::IndexDetected { reference, entries } => {
                self.info(&format!(
                    "{}: multi-platform index with {} manifests",
                    reference, entries
                ));
            }
            MirrorEvent::SingleDetected { reference, layers } => {
                self.info(&format!(
                    "{}: single-platform manifest with {} layers",
                    reference, layers
                ));
            }
            MirrorEvent::SubManifestStarted { platform, digest } => {
                self.step(&format!(
                    "Mirroring sub-manifest for {} ({})",
                    platform,
                    DigestUtils::format_digest_short(&digest)
                ));
            }
            MirrorEvent::SubManifestFailed {
                platform,
                digest,
                error,
            } => {
                self.error(&format!(
                    "Sub-manifest {} for {} failed: {}",
                    digest, platform, error
                ));
            }
            MirrorEvent::MountAttempted {
                repository,
                from,
                digest,
                outcome,
            } => {
                let short = DigestUtils::format_digest_short(&digest);
                match outcome {
                    MountOutcome::Failed { error } => self.warning(&format!(
                        "Cross-mount of {} from {} into {} failed: {}",
                        short, from, repository, error
                    )),
                    other => self.detail(&format!(
                        "Cross-mount of {} from {} into {}: {}",
                        short, from, repository, other
                    )),
                }
            }
            MirrorEvent::PublishDone {
                repository,
                reference,
                status,
            } => {
                self.success(&format!(
                    "Pushed {}:{} (HTTP {})",
                    repository, reference, status
                ));
            }
            MirrorEvent::PublishFailed {
                repository,
                reference,
                error,
            } => {
                self.error(&format!(
                    "Push of {}:{} failed: {}",
                    repository, reference, error
                ));
            }
            MirrorEvent::TagInSync { tag } => {
                self.success(&format!("{} is in sync", tag));
            }
            MirrorEvent::TagOutOfSync {
                tag,
                missing,
                unexpected,
            } => {
                self.warning(&format!(
                    "{} is out of sync ({} digests missing at destination, {} unexpected)",
                    tag, missing, unexpected
                ));
            }
            MirrorEvent::TagSkipped { tag, error } => {
                self.warning(&format!("Skipping {}: {}", tag, error));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_duration_units() {
        let logger = Logger::new_quiet();
        assert_eq!(logger.format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(logger.format_duration(Duration::from_secs(125)), "2m5s");
        assert_eq!(logger.format_duration(Duration::from_secs(3725)), "1h2m5s");
    }

    #[test]
    fn quiet_logger_accepts_events() {
        let logger = Logger::new_quiet();
        logger.emit(MirrorEvent::TagInSync { tag: "server".into() });
        assert!(logger.quiet);
    }
}
