//! Remediation plan and its shell rendering
//!
//! The planner only collects [`PlanEntry`] values. Turning them into a script
//! is [`render_script`], a pure function; [`write_script`] is the single place
//! that touches the filesystem.

use crate::error::Result;
use std::path::Path;

/// One out-of-sync tag and the images needed to fix it with a docker client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub tag: String,
    pub source_image: String,
    pub target_image: String,
}

impl PlanEntry {
    pub fn new(host: &str, source_repository: &str, target_repository: &str, tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            source_image: format!("{}/{}:{}", host, source_repository, tag),
            target_image: format!("{}/{}:{}", host, target_repository, tag),
        }
    }

    /// pull, tag, push
    pub fn commands(&self) -> [String; 3] {
        [
            format!("docker pull {}", self.source_image),
            format!("docker tag {} {}", self.source_image, self.target_image),
            format!("docker push {}", self.target_image),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemediationPlan {
    entries: Vec<PlanEntry>,
}

impl RemediationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: PlanEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl FromIterator<PlanEntry> for RemediationPlan {
    fn from_iter<I: IntoIterator<Item = PlanEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Render the plan as a POSIX shell script, entries in plan order
pub fn render_script(plan: &RemediationPlan) -> String {
    let mut script = String::from("#!/bin/sh\nset -e\n");
    for entry in plan.entries() {
        script.push_str(&format!("\n# {}\n", entry.tag));
        for command in entry.commands() {
            script.push_str(&command);
            script.push('\n');
        }
    }
    script
}

/// Write the rendered plan to `path` and make it executable on Unix
pub async fn write_script(plan: &RemediationPlan, path: &Path) -> Result<()> {
    tokio::fs::write(path, render_script(plan)).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    }

    tracing::debug!(path = %path.display(), entries = plan.len(), "sync script written");
    Ok(())
}
