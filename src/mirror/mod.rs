//! Mirroring and sync checking across two repositories

pub mod orchestrator;
pub mod plan;
pub mod sync_check;

pub use orchestrator::{BatchReport, ChildOutcome, MirrorOrchestrator, MirrorOutcome, TagReport};
pub use plan::{PlanEntry, RemediationPlan, render_script, write_script};
pub use sync_check::{SyncPlanner, SyncReport, TagStatus};
