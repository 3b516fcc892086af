mod common;

use common::*;
use image_mirror::logging::{EventLog, MirrorEvent};
use image_mirror::mirror::{
    render_script, write_script, MirrorOrchestrator, PlanEntry, SyncPlanner, TagStatus,
};
use std::sync::Arc;

fn planner(registry: &Arc<FakeRegistry>, tags: &[&str]) -> (SyncPlanner, Arc<EventLog>) {
    let events = Arc::new(EventLog::new());
    let planner = SyncPlanner::new(config(tags), registry.clone(), events.clone());
    (planner, events)
}

#[tokio::test]
async fn identical_indexes_are_in_sync() {
    let registry = Arc::new(FakeRegistry::new());
    let (index, _) = seed_index(&registry, "server");
    registry.insert(TARGET, "server", &index);
    let (planner, events) = planner(&registry, &["server"]);

    assert!(matches!(planner.check_tag("server").await, TagStatus::InSync));
    assert!(events
        .events()
        .contains(&MirrorEvent::TagInSync { tag: "server".into() }));
}

#[tokio::test]
async fn missing_child_puts_tag_in_plan() {
    let registry = Arc::new(FakeRegistry::new());
    let amd64 = single_manifest("cfg-amd64", &["base"]);
    let arm64 = single_manifest("cfg-arm64", &["base"]);
    registry.insert(SOURCE, "server", &index_manifest(&[(&amd64, "amd64"), (&arm64, "arm64")]));
    registry.insert(TARGET, "server", &index_manifest(&[(&amd64, "amd64")]));
    let (planner, events) = planner(&registry, &["server"]);

    let report = planner.check_tags().await;

    assert!(report.in_sync.is_empty());
    assert_eq!(
        report.out_of_sync,
        vec![PlanEntry::new("ghcr.io", SOURCE, TARGET, "server")]
    );
    assert!(events.events().contains(&MirrorEvent::TagOutOfSync {
        tag: "server".into(),
        missing: 1,
        unexpected: 0,
    }));

    let script = render_script(&report.plan());
    let commands: Vec<&str> = script.lines().filter(|l| l.starts_with("docker")).collect();
    assert_eq!(
        commands,
        vec![
            "docker pull ghcr.io/upstream/app:server",
            "docker tag ghcr.io/upstream/app:server ghcr.io/owner/mirror:server",
            "docker push ghcr.io/owner/mirror:server",
        ]
    );
}

#[tokio::test]
async fn absent_destination_is_out_of_sync_without_warning() {
    let registry = Arc::new(FakeRegistry::new());
    seed_index(&registry, "server");
    let (planner, events) = planner(&registry, &["server"]);

    assert!(matches!(
        planner.check_tag("server").await,
        TagStatus::OutOfSync(_)
    ));

    let events = events.events();
    assert!(events.iter().any(|e| matches!(
        e,
        MirrorEvent::FetchFailed { repository, not_found: true, .. } if repository == TARGET
    )));
    assert!(!events
        .iter()
        .any(|e| matches!(e, MirrorEvent::TagSkipped { .. })));
}

#[tokio::test]
async fn unreadable_destination_counts_as_empty() {
    let registry = Arc::new(FakeRegistry::new());
    let (index, _) = seed_index(&registry, "server");
    registry.insert(TARGET, "server", &index);
    registry.fail_get(TARGET, "server");
    let (planner, _) = planner(&registry, &["server"]);

    assert!(matches!(
        planner.check_tag("server").await,
        TagStatus::OutOfSync(_)
    ));
}

#[tokio::test]
async fn destination_token_failure_counts_as_empty() {
    let registry = Arc::new(FakeRegistry::new());
    seed_index(&registry, "server");
    registry.fail_token(TARGET);
    let (planner, _) = planner(&registry, &["server"]);

    assert!(matches!(
        planner.check_tag("server").await,
        TagStatus::OutOfSync(_)
    ));
}

#[tokio::test]
async fn absent_destination_is_planned_even_with_empty_source_set() {
    let registry = Arc::new(FakeRegistry::new());
    registry.insert(SOURCE, "light", &single_manifest("cfg", &[]));
    registry.insert(SOURCE, "empty", &index_manifest(&[]));
    registry.insert(SOURCE, "bare", &single_manifest("cfg", &[]));
    registry.insert(TARGET, "bare", &single_manifest("cfg", &[]));
    registry.fail_get(TARGET, "empty");
    let (planner, events) = planner(&registry, &["light", "empty", "bare"]);

    let report = planner.check_tags().await;

    assert_eq!(report.in_sync, vec!["bare".to_string()]);
    assert_eq!(
        report.out_of_sync,
        vec![
            PlanEntry::new("ghcr.io", SOURCE, TARGET, "light"),
            PlanEntry::new("ghcr.io", SOURCE, TARGET, "empty"),
        ]
    );
    assert!(events.events().contains(&MirrorEvent::TagOutOfSync {
        tag: "light".into(),
        missing: 0,
        unexpected: 0,
    }));
}

#[tokio::test]
async fn unreadable_source_skips_tag_and_continues() {
    let registry = Arc::new(FakeRegistry::new());
    seed_index(&registry, "light");
    registry.fail_get(SOURCE, "server");
    let (planner, events) = planner(&registry, &["server", "light"]);

    let report = planner.check_tags().await;

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0, "server");
    assert_eq!(report.out_of_sync.len(), 1);
    assert_eq!(report.out_of_sync[0].tag, "light");
    assert!(!report.is_in_sync());
    assert!(events
        .events()
        .iter()
        .any(|e| matches!(e, MirrorEvent::TagSkipped { tag, .. } if tag == "server")));
}

#[tokio::test]
async fn single_manifests_compare_layers() {
    let registry = Arc::new(FakeRegistry::new());
    registry.insert(SOURCE, "light", &single_manifest("cfg-1", &["a", "b"]));
    // same layers in another order, different config
    registry.insert(TARGET, "light", &single_manifest("cfg-2", &["b", "a"]));
    registry.insert(SOURCE, "full", &single_manifest("cfg", &["a", "b"]));
    registry.insert(TARGET, "full", &single_manifest("cfg", &["a"]));
    let (planner, _) = planner(&registry, &["light", "full"]);

    let report = planner.check_tags().await;

    assert_eq!(report.in_sync, vec!["light".to_string()]);
    assert_eq!(report.out_of_sync.len(), 1);
    assert_eq!(report.out_of_sync[0].tag, "full");
}

#[tokio::test]
async fn destination_is_in_sync_after_mirroring() {
    let registry = Arc::new(FakeRegistry::new());
    seed_index(&registry, "server");

    let orchestrator =
        MirrorOrchestrator::new(config(&["server"]), registry.clone(), Arc::new(EventLog::new()));
    orchestrator.mirror_tags().await;

    let (planner, _) = planner(&registry, &["server"]);
    let report = planner.check_tags().await;
    assert!(report.is_in_sync());
    assert!(report.plan().is_empty());
}

#[tokio::test]
async fn planner_reads_destination_with_push_credentials() {
    let registry = Arc::new(FakeRegistry::new());
    seed_index(&registry, "server");
    let (planner, _) = planner(&registry, &["server"]);

    planner.check_tag("server").await;

    let tokens: Vec<(String, bool)> = registry
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Token {
                repository,
                authenticated,
                ..
            } => Some((repository, authenticated)),
            _ => None,
        })
        .collect();
    assert_eq!(
        tokens,
        vec![(SOURCE.to_string(), false), (TARGET.to_string(), true)]
    );
    assert!(registry.puts().is_empty());
}

#[tokio::test]
async fn script_is_written_executable() {
    let registry = Arc::new(FakeRegistry::new());
    seed_index(&registry, "server");
    let (planner, _) = planner(&registry, &["server"]);
    let plan = planner.check_tags().await.plan();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sync.sh");
    write_script(&plan, &path).await.unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, render_script(&plan));
    assert!(written.starts_with("#!/bin/sh\nset -e\n"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
