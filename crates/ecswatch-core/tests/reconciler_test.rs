#![allow(clippy::unwrap_used)]
// Reconciler behaviour driven by wire-shaped JSON events.

use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use ecswatch_api::InboundEvent;
use ecswatch_core::{LoadingStage, RefreshInterval, Reconciler};

const T1: &str = "2026-03-01T10:00:00Z";
const T2: &str = "2026-03-01T10:00:05Z";
const T3: &str = "2026-03-01T10:00:09Z";

fn event(name: &str, payload: Value) -> InboundEvent {
    InboundEvent::decode(name, payload).unwrap().unwrap()
}

fn apply(reconciler: &mut Reconciler, name: &str, payload: Value) {
    reconciler.apply(&event(name, payload));
}

fn cluster(name: &str, arn: &str) -> Value {
    json!({
        "name": name,
        "arn": arn,
        "status": "ACTIVE",
        "services": [],
        "scheduledTasks": []
    })
}

fn service(cluster: &str, name: &str) -> Value {
    json!({
        "name": name,
        "clusterName": cluster,
        "status": "ACTIVE",
        "desiredCount": 2,
        "runningCount": 2,
        "taskDefinition": { "family": name, "revision": 3 },
        "deployments": [{ "id": format!("{name}-d1"), "status": "PRIMARY" }]
    })
}

fn basic_update(clusters: &[Value], at: &str) -> Value {
    json!({ "clusters": clusters, "updatedOn": at })
}

fn services_update(arn: &str, services: &[Value], at: &str) -> Value {
    json!({ "clusterArn": arn, "services": services, "updatedOn": at })
}

fn scheduled_task(cluster: &str, name: &str) -> Value {
    json!({
        "name": name,
        "clusterName": cluster,
        "cron": "cron(0 2 * * ? *)",
        "enabled": true
    })
}

fn scheduled_tasks_update(arn: &str, cluster: &str, tasks: &[Value], at: &str) -> Value {
    json!({
        "clusterArn": arn,
        "clusterName": cluster,
        "scheduledTasks": tasks,
        "updatedOn": at
    })
}

fn cluster_names(reconciler: &Reconciler) -> Vec<String> {
    reconciler
        .snapshot()
        .clusters()
        .iter()
        .map(|c| c.name.clone())
        .collect()
}

fn flat_service_keys(reconciler: &Reconciler) -> BTreeSet<(String, String)> {
    reconciler
        .snapshot()
        .services()
        .iter()
        .map(|s| (s.cluster_name.clone(), s.name.clone()))
        .collect()
}

fn nested_service_keys(reconciler: &Reconciler) -> BTreeSet<(String, String)> {
    reconciler
        .snapshot()
        .clusters()
        .iter()
        .flat_map(|c| c.services.iter())
        .map(|s| (s.cluster_name.clone(), s.name.clone()))
        .collect()
}

// ── Flattening ──────────────────────────────────────────────────────

#[test]
fn flat_services_always_mirror_nested_services() {
    let mut reconciler = Reconciler::new(RefreshInterval::AUTOMATIC);
    apply(
        &mut reconciler,
        "clusters-basic-update",
        basic_update(&[cluster("prod", "arn:1"), cluster("dev", "arn:2")], T1),
    );

    let steps = [
        ("arn:1", vec![service("prod", "api"), service("prod", "worker")]),
        ("arn:2", vec![service("dev", "api")]),
        ("arn:1", vec![service("prod", "api")]),
        ("arn:2", vec![]),
    ];
    for (arn, services) in steps {
        apply(
            &mut reconciler,
            "cluster-services-update",
            services_update(arn, &services, T2),
        );
        let snap = reconciler.snapshot();
        assert_eq!(flat_service_keys(&reconciler), nested_service_keys(&reconciler));
        assert_eq!(snap.services().len(), flat_service_keys(&reconciler).len(), "duplicates");
    }

    // Dropping a cluster in a new cycle removes its services too.
    apply(&mut reconciler, "loading-complete", json!({ "message": "ok" }));
    apply(
        &mut reconciler,
        "clusters-basic-update",
        basic_update(&[cluster("dev", "arn:2")], T3),
    );
    assert!(flat_service_keys(&reconciler).is_empty());
}

#[test]
fn basic_stage_progress_before_the_update_still_drops_removed_clusters() {
    let mut reconciler = Reconciler::new(RefreshInterval::AUTOMATIC);
    apply(
        &mut reconciler,
        "clusters-basic-update",
        basic_update(&[cluster("prod", "arn:1"), cluster("old", "arn:2")], T1),
    );
    apply(
        &mut reconciler,
        "cluster-services-update",
        services_update("arn:2", &[service("old", "web")], T1),
    );
    apply(&mut reconciler, "loading-complete", json!({ "updatedOn": T1 }));

    apply(
        &mut reconciler,
        "loading-progress",
        json!({ "current": 1, "total": 3, "stage": "clusters-basic" }),
    );
    apply(
        &mut reconciler,
        "clusters-basic-update",
        basic_update(&[cluster("prod", "arn:1")], T2),
    );
    apply(&mut reconciler, "loading-complete", json!({ "updatedOn": T2 }));

    assert_eq!(cluster_names(&reconciler), vec!["prod".to_owned()]);
    assert!(flat_service_keys(&reconciler).is_empty());
}

// ── Scheduled tasks ─────────────────────────────────────────────────

#[test]
fn scheduled_tasks_merge_replaces_nested_and_flat_lists() {
    let mut reconciler = Reconciler::new(RefreshInterval::AUTOMATIC);
    apply(
        &mut reconciler,
        "clusters-basic-update",
        basic_update(&[cluster("prod", "arn:1"), cluster("dev", "arn:2")], T1),
    );
    apply(
        &mut reconciler,
        "cluster-scheduled-tasks-update",
        scheduled_tasks_update(
            "arn:1",
            "prod",
            &[scheduled_task("prod", "nightly"), scheduled_task("prod", "weekly")],
            T2,
        ),
    );
    apply(
        &mut reconciler,
        "cluster-scheduled-tasks-update",
        scheduled_tasks_update("arn:2", "dev", &[scheduled_task("dev", "cleanup")], T2),
    );

    let snap = reconciler.snapshot();
    assert!(snap.is_stage_loaded(&LoadingStage::ClusterScheduledTasks));
    assert_eq!(snap.cluster_by_arn("arn:1").unwrap().scheduled_tasks.len(), 2);
    assert_eq!(snap.scheduled_tasks().len(), 3);

    // shrinking one cluster's list must shrink the flat list with it
    apply(
        &mut reconciler,
        "cluster-scheduled-tasks-update",
        scheduled_tasks_update("arn:1", "prod", &[scheduled_task("prod", "nightly")], T3),
    );
    let snap = reconciler.snapshot();
    let nested: Vec<_> = snap
        .cluster_by_arn("arn:1")
        .unwrap()
        .scheduled_tasks
        .iter()
        .map(|t| t.name.as_str())
        .collect();
    assert_eq!(nested, vec!["nightly"]);
    let flat: BTreeSet<_> = snap
        .scheduled_tasks()
        .iter()
        .map(|t| (t.cluster_name.as_str(), t.name.as_str()))
        .collect();
    assert_eq!(flat, BTreeSet::from([("dev", "cleanup"), ("prod", "nightly")]));
    assert_eq!(snap.updated_on(), Some(T3.parse().unwrap()));
}

#[test]
fn basic_update_keeps_merged_scheduled_tasks() {
    let mut reconciler = Reconciler::new(RefreshInterval::AUTOMATIC);
    apply(
        &mut reconciler,
        "clusters-basic-update",
        basic_update(&[cluster("prod", "arn:1")], T1),
    );
    apply(
        &mut reconciler,
        "cluster-scheduled-tasks-update",
        scheduled_tasks_update("arn:1", "prod", &[scheduled_task("prod", "nightly")], T2),
    );
    apply(&mut reconciler, "loading-complete", json!({ "updatedOn": T2 }));

    let mut refreshed = cluster("prod", "arn:1");
    refreshed["runningTasks"] = json!(4);
    apply(
        &mut reconciler,
        "clusters-basic-update",
        basic_update(&[refreshed], T3),
    );

    let snap = reconciler.snapshot();
    let prod = snap.cluster_by_arn("arn:1").unwrap();
    assert_eq!(prod.running_tasks, 4);
    assert_eq!(prod.scheduled_tasks.len(), 1);
    assert_eq!(snap.scheduled_tasks().len(), 1);
}

#[test]
fn unrelated_pushes_do_not_look_like_a_services_reload() {
    let mut reconciler = Reconciler::new(RefreshInterval::AUTOMATIC);
    apply(
        &mut reconciler,
        "clusters-basic-update",
        basic_update(&[cluster("prod", "arn:1")], T1),
    );
    apply(
        &mut reconciler,
        "cluster-services-update",
        services_update("arn:1", &[service("prod", "api")], T1),
    );
    let services_since = reconciler.snapshot().services_revision("arn:1");
    let tasks_since = reconciler.snapshot().scheduled_tasks_revision("arn:1");

    apply(
        &mut reconciler,
        "clusters-basic-update",
        basic_update(&[cluster("prod", "arn:1")], T2),
    );
    apply(
        &mut reconciler,
        "cluster-scheduled-tasks-update",
        scheduled_tasks_update("arn:1", "prod", &[scheduled_task("prod", "nightly")], T2),
    );
    let snap = reconciler.snapshot();
    assert_eq!(snap.services_revision("arn:1"), services_since);
    assert!(snap.scheduled_tasks_revision("arn:1") > tasks_since);

    apply(
        &mut reconciler,
        "cluster-services-update",
        services_update("arn:1", &[service("prod", "api")], T3),
    );
    assert!(reconciler.snapshot().services_revision("arn:1") > services_since);
}

// ── Loading stages ──────────────────────────────────────────────────

#[test]
fn stages_grow_within_a_cycle_and_reset_on_complete() {
    let mut reconciler = Reconciler::new(RefreshInterval::AUTOMATIC);

    apply(
        &mut reconciler,
        "clusters-basic-update",
        basic_update(&[cluster("prod", "arn:1")], T1),
    );
    let after_basic = reconciler.snapshot().loading_stages().clone();
    assert!(after_basic.contains(&LoadingStage::ClustersBasic));

    apply(
        &mut reconciler,
        "cluster-services-update",
        services_update("arn:1", &[service("prod", "api")], T2),
    );
    let after_services = reconciler.snapshot().loading_stages().clone();
    assert!(after_basic.is_subset(&after_services));

    apply(
        &mut reconciler,
        "loading-progress",
        json!({ "current": 3, "total": 4, "stage": "ec2-inventory" }),
    );
    let snap = reconciler.snapshot();
    assert!(after_services.is_subset(snap.loading_stages()));
    assert!(snap.is_stage_loaded(&LoadingStage::Ec2Inventory));
    assert_eq!(snap.loading_percentage(), 75);
    assert!(snap.is_partially_loaded());

    apply(&mut reconciler, "loading-complete", json!({ "message": "done" }));
    let snap = reconciler.snapshot();
    assert!(snap.loading_stages().is_empty());
    assert!(!snap.is_loading());
    assert_eq!(snap.loading_percentage(), 0);
}

#[test]
fn percentage_boundaries_through_progress_events() {
    let mut reconciler = Reconciler::new(RefreshInterval::AUTOMATIC);
    for (current, total, expected) in [(0, 0, 0), (5, 10, 50), (10, 10, 100)] {
        apply(
            &mut reconciler,
            "loading-progress",
            json!({ "current": current, "total": total, "stage": "" }),
        );
        assert_eq!(reconciler.snapshot().loading_percentage(), expected);
    }
}

// ── Failure handling ────────────────────────────────────────────────

#[test]
fn error_keeps_partial_results() {
    let mut reconciler = Reconciler::new(RefreshInterval::AUTOMATIC);
    apply(
        &mut reconciler,
        "clusters-basic-update",
        basic_update(&[cluster("a", "arn:a"), cluster("b", "arn:b")], T1),
    );
    apply(
        &mut reconciler,
        "cluster-services-update",
        services_update("arn:a", &[service("a", "api")], T2),
    );
    apply(
        &mut reconciler,
        "clusters-error",
        json!({ "error": { "message": "Rate exceeded" }, "clusterName": "b" }),
    );

    let snap = reconciler.snapshot();
    assert_eq!(snap.cluster_by_arn("arn:a").unwrap().services.len(), 1);
    assert_eq!(snap.services().len(), 1);
    assert!(!snap.is_loading());
    assert!(snap.loading_stages().is_empty());
    let error = snap.last_error().unwrap();
    assert_eq!(error.message, "Rate exceeded");
    assert_eq!(error.cluster_name.as_deref(), Some("b"));
}

#[test]
fn update_for_unknown_cluster_changes_nothing() {
    let mut reconciler = Reconciler::new(RefreshInterval::AUTOMATIC);
    apply(
        &mut reconciler,
        "clusters-basic-update",
        basic_update(&[cluster("prod", "arn:1")], T1),
    );
    apply(
        &mut reconciler,
        "cluster-services-update",
        services_update("arn:1", &[service("prod", "api")], T2),
    );
    let before = reconciler.snapshot();

    let mut rx = reconciler.subscribe();
    rx.mark_unchanged();
    apply(
        &mut reconciler,
        "cluster-services-update",
        services_update("arn:missing", &[service("ghost", "x")], T3),
    );
    apply(
        &mut reconciler,
        "cluster-scheduled-tasks-update",
        json!({
            "clusterArn": "arn:missing",
            "clusterName": "ghost",
            "scheduledTasks": [{ "name": "nightly", "clusterName": "ghost" }],
            "updatedOn": T3
        }),
    );

    assert!(!rx.has_changed().unwrap(), "no-op merges must not publish");
    let after = reconciler.snapshot();
    assert_eq!(after.clusters(), before.clusters());
    assert_eq!(after.services(), before.services());
    assert_eq!(after.updated_on(), before.updated_on());
}

// ── Scenarios ───────────────────────────────────────────────────────

#[test]
fn progressive_cycle_end_to_end() {
    let mut reconciler = Reconciler::new(RefreshInterval::AUTOMATIC);

    apply(
        &mut reconciler,
        "clusters-basic-update",
        basic_update(&[cluster("prod", "arn:1")], T1),
    );
    apply(
        &mut reconciler,
        "cluster-services-update",
        services_update("arn:1", &[service("prod", "api")], T2),
    );
    apply(&mut reconciler, "loading-complete", json!({ "updatedOn": T2 }));

    let snap = reconciler.snapshot();
    assert_eq!(snap.clusters().len(), 1);
    let prod = &snap.clusters()[0];
    assert_eq!(prod.name, "prod");
    let nested: Vec<_> = prod.services.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(nested, vec!["api"]);
    let flat: Vec<_> = snap.services().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(flat, vec!["api"]);
    assert_eq!(snap.updated_on(), Some(T2.parse().unwrap()));
    assert!(!snap.is_loading());
    assert!(snap.loading_stages().is_empty());
    assert_eq!(snap.task_definitions().len(), 1);
    assert_eq!(snap.deployments().len(), 1);
    assert_eq!(snap.completed_cycles(), 1);
}

#[test]
fn full_update_replaces_everything_without_stage_tracking() {
    let mut reconciler = Reconciler::new(RefreshInterval::AUTOMATIC);
    apply(
        &mut reconciler,
        "clusters-basic-update",
        basic_update(&[cluster("old", "arn:old")], T1),
    );

    let mut prod = cluster("prod", "arn:1");
    prod["services"] = json!([service("prod", "api"), service("prod", "web")]);
    prod["scheduledTasks"] = json!([{ "name": "nightly", "clusterName": "prod", "cron": "cron(0 2 * * ? *)" }]);
    apply(
        &mut reconciler,
        "clusters-update",
        json!({
            "clusters": { "clusters": [prod] },
            "ec2Instances": { "instances": [{ "instanceId": "i-1", "state": "running" }] },
            "updatedOn": T2
        }),
    );

    let snap = reconciler.snapshot();
    assert!(snap.cluster_by_arn("arn:old").is_none());
    assert_eq!(snap.services().len(), 2);
    assert_eq!(snap.scheduled_tasks().len(), 1);
    assert_eq!(snap.instances().len(), 1);
    assert!(!snap.is_loading());
    assert!(snap.loading_stages().is_empty());
}

#[test]
fn stale_update_regresses_visible_data() {
    // No sequence numbers: the last delivered update wins, even if older.
    let mut reconciler = Reconciler::new(RefreshInterval::AUTOMATIC);
    apply(
        &mut reconciler,
        "clusters-basic-update",
        basic_update(&[cluster("prod", "arn:1")], T1),
    );
    apply(
        &mut reconciler,
        "cluster-services-update",
        services_update("arn:1", &[service("prod", "api"), service("prod", "web")], T3),
    );
    apply(
        &mut reconciler,
        "cluster-services-update",
        services_update("arn:1", &[service("prod", "api")], T2),
    );

    let snap = reconciler.snapshot();
    assert_eq!(snap.services().len(), 1);
    assert_eq!(snap.updated_on(), Some(T3.parse().unwrap()));
}
