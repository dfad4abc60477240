// ── Snapshot of the console's infrastructure state ──
//
// Immutable once published. Consumers hold `Arc<Snapshot>` and read it
// through the accessors and derived views below; only the reconciler
// builds new ones.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::Serialize;

use crate::model::{
    Cluster, Deployment, Instance, LoadError, LoadingProgress, LoadingStage, RefreshInterval,
    ScheduledTask, Service, TaskDefinition,
};
use crate::stream::{InstanceFilter, ServiceFilter};

/// Point-in-time view of every entity the console tracks, plus the
/// loading-cycle bookkeeping.
///
/// Services, scheduled tasks, deployments and task definitions are kept
/// twice: nested under their cluster and in flat cross-cluster lists. The
/// flat lists are always rebuilt from the clusters, never edited on their
/// own, so the two views cannot drift apart.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub(super) clusters: Vec<Arc<Cluster>>,
    pub(super) services: Vec<Arc<Service>>,
    pub(super) scheduled_tasks: Vec<Arc<ScheduledTask>>,
    pub(super) task_definitions: Vec<Arc<TaskDefinition>>,
    pub(super) deployments: Vec<Arc<Deployment>>,
    pub(super) instances: Vec<Arc<Instance>>,
    pub(super) updated_on: Option<DateTime<Utc>>,
    pub(super) refresh_interval: RefreshInterval,
    pub(super) progress: LoadingProgress,
    pub(super) loading_stages: IndexSet<LoadingStage>,
    pub(super) is_loading: bool,
    pub(super) last_error: Option<Arc<LoadError>>,
    pub(super) completed_cycles: u64,
    /// A basic update already arrived in the running cycle. Progress
    /// events never set this, only the update itself.
    #[serde(skip)]
    pub(super) basic_seen: bool,
    /// Per-cluster (by ARN) stamps of the last services and scheduled
    /// tasks merges, drawn from `merge_counter`.
    #[serde(skip)]
    pub(super) child_revisions: HashMap<String, ChildRevisions>,
    #[serde(skip)]
    pub(super) merge_counter: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct ChildRevisions {
    pub(super) services: u64,
    pub(super) scheduled_tasks: u64,
}

/// A cluster together with coarse per-cluster load flags, for rendering
/// clusters whose details are still arriving.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterView {
    pub cluster: Arc<Cluster>,
    pub has_services: bool,
    pub has_scheduled_tasks: bool,
}

impl Snapshot {
    /// Empty snapshot, optionally hydrated with a persisted interval.
    pub fn new(refresh_interval: RefreshInterval) -> Self {
        Self {
            refresh_interval,
            ..Self::default()
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn clusters(&self) -> &[Arc<Cluster>] {
        &self.clusters
    }

    pub fn services(&self) -> &[Arc<Service>] {
        &self.services
    }

    pub fn scheduled_tasks(&self) -> &[Arc<ScheduledTask>] {
        &self.scheduled_tasks
    }

    pub fn task_definitions(&self) -> &[Arc<TaskDefinition>] {
        &self.task_definitions
    }

    pub fn deployments(&self) -> &[Arc<Deployment>] {
        &self.deployments
    }

    pub fn instances(&self) -> &[Arc<Instance>] {
        &self.instances
    }

    /// Timestamp carried by the most recent merge.
    pub fn updated_on(&self) -> Option<DateTime<Utc>> {
        self.updated_on
    }

    pub fn refresh_interval(&self) -> RefreshInterval {
        self.refresh_interval
    }

    pub fn progress(&self) -> &LoadingProgress {
        &self.progress
    }

    /// Stages applied since the current cycle began, in arrival order.
    pub fn loading_stages(&self) -> &IndexSet<LoadingStage> {
        &self.loading_stages
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Error that ended the most recent cycle. Cleared when the next
    /// cycle starts.
    pub fn last_error(&self) -> Option<&Arc<LoadError>> {
        self.last_error.as_ref()
    }

    /// Cycles that have ended since the session started, whether by
    /// completion, error, or a single-shot full update.
    pub fn completed_cycles(&self) -> u64 {
        self.completed_cycles
    }

    // ── Derived views ────────────────────────────────────────────────

    /// `round(current / total * 100)`, 0 when `total` is 0, capped at 100.
    pub fn loading_percentage(&self) -> u8 {
        let current = u64::from(self.progress.current);
        let total = u64::from(self.progress.total);
        if total == 0 {
            return 0;
        }
        let rounded = (current * 200 + total) / (total * 2);
        u8::try_from(rounded.min(100)).unwrap_or(100)
    }

    /// Some clusters are visible while a cycle is still filling them in.
    pub fn is_partially_loaded(&self) -> bool {
        !self.clusters.is_empty() && self.is_loading
    }

    pub fn is_stage_loaded(&self, stage: &LoadingStage) -> bool {
        self.loading_stages.contains(stage)
    }

    pub fn clusters_with_load_state(&self) -> Vec<ClusterView> {
        self.clusters
            .iter()
            .map(|cluster| ClusterView {
                cluster: Arc::clone(cluster),
                has_services: !cluster.services.is_empty(),
                has_scheduled_tasks: !cluster.scheduled_tasks.is_empty(),
            })
            .collect()
    }

    /// Time since `updated_on`, measured against `now`.
    pub fn data_age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.updated_on.map(|at| now - at)
    }

    /// Revision of the cluster's services list. It only moves when a
    /// services update (or a full update) for that cluster is merged, so
    /// basic updates and scheduled tasks merges leave it alone.
    pub fn services_revision(&self, cluster_arn: &str) -> u64 {
        self.child_revisions
            .get(cluster_arn)
            .map_or(0, |r| r.services)
    }

    /// Same as [`services_revision`](Self::services_revision), for
    /// scheduled tasks.
    pub fn scheduled_tasks_revision(&self, cluster_arn: &str) -> u64 {
        self.child_revisions
            .get(cluster_arn)
            .map_or(0, |r| r.scheduled_tasks)
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn cluster_by_arn(&self, arn: &str) -> Option<&Arc<Cluster>> {
        self.clusters.iter().find(|c| c.arn == arn)
    }

    pub fn cluster_by_name(&self, name: &str) -> Option<&Arc<Cluster>> {
        self.clusters.iter().find(|c| c.name == name)
    }

    /// Look a cluster up by ARN first, then by name.
    pub fn find_cluster(&self, identifier: &str) -> Option<&Arc<Cluster>> {
        self.cluster_by_arn(identifier)
            .or_else(|| self.cluster_by_name(identifier))
    }

    pub fn services_for_cluster<'a>(
        &'a self,
        cluster_name: &'a str,
    ) -> impl Iterator<Item = &'a Arc<Service>> + 'a {
        self.services
            .iter()
            .filter(move |s| s.cluster_name == cluster_name)
    }

    pub fn service(&self, cluster_name: &str, name: &str) -> Option<&Arc<Service>> {
        self.services.iter().find(|s| s.key() == (cluster_name, name))
    }

    pub fn scheduled_tasks_for_cluster<'a>(
        &'a self,
        cluster_name: &'a str,
    ) -> impl Iterator<Item = &'a Arc<ScheduledTask>> + 'a {
        self.scheduled_tasks
            .iter()
            .filter(move |t| t.cluster_name == cluster_name)
    }

    pub fn instance_by_id(&self, instance_id: &str) -> Option<&Arc<Instance>> {
        self.instances.iter().find(|i| i.instance_id == instance_id)
    }

    pub fn services_matching(&self, filter: &ServiceFilter) -> Vec<Arc<Service>> {
        self.services
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect()
    }

    pub fn instances_matching(&self, filter: &InstanceFilter) -> Vec<Arc<Instance>> {
        self.instances
            .iter()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect()
    }
}

// ── Tests ────────────────────────────────────────────────────────────
