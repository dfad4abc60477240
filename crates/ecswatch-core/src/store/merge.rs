// ── Merge rules for inbound updates ──
//
// Every entity is replaced wholesale under its stable key: clusters by
// ARN, services by (cluster, name). Nothing is field-patched, so a
// duplicated or dropped event is corrected by the next one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use ecswatch_api::protocol::{
    ClusterScheduledTasksUpdate, ClusterServicesUpdate, ClustersBasicUpdate, ClustersError,
    ClustersUpdate, Ec2InventoryUpdate, LoadingComplete,
};

use super::Snapshot;
use crate::model::{Cluster, LoadError, LoadingProgress, LoadingStage, TaskDefinition};

impl Snapshot {
    /// Single-shot update: replace everything and end any running cycle.
    pub(crate) fn replace_all(&mut self, update: &ClustersUpdate) {
        self.clusters = update.clusters.clusters.clone();
        self.instances = update.ec2_instances.instances.clone();
        self.child_revisions.clear();
        let arns: Vec<_> = self.clusters.iter().map(|c| c.arn.clone()).collect();
        for arn in &arns {
            self.bump_services(arn);
            self.bump_scheduled_tasks(arn);
        }
        self.rebuild_flat();
        self.touch(update.updated_on);
        self.end_cycle();
        self.last_error = None;
    }

    /// Cluster metadata merge.
    ///
    /// The first basic update of a cycle defines which clusters exist;
    /// later ones in the same cycle only upsert. Either way a cluster that
    /// already has services or scheduled tasks keeps them.
    pub(crate) fn merge_basic(&mut self, update: &ClustersBasicUpdate) {
        self.begin_cycle();
        let authoritative = !self.basic_seen;
        self.basic_seen = true;

        let mut merged: IndexMap<String, Arc<Cluster>> = if authoritative {
            IndexMap::new()
        } else {
            self.clusters
                .iter()
                .map(|c| (c.arn.clone(), Arc::clone(c)))
                .collect()
        };

        for incoming in &update.clusters {
            let cluster = match self.cluster_by_arn(&incoming.arn) {
                Some(existing) => incoming.with_children_of(existing),
                None => incoming.clone(),
            };
            merged.insert(cluster.arn.clone(), Arc::new(cluster));
        }

        let dropped = self.clusters.len().saturating_sub(merged.len());
        self.clusters = merged.into_values().collect();
        self.rebuild_flat();
        self.record_stage(LoadingStage::ClustersBasic);
        self.touch(update.updated_on);

        tracing::debug!(
            clusters = self.clusters.len(),
            authoritative,
            dropped,
            "merged basic cluster update"
        );
    }

    /// Replace one cluster's services. Returns `false` (and changes
    /// nothing) when the cluster is not in the snapshot.
    pub(crate) fn merge_services(&mut self, update: &ClusterServicesUpdate) -> bool {
        let Some(index) = self.cluster_index(&update.cluster_arn) else {
            tracing::debug!(
                cluster_arn = %update.cluster_arn,
                "services update for unknown cluster, skipping"
            );
            return false;
        };

        let services: Vec<_> = update
            .services
            .iter()
            .map(|s| (s.name.clone(), Arc::clone(s)))
            .collect::<IndexMap<_, _>>()
            .into_values()
            .collect();

        let current = &self.clusters[index];
        self.clusters[index] = Arc::new(Cluster {
            services_count: u32::try_from(services.len()).unwrap_or(u32::MAX),
            services,
            ..Cluster::clone(current)
        });

        self.begin_cycle();
        self.bump_services(&update.cluster_arn);
        self.rebuild_flat();
        self.record_stage(LoadingStage::ClusterServices);
        self.touch(update.updated_on);

        tracing::debug!(
            cluster = %self.clusters[index].name,
            services = self.clusters[index].services.len(),
            "merged cluster services"
        );
        true
    }

    /// Replace one cluster's scheduled tasks. Same contract as
    /// [`merge_services`](Self::merge_services).
    pub(crate) fn merge_scheduled_tasks(&mut self, update: &ClusterScheduledTasksUpdate) -> bool {
        let Some(index) = self.cluster_index(&update.cluster_arn) else {
            tracing::debug!(
                cluster_arn = %update.cluster_arn,
                cluster = %update.cluster_name,
                "scheduled tasks update for unknown cluster, skipping"
            );
            return false;
        };

        let scheduled_tasks: Vec<_> = update
            .scheduled_tasks
            .iter()
            .map(|t| (t.name.clone(), Arc::clone(t)))
            .collect::<IndexMap<_, _>>()
            .into_values()
            .collect();

        let current = &self.clusters[index];
        self.clusters[index] = Arc::new(Cluster {
            scheduled_tasks,
            ..Cluster::clone(current)
        });

        self.begin_cycle();
        self.bump_scheduled_tasks(&update.cluster_arn);
        self.rebuild_flat();
        self.record_stage(LoadingStage::ClusterScheduledTasks);
        self.touch(update.updated_on);

        tracing::debug!(
            cluster = %update.cluster_name,
            scheduled_tasks = self.clusters[index].scheduled_tasks.len(),
            "merged cluster scheduled tasks"
        );
        true
    }

    /// Replace the instance inventory. Counts as a stage only inside a
    /// running cycle; on its own it never starts one.
    pub(crate) fn replace_instances(&mut self, update: &Ec2InventoryUpdate) {
        self.instances = update.instances.clone();
        if self.is_loading {
            self.record_stage(LoadingStage::Ec2Inventory);
        }
        self.touch(update.updated_on);
        tracing::debug!(instances = self.instances.len(), "replaced EC2 inventory");
    }

    pub(crate) fn record_progress(&mut self, progress: &LoadingProgress) {
        self.begin_cycle();
        self.progress = progress.clone();
        if !progress.stage.is_empty() {
            self.record_stage(LoadingStage::from(progress.stage.as_str()));
        }
    }

    pub(crate) fn complete(&mut self, event: &LoadingComplete) {
        self.end_cycle();
        if let Some(at) = event.updated_on {
            self.touch(at);
        }
    }

    /// End the cycle with an error. Data merged so far stays visible.
    pub(crate) fn fail(&mut self, event: &ClustersError, received_at: DateTime<Utc>) -> Arc<LoadError> {
        self.end_cycle();
        let error = Arc::new(LoadError {
            message: event.error.clone(),
            cluster_name: event.cluster_name.clone(),
            details: event.details.clone(),
            received_at,
        });
        self.last_error = Some(Arc::clone(&error));
        error
    }

    /// Enter LOADING if idle. A new cycle clears the previous error.
    pub(crate) fn begin_cycle(&mut self) {
        if !self.is_loading {
            self.is_loading = true;
            self.last_error = None;
            self.loading_stages.clear();
            self.basic_seen = false;
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    fn end_cycle(&mut self) {
        self.completed_cycles += 1;
        self.is_loading = false;
        self.progress = LoadingProgress::default();
        self.loading_stages.clear();
        self.basic_seen = false;
    }

    fn record_stage(&mut self, stage: LoadingStage) {
        self.loading_stages.insert(stage);
    }

    /// `updated_on` never moves backwards within a session.
    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_on = Some(self.updated_on.map_or(at, |current| current.max(at)));
    }

    fn bump_services(&mut self, arn: &str) {
        self.merge_counter += 1;
        self.child_revisions.entry(arn.to_owned()).or_default().services = self.merge_counter;
    }

    fn bump_scheduled_tasks(&mut self, arn: &str) {
        self.merge_counter += 1;
        self.child_revisions
            .entry(arn.to_owned())
            .or_default()
            .scheduled_tasks = self.merge_counter;
    }

    fn cluster_index(&self, arn: &str) -> Option<usize> {
        self.clusters.iter().position(|c| c.arn == arn)
    }

    /// Rebuild every flat list from the clusters' nested collections.
    fn rebuild_flat(&mut self) {
        self.services = self
            .clusters
            .iter()
            .flat_map(|c| c.services.iter().cloned())
            .collect();
        self.scheduled_tasks = self
            .clusters
            .iter()
            .flat_map(|c| c.scheduled_tasks.iter().cloned())
            .collect();
        self.deployments = self
            .services
            .iter()
            .flat_map(|s| s.deployments.iter().cloned())
            .collect();

        let mut definitions: IndexMap<String, Arc<TaskDefinition>> = IndexMap::new();
        for definition in self.services.iter().filter_map(|s| s.task_definition.as_ref()) {
            let key = definition.arn.clone().unwrap_or_else(|| definition.label());
            definitions.entry(key).or_insert_with(|| Arc::clone(definition));
        }
        self.task_definitions = definitions.into_values().collect();
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::model::{Deployment, Service};

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 10, minute, 0).unwrap()
    }

    fn cluster(name: &str, arn: &str) -> Cluster {
        Cluster {
            name: name.into(),
            arn: arn.into(),
            ..Cluster::default()
        }
    }

    fn service(cluster: &str, name: &str, family: &str) -> Arc<Service> {
        Arc::new(Service {
            name: name.into(),
            cluster_name: cluster.into(),
            task_definition: Some(Arc::new(TaskDefinition {
                family: family.into(),
                revision: 1,
                ..TaskDefinition::default()
            })),
            deployments: vec![Arc::new(Deployment {
                id: format!("{name}-d1"),
                ..Deployment::default()
            })],
            ..Service::default()
        })
    }

    fn basic(clusters: Vec<Cluster>, minute: u32) -> ClustersBasicUpdate {
        ClustersBasicUpdate {
            clusters,
            updated_on: at(minute),
        }
    }

    fn services(arn: &str, services: Vec<Arc<Service>>, minute: u32) -> ClusterServicesUpdate {
        ClusterServicesUpdate {
            cluster_arn: arn.into(),
            cluster_name: None,
            services,
            updated_on: at(minute),
        }
    }

    #[test]
    fn basic_update_keeps_children_of_known_clusters() {
        let mut snap = Snapshot::default();
        snap.merge_basic(&basic(vec![cluster("prod", "arn:1")], 0));
        snap.merge_services(&services("arn:1", vec![service("prod", "api", "api")], 1));
        snap.end_cycle();

        let mut renamed = cluster("prod", "arn:1");
        renamed.running_tasks = 7;
        snap.merge_basic(&basic(vec![renamed], 2));

        assert_eq!(snap.clusters[0].running_tasks, 7);
        assert_eq!(snap.clusters[0].services.len(), 1);
        assert_eq!(snap.services.len(), 1);
    }

    #[test]
    fn first_basic_update_of_a_cycle_drops_absent_clusters() {
        let mut snap = Snapshot::default();
        snap.merge_basic(&basic(vec![cluster("prod", "arn:1"), cluster("dev", "arn:2")], 0));
        snap.merge_services(&services("arn:2", vec![service("dev", "web", "web")], 1));
        snap.end_cycle();

        snap.merge_basic(&basic(vec![cluster("prod", "arn:1")], 2));
        assert_eq!(snap.clusters.len(), 1);
        assert!(snap.services.is_empty(), "services of a removed cluster must disappear");
    }

    #[test]
    fn announced_basic_stage_does_not_make_the_update_an_upsert() {
        let mut snap = Snapshot::default();
        snap.merge_basic(&basic(vec![cluster("prod", "arn:1"), cluster("old", "arn:2")], 0));
        snap.merge_services(&services("arn:2", vec![service("old", "web", "web")], 1));
        snap.end_cycle();

        snap.record_progress(&LoadingProgress {
            current: 1,
            total: 3,
            stage: "clusters-basic".into(),
        });
        snap.merge_basic(&basic(vec![cluster("prod", "arn:1")], 2));

        let names: Vec<_> = snap.clusters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["prod"]);
        assert!(snap.services.is_empty());
    }

    #[test]
    fn later_basic_update_in_same_cycle_upserts() {
        let mut snap = Snapshot::default();
        snap.merge_basic(&basic(vec![cluster("prod", "arn:1")], 0));
        snap.merge_basic(&basic(vec![cluster("dev", "arn:2")], 1));
        let names: Vec<_> = snap.clusters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["prod", "dev"]);
    }

    #[test]
    fn services_merge_rebuilds_flat_lists() {
        let mut snap = Snapshot::default();
        snap.merge_basic(&basic(vec![cluster("prod", "arn:1")], 0));
        snap.merge_services(&services(
            "arn:1",
            vec![service("prod", "api", "shared"), service("prod", "worker", "shared")],
            1,
        ));
        assert_eq!(snap.services.len(), 2);
        assert_eq!(snap.deployments.len(), 2);
        assert_eq!(snap.task_definitions.len(), 1, "task definitions are deduplicated");
        assert_eq!(snap.clusters[0].services_count, 2);

        // shrink: the stale row must disappear from the flat list
        snap.merge_services(&services("arn:1", vec![service("prod", "api", "shared")], 2));
        assert_eq!(snap.services.len(), 1);
        assert_eq!(snap.deployments.len(), 1);
    }

    #[test]
    fn child_revisions_move_only_with_their_own_merge() {
        let mut snap = Snapshot::default();
        snap.merge_basic(&basic(vec![cluster("prod", "arn:1")], 0));
        snap.merge_services(&services("arn:1", vec![], 1));
        let services_rev = snap.services_revision("arn:1");
        let tasks_rev = snap.scheduled_tasks_revision("arn:1");
        assert!(services_rev > 0);

        snap.merge_basic(&basic(vec![cluster("prod", "arn:1")], 2));
        snap.merge_scheduled_tasks(&ClusterScheduledTasksUpdate {
            cluster_arn: "arn:1".into(),
            cluster_name: "prod".into(),
            scheduled_tasks: vec![],
            updated_on: at(3),
        });
        assert_eq!(snap.services_revision("arn:1"), services_rev);
        assert!(snap.scheduled_tasks_revision("arn:1") > tasks_rev);

        // an empty list reloaded again still counts as a reload
        snap.merge_services(&services("arn:1", vec![], 4));
        assert!(snap.services_revision("arn:1") > services_rev);
        assert_eq!(snap.services_revision("arn:unknown"), 0);
    }

    #[test]
    fn duplicate_service_names_in_payload_collapse() {
        let mut snap = Snapshot::default();
        snap.merge_basic(&basic(vec![cluster("prod", "arn:1")], 0));
        snap.merge_services(&services(
            "arn:1",
            vec![service("prod", "api", "v1"), service("prod", "api", "v2")],
            1,
        ));
        assert_eq!(snap.services.len(), 1);
        assert_eq!(snap.services[0].task_definition.as_ref().unwrap().family, "v2");
    }

    #[test]
    fn updated_on_never_moves_backwards() {
        let mut snap = Snapshot::default();
        snap.merge_basic(&basic(vec![cluster("prod", "arn:1")], 5));
        snap.merge_services(&services("arn:1", vec![], 3));
        assert_eq!(snap.updated_on, Some(at(5)));
    }

    #[test]
    fn inventory_alone_does_not_start_a_cycle() {
        let mut snap = Snapshot::default();
        snap.replace_instances(&Ec2InventoryUpdate {
            instances: vec![],
            updated_on: at(0),
        });
        assert!(!snap.is_loading);
        assert!(snap.loading_stages.is_empty());

        snap.begin_cycle();
        snap.replace_instances(&Ec2InventoryUpdate {
            instances: vec![],
            updated_on: at(1),
        });
        assert!(snap.is_stage_loaded(&LoadingStage::Ec2Inventory));
    }

    #[test]
    fn new_cycle_clears_previous_error() {
        let mut snap = Snapshot::default();
        snap.begin_cycle();
        snap.fail(
            &ClustersError {
                error: "AccessDenied".into(),
                cluster_name: None,
                details: None,
            },
            at(0),
        );
        assert!(snap.last_error.is_some());
        assert_eq!(snap.completed_cycles, 1);

        snap.record_progress(&LoadingProgress {
            current: 1,
            total: 4,
            stage: "clusters-basic".into(),
        });
        assert!(snap.last_error.is_none());
        assert!(snap.is_loading);
    }
}
