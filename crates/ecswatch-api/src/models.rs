// Wire types for the infrastructure entities the backend pushes.
//
// Field names follow the backend's camelCase JSON. Everything except the
// identity fields is defaulted: progressive delivery sends partial clusters
// first and fills the rest in later events.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

// ── Cluster ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterStatus {
    #[default]
    Active,
    Inactive,
    Failed,
    Provisioning,
    Deprovisioning,
}

/// An ECS cluster. The aggregation root for services and scheduled tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub name: String,
    pub arn: String,
    #[serde(default)]
    pub status: ClusterStatus,
    #[serde(default)]
    pub running_tasks: u32,
    #[serde(default)]
    pub pending_tasks: u32,
    #[serde(default)]
    pub registered_instances: u32,
    #[serde(default)]
    pub services_count: u32,
    #[serde(default)]
    pub services: Vec<Arc<Service>>,
    #[serde(default)]
    pub scheduled_tasks: Vec<Arc<ScheduledTask>>,
}

impl Cluster {
    /// Same cluster metadata with child collections taken from `children`.
    pub fn with_children_of(&self, children: &Cluster) -> Self {
        Self {
            services: children.services.clone(),
            scheduled_tasks: children.scheduled_tasks.clone(),
            ..self.clone()
        }
    }
}

// ── Service ──────────────────────────────────────────────────────────

/// A long-running workload inside a cluster.
///
/// Identity is `(cluster_name, name)`: the backend does not always send a
/// service ARN, and service names are only unique within their cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub name: String,
    pub cluster_name: String,
    #[serde(default)]
    pub arn: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub desired_count: u32,
    #[serde(default)]
    pub running_count: u32,
    #[serde(default)]
    pub pending_count: u32,
    #[serde(default)]
    pub launch_type: Option<String>,
    #[serde(default)]
    pub task_definition: Option<Arc<TaskDefinition>>,
    /// Most recent first.
    #[serde(default)]
    pub deployments: Vec<Arc<Deployment>>,
    #[serde(default)]
    pub deployment_status: Option<DeploymentStatus>,
}

impl Service {
    pub fn key(&self) -> (&str, &str) {
        (self.cluster_name.as_str(), self.name.as_str())
    }

    /// Fewer tasks running than desired.
    pub fn is_degraded(&self) -> bool {
        self.running_count < self.desired_count
    }

    pub fn is_stuck(&self) -> bool {
        self.deployment_status.as_ref().is_some_and(|s| s.is_stuck)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    #[serde(default)]
    pub arn: Option<String>,
    pub family: String,
    #[serde(default)]
    pub revision: u32,
    #[serde(default)]
    pub cpu: Option<String>,
    #[serde(default)]
    pub memory: Option<String>,
    #[serde(default)]
    pub containers: Vec<ContainerDefinition>,
}

impl TaskDefinition {
    /// `family:revision`, the form the ECS console shows.
    pub fn label(&self) -> String {
        format!("{}:{}", self.family, self.revision)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDefinition {
    pub name: String,
    #[serde(default)]
    pub image: String,
}

/// One rollout attempt of a service's task definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub rollout_state: Option<String>,
    #[serde(default)]
    pub task_definition: Option<String>,
    #[serde(default)]
    pub desired_count: u32,
    #[serde(default)]
    pub running_count: u32,
    #[serde(default)]
    pub pending_count: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Rollout health as judged by the backend. Carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatus {
    #[serde(default)]
    pub is_stuck: bool,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image_diff: Vec<ImageDiff>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDiff {
    pub container: String,
    #[serde(default)]
    pub current: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
}

// ── Scheduled task ───────────────────────────────────────────────────

/// A cron-triggered task bound to a cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    pub name: String,
    pub cluster_name: String,
    #[serde(default, alias = "scheduleExpression")]
    pub cron: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub task_definition: Option<String>,
    #[serde(default)]
    pub next_runs: Vec<DateTime<Utc>>,
}

// ── EC2 instance ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum InstanceState {
    #[default]
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub instance_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub instance_type: String,
    #[serde(default)]
    pub state: InstanceState,
    #[serde(default)]
    pub private_ip: Option<String>,
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub launch_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub services: Option<Vec<InstanceService>>,
}

/// A service with tasks placed on an instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceService {
    pub name: String,
    #[serde(default)]
    pub cluster_name: Option<String>,
}

// ── Tests ────────────────────────────────────────────────────────────
