// ── Loading-cycle bookkeeping types ──

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marker recorded once a kind of partial update has been applied in the
/// current loading cycle.
///
/// Progress events may report stages the console has no special handling
/// for; those are kept verbatim as [`Other`](Self::Other).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LoadingStage {
    ClustersBasic,
    ClusterServices,
    ClusterScheduledTasks,
    Ec2Inventory,
    Other(String),
}

impl LoadingStage {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ClustersBasic => "clusters-basic",
            Self::ClusterServices => "cluster-services",
            Self::ClusterScheduledTasks => "cluster-scheduled-tasks",
            Self::Ec2Inventory => "ec2-inventory",
            Self::Other(tag) => tag,
        }
    }
}

impl From<&str> for LoadingStage {
    fn from(tag: &str) -> Self {
        match tag {
            "clusters-basic" => Self::ClustersBasic,
            "cluster-services" => Self::ClusterServices,
            "cluster-scheduled-tasks" => Self::ClusterScheduledTasks,
            "ec2-inventory" => Self::Ec2Inventory,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<String> for LoadingStage {
    fn from(tag: String) -> Self {
        Self::from(tag.as_str())
    }
}

impl From<LoadingStage> for String {
    fn from(stage: LoadingStage) -> Self {
        match stage {
            LoadingStage::Other(tag) => tag,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for LoadingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed loading cycle, as surfaced to consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadError {
    pub message: String,
    pub cluster_name: Option<String>,
    pub details: Option<serde_json::Value>,
    /// Local receive time; the backend does not timestamp errors.
    pub received_at: DateTime<Utc>,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cluster_name {
            Some(ref cluster) => write!(f, "{} (cluster {cluster})", self.message),
            None => f.write_str(&self.message),
        }
    }
}
