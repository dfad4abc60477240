//! Typed channel protocol.
//!
//! Every event the backend emits is a variant of [`InboundEvent`] with a
//! concrete payload; every command the console sends is a variant of
//! [`OutboundCommand`]. Event names only exist at this boundary.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::Error;
use crate::models::{Cluster, Instance, ScheduledTask, Service};

// ── Event names ──────────────────────────────────────────────────────

/// Closed set of inbound event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum EventKind {
    ClustersUpdate,
    ClustersBasicUpdate,
    ClusterServicesUpdate,
    ClusterScheduledTasksUpdate,
    #[strum(serialize = "ec2-inventory-update")]
    Ec2InventoryUpdate,
    LoadingProgress,
    LoadingComplete,
    ClustersError,
    IntervalUpdated,
}

// ── Inbound payloads ─────────────────────────────────────────────────

/// `clusters-update`: the single-shot snapshot used when progressive
/// loading is off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClustersUpdate {
    pub clusters: ClusterList,
    #[serde(default)]
    pub ec2_instances: InstanceList,
    pub updated_on: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterList {
    #[serde(default)]
    pub clusters: Vec<Arc<Cluster>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceList {
    #[serde(default)]
    pub instances: Vec<Arc<Instance>>,
}

/// `clusters-basic-update`: cluster metadata without child collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClustersBasicUpdate {
    pub clusters: Vec<Cluster>,
    pub updated_on: DateTime<Utc>,
}

/// `cluster-services-update`: every service of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterServicesUpdate {
    pub cluster_arn: String,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub services: Vec<Arc<Service>>,
    pub updated_on: DateTime<Utc>,
}

/// `cluster-scheduled-tasks-update`: every scheduled task of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterScheduledTasksUpdate {
    pub cluster_arn: String,
    pub cluster_name: String,
    #[serde(default)]
    pub scheduled_tasks: Vec<Arc<ScheduledTask>>,
    pub updated_on: DateTime<Utc>,
}

/// `ec2-inventory-update`: the full instance inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ec2InventoryUpdate {
    #[serde(default)]
    pub instances: Vec<Arc<Instance>>,
    pub updated_on: DateTime<Utc>,
}

/// `loading-progress`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingProgress {
    #[serde(default)]
    pub current: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub stage: String,
}

/// `loading-complete`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingComplete {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub updated_on: Option<DateTime<Utc>>,
}

/// `clusters-error`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClustersError {
    #[serde(deserialize_with = "string_or_json")]
    pub error: String,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub details: Option<Value>,
}

/// `interval-updated`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalUpdated {
    pub interval_time: i64,
}

/// The backend sometimes sends an error object instead of a message.
fn string_or_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Object(map) => {
            let message = map.get("message").and_then(Value::as_str).map(str::to_owned);
            message.unwrap_or_else(|| Value::Object(map).to_string())
        }
        other => other.to_string(),
    })
}

// ── InboundEvent ─────────────────────────────────────────────────────

/// An event received from the backend, decoded into its typed payload.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    ClustersUpdate(ClustersUpdate),
    ClustersBasicUpdate(ClustersBasicUpdate),
    ClusterServicesUpdate(ClusterServicesUpdate),
    ClusterScheduledTasksUpdate(ClusterScheduledTasksUpdate),
    Ec2InventoryUpdate(Ec2InventoryUpdate),
    LoadingProgress(LoadingProgress),
    LoadingComplete(LoadingComplete),
    ClustersError(ClustersError),
    IntervalUpdated(IntervalUpdated),
}

impl InboundEvent {
    /// Decode a named event.
    ///
    /// Returns `Ok(None)` for event names outside the protocol, so a newer
    /// backend can add events without breaking older consoles.
    pub fn decode(name: &str, payload: Value) -> Result<Option<Self>, Error> {
        let Ok(kind) = EventKind::from_str(name) else {
            return Ok(None);
        };
        Self::decode_kind(kind, payload).map(Some)
    }

    fn decode_kind(kind: EventKind, payload: Value) -> Result<Self, Error> {
        fn parse<T: serde::de::DeserializeOwned>(payload: Value) -> Result<T, Error> {
            let body = payload.to_string();
            serde_json::from_value(payload).map_err(|e| Error::deserialization(&e, body))
        }

        Ok(match kind {
            EventKind::ClustersUpdate => Self::ClustersUpdate(parse(payload)?),
            EventKind::ClustersBasicUpdate => Self::ClustersBasicUpdate(parse(payload)?),
            EventKind::ClusterServicesUpdate => Self::ClusterServicesUpdate(parse(payload)?),
            EventKind::ClusterScheduledTasksUpdate => {
                Self::ClusterScheduledTasksUpdate(parse(payload)?)
            }
            EventKind::Ec2InventoryUpdate => Self::Ec2InventoryUpdate(parse(payload)?),
            EventKind::LoadingProgress => Self::LoadingProgress(parse(payload)?),
            EventKind::LoadingComplete => Self::LoadingComplete(parse(payload)?),
            EventKind::ClustersError => Self::ClustersError(parse(payload)?),
            EventKind::IntervalUpdated => Self::IntervalUpdated(parse(payload)?),
        })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::ClustersUpdate(_) => EventKind::ClustersUpdate,
            Self::ClustersBasicUpdate(_) => EventKind::ClustersBasicUpdate,
            Self::ClusterServicesUpdate(_) => EventKind::ClusterServicesUpdate,
            Self::ClusterScheduledTasksUpdate(_) => EventKind::ClusterScheduledTasksUpdate,
            Self::Ec2InventoryUpdate(_) => EventKind::Ec2InventoryUpdate,
            Self::LoadingProgress(_) => EventKind::LoadingProgress,
            Self::LoadingComplete(_) => EventKind::LoadingComplete,
            Self::ClustersError(_) => EventKind::ClustersError,
            Self::IntervalUpdated(_) => EventKind::IntervalUpdated,
        }
    }
}

// ── OutboundCommand ──────────────────────────────────────────────────

/// A fire-and-forget command for the backend. No acknowledgement exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundCommand {
    /// `-1` automatic, `0` paused, `>0` seconds.
    SetInterval { interval_time: i64 },
    ManualRefresh,
    ToggleProgressiveLoading { enabled: bool },
    RefreshClusterServices { cluster_name: String },
    RefreshClusterScheduledTasks {
        cluster_name: String,
        cluster_arn: String,
    },
    GetEc2Inventory,
}

impl OutboundCommand {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::SetInterval { .. } => "set-interval",
            Self::ManualRefresh => "manual-refresh",
            Self::ToggleProgressiveLoading { .. } => "toggle-progressive-loading",
            Self::RefreshClusterServices { .. } => "refresh-cluster-services",
            Self::RefreshClusterScheduledTasks { .. } => "refresh-cluster-scheduled-tasks",
            Self::GetEc2Inventory => "get-ec2-inventory",
        }
    }

    /// Event payload; `Null` means the event is emitted without arguments.
    pub fn payload(&self) -> Value {
        match self {
            Self::SetInterval { interval_time } => json!(interval_time),
            Self::ManualRefresh | Self::GetEc2Inventory => Value::Null,
            Self::ToggleProgressiveLoading { enabled } => json!({ "enabled": enabled }),
            Self::RefreshClusterServices { cluster_name } => {
                json!({ "clusterName": cluster_name })
            }
            Self::RefreshClusterScheduledTasks {
                cluster_name,
                cluster_arn,
            } => json!({ "clusterName": cluster_name, "clusterArn": cluster_arn }),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn event_kind_round_trips_wire_names() {
        let names: Vec<&'static str> = EventKind::iter().map(Into::into).collect();
        assert_eq!(
            names,
            vec![
                "clusters-update",
                "clusters-basic-update",
                "cluster-services-update",
                "cluster-scheduled-tasks-update",
                "ec2-inventory-update",
                "loading-progress",
                "loading-complete",
                "clusters-error",
                "interval-updated",
            ]
        );
        for kind in EventKind::iter() {
            assert_eq!(EventKind::from_str(&kind.to_string()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_event_is_ignored() {
        assert!(InboundEvent::decode("user-joined", json!({})).unwrap().is_none());
    }

    #[test]
    fn decodes_full_legacy_update() {
        let event = InboundEvent::decode(
            "clusters-update",
            json!({
                "clusters": { "clusters": [{
                    "name": "prod",
                    "arn": "arn:1",
                    "services": [{ "name": "api", "clusterName": "prod" }]
                }]},
                "ec2Instances": { "instances": [{ "instanceId": "i-1", "state": "running" }] },
                "updatedOn": "2026-03-01T10:00:00Z"
            }),
        )
        .unwrap()
        .unwrap();

        let InboundEvent::ClustersUpdate(update) = event else {
            panic!("expected clusters-update");
        };
        assert_eq!(update.clusters.clusters.len(), 1);
        assert_eq!(update.clusters.clusters[0].services[0].name, "api");
        assert_eq!(update.ec2_instances.instances[0].instance_id, "i-1");
    }

    #[test]
    fn decodes_services_update_without_cluster_name() {
        let event = InboundEvent::decode(
            "cluster-services-update",
            json!({
                "clusterArn": "arn:1",
                "services": [],
                "updatedOn": "2026-03-01T10:00:00Z"
            }),
        )
        .unwrap()
        .unwrap();
        assert_eq!(event.kind(), EventKind::ClusterServicesUpdate);
    }

    #[test]
    fn clusters_error_accepts_object_error() {
        let event = InboundEvent::decode(
            "clusters-error",
            json!({ "error": { "message": "AccessDenied", "code": 403 }, "clusterName": "prod" }),
        )
        .unwrap()
        .unwrap();
        let InboundEvent::ClustersError(err) = event else {
            panic!("expected clusters-error");
        };
        assert_eq!(err.error, "AccessDenied");
        assert_eq!(err.cluster_name.as_deref(), Some("prod"));
    }

    #[test]
    fn malformed_payload_is_a_deserialization_error() {
        let err = InboundEvent::decode("interval-updated", json!({ "intervalTime": "soon" }))
            .unwrap_err();
        assert!(matches!(err, Error::Deserialization { .. }));
    }

    #[test]
    fn command_payloads_match_wire_shapes() {
        assert_eq!(OutboundCommand::SetInterval { interval_time: -1 }.payload(), json!(-1));
        assert!(OutboundCommand::ManualRefresh.payload().is_null());
        assert_eq!(
            OutboundCommand::ToggleProgressiveLoading { enabled: true }.payload(),
            json!({ "enabled": true })
        );
        let cmd = OutboundCommand::RefreshClusterScheduledTasks {
            cluster_name: "prod".into(),
            cluster_arn: "arn:1".into(),
        };
        assert_eq!(cmd.event_name(), "refresh-cluster-scheduled-tasks");
        assert_eq!(cmd.payload(), json!({ "clusterName": "prod", "clusterArn": "arn:1" }));
    }
}
