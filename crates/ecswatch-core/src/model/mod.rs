// ── Domain model ──
//
// Entity types come straight from the wire protocol: the backend already
// sends them in their canonical shape, and the reconciler replaces them
// wholesale rather than patching fields. This module adds the types that
// only exist on the client side.

mod interval;
mod loading;

pub use interval::RefreshInterval;
pub use loading::{LoadError, LoadingStage};

// ── Re-exports ──────────────────────────────────────────────────────
// Flat access: `use ecswatch_core::model::*` gives you everything.

pub use ecswatch_api::models::{
    Cluster, ClusterStatus, ContainerDefinition, Deployment, DeploymentStatus, ImageDiff,
    Instance, InstanceService, InstanceState, ScheduledTask, Service, TaskDefinition,
};
pub use ecswatch_api::protocol::LoadingProgress;
