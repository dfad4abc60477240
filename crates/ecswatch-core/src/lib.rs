// ecswatch-core: Progressive snapshot reconciliation between ecswatch-api and consumers (CLI).

pub mod config;
pub mod console;
pub mod error;
pub mod model;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{AuthCredentials, ConsoleConfig, TlsVerification};
pub use console::{Console, SessionSettings};
pub use error::CoreError;
pub use store::{ClusterView, Reconciler, ReconcilerInput, Snapshot};
pub use stream::{InstanceFilter, ServiceFilter, SnapshotStream, SnapshotWatchStream};

pub use ecswatch_api::{ConnectionState, TransportKind};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    // Entities
    Cluster, ClusterStatus, Deployment, Instance, InstanceState, ScheduledTask, Service,
    TaskDefinition,
    // Loading cycle
    LoadError, LoadingProgress, LoadingStage, RefreshInterval,
};
