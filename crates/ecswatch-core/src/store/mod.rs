// ── Snapshot store ──
//
// The reconciler applies inbound events to a working snapshot and
// publishes immutable copies to consumers.

mod merge;
mod reconciler;
mod snapshot;

pub use reconciler::{Reconciler, ReconcilerInput};
pub use snapshot::{ClusterView, Snapshot};
