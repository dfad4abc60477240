// ── Reconciler ──
//
// Owns the canonical snapshot. Inbound events are applied one at a time,
// to completion, in delivery order; each applied event publishes a new
// immutable `Arc<Snapshot>` through a watch channel.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, watch};

use ecswatch_api::InboundEvent;

use super::Snapshot;
use crate::model::{LoadError, RefreshInterval};

const ERROR_CHANNEL_CAPACITY: usize = 64;

/// Work item for the reconciler task.
#[derive(Debug, Clone)]
pub enum ReconcilerInput {
    Event(Arc<InboundEvent>),
    /// The user asked for a refresh; enter LOADING ahead of the backend.
    RefreshRequested,
}

pub struct Reconciler {
    snapshot: Snapshot,
    snapshot_tx: watch::Sender<Arc<Snapshot>>,
    interval_tx: watch::Sender<RefreshInterval>,
    error_tx: broadcast::Sender<Arc<LoadError>>,
}

impl Reconciler {
    pub fn new(refresh_interval: RefreshInterval) -> Self {
        let snapshot = Snapshot::new(refresh_interval);
        let (snapshot_tx, _) = watch::channel(Arc::new(snapshot.clone()));
        let (interval_tx, _) = watch::channel(refresh_interval);
        let (error_tx, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);

        Self {
            snapshot,
            snapshot_tx,
            interval_tx,
            error_tx,
        }
    }

    // ── Transitions ──────────────────────────────────────────────────

    pub fn handle(&mut self, input: &ReconcilerInput) {
        match input {
            ReconcilerInput::Event(event) => self.apply(event),
            ReconcilerInput::RefreshRequested => self.begin_refresh(),
        }
    }

    /// Apply one inbound event and publish the result.
    pub fn apply(&mut self, event: &InboundEvent) {
        let changed = match event {
            InboundEvent::ClustersUpdate(update) => {
                self.snapshot.replace_all(update);
                true
            }
            InboundEvent::ClustersBasicUpdate(update) => {
                self.snapshot.merge_basic(update);
                true
            }
            InboundEvent::ClusterServicesUpdate(update) => self.snapshot.merge_services(update),
            InboundEvent::ClusterScheduledTasksUpdate(update) => {
                self.snapshot.merge_scheduled_tasks(update)
            }
            InboundEvent::Ec2InventoryUpdate(update) => {
                self.snapshot.replace_instances(update);
                true
            }
            InboundEvent::LoadingProgress(progress) => {
                self.snapshot.record_progress(progress);
                true
            }
            InboundEvent::LoadingComplete(complete) => {
                tracing::info!(message = %complete.message, "loading cycle complete");
                self.snapshot.complete(complete);
                true
            }
            InboundEvent::ClustersError(error) => {
                let error = self.snapshot.fail(error, Utc::now());
                tracing::warn!(error = %error, "loading cycle failed");
                // No receivers is fine; the error also lives on the snapshot.
                let _ = self.error_tx.send(error);
                true
            }
            InboundEvent::IntervalUpdated(update) => {
                self.set_interval(RefreshInterval::from(update.interval_time));
                true
            }
        };

        if changed {
            self.publish();
        }
    }

    /// Manual refresh: enter LOADING now so consumers see the cycle start
    /// before the first backend event arrives.
    pub fn begin_refresh(&mut self) {
        self.snapshot.begin_cycle();
        self.publish();
    }

    fn set_interval(&mut self, interval: RefreshInterval) {
        self.snapshot.refresh_interval = interval;
        self.interval_tx.send_if_modified(|current| {
            if *current == interval {
                false
            } else {
                tracing::debug!(%interval, "refresh interval updated");
                *current = interval;
                true
            }
        });
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(Arc::new(self.snapshot.clone()));
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot_tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot_tx.subscribe()
    }

    pub fn interval_changes(&self) -> watch::Receiver<RefreshInterval> {
        self.interval_tx.subscribe()
    }

    pub fn errors(&self) -> broadcast::Receiver<Arc<LoadError>> {
        self.error_tx.subscribe()
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ecswatch_api::protocol::{ClustersError, IntervalUpdated, LoadingProgress};

    use super::*;

    #[test]
    fn error_is_broadcast_and_kept_on_snapshot() {
        let mut reconciler = Reconciler::new(RefreshInterval::AUTOMATIC);
        let mut errors = reconciler.errors();

        reconciler.apply(&InboundEvent::LoadingProgress(LoadingProgress {
            current: 1,
            total: 3,
            stage: "clusters-basic".into(),
        }));
        reconciler.apply(&InboundEvent::ClustersError(ClustersError {
            error: "ThrottlingException".into(),
            cluster_name: Some("prod".into()),
            details: None,
        }));

        let error = errors.try_recv().unwrap();
        assert_eq!(error.message, "ThrottlingException");
        let snap = reconciler.snapshot();
        assert_eq!(snap.last_error().unwrap().cluster_name.as_deref(), Some("prod"));
        assert!(!snap.is_loading());
    }

    #[test]
    fn interval_update_only_notifies_on_change() {
        let mut reconciler = Reconciler::new(RefreshInterval::AUTOMATIC);
        let mut changes = reconciler.interval_changes();
        changes.mark_unchanged();

        reconciler.apply(&InboundEvent::IntervalUpdated(IntervalUpdated { interval_time: -1 }));
        assert!(!changes.has_changed().unwrap());

        reconciler.apply(&InboundEvent::IntervalUpdated(IntervalUpdated { interval_time: 30 }));
        assert!(changes.has_changed().unwrap());
        assert_eq!(*changes.borrow_and_update(), RefreshInterval::from(30));
        assert_eq!(reconciler.snapshot().refresh_interval(), RefreshInterval::from(30));
    }

    #[test]
    fn manual_refresh_enters_loading() {
        let mut reconciler = Reconciler::new(RefreshInterval::PAUSED);
        let mut rx = reconciler.subscribe();
        rx.mark_unchanged();

        reconciler.handle(&ReconcilerInput::RefreshRequested);
        assert!(rx.has_changed().unwrap());
        assert!(reconciler.snapshot().is_loading());
        assert_eq!(reconciler.snapshot().refresh_interval(), RefreshInterval::PAUSED);
    }
}
