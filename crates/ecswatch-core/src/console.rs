// ── Console context ──
//
// One per logged-in session. Owns the channel singleton, the reconciler
// task that turns inbound events into snapshots, and the small helper
// tasks that keep session settings and client-driven polling in step
// with the connection.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OnceCell, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ecswatch_api::{Channel, ConnectionState, Listeners, OutboundCommand};

use crate::config::ConsoleConfig;
use crate::error::CoreError;
use crate::model::{LoadError, RefreshInterval};
use crate::store::{Reconciler, ReconcilerInput, Snapshot};
use crate::stream::SnapshotStream;

// ── Session settings ─────────────────────────────────────────────────

/// Settings the backend forgets on reconnect; replayed on every
/// transition to connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub progressive_loading: bool,
    pub refresh_interval: RefreshInterval,
}

// ── Console ──────────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ConsoleInner>`. Construction does no I/O;
/// the channel is opened lazily by the first call that needs it and is
/// shared by every clone afterwards.
#[derive(Clone)]
pub struct Console {
    inner: Arc<ConsoleInner>,
}

struct ConsoleInner {
    config: ConsoleConfig,
    channel: OnceCell<Channel>,
    settings: watch::Sender<SessionSettings>,
    input_tx: mpsc::UnboundedSender<ReconcilerInput>,
    snapshot_rx: watch::Receiver<Arc<Snapshot>>,
    interval_rx: watch::Receiver<RefreshInterval>,
    error_rx: broadcast::Receiver<Arc<LoadError>>,
    /// Reconciler and its input queue while no task is running them.
    parked: Mutex<Option<(Reconciler, mpsc::UnboundedReceiver<ReconcilerInput>)>>,
    attached: Mutex<Option<Attached>>,
}

/// Tasks spawned by one `attach`.
struct Attached {
    cancel: CancellationToken,
    reconciler: JoinHandle<(Reconciler, mpsc::UnboundedReceiver<ReconcilerInput>)>,
    helpers: Vec<JoinHandle<()>>,
}

impl Console {
    /// Create a console from configuration. Does NOT connect: call
    /// [`attach()`](Self::attach) to open the channel and start
    /// reconciling.
    pub fn new(config: ConsoleConfig) -> Self {
        let reconciler = Reconciler::new(config.refresh_interval);
        let snapshot_rx = reconciler.subscribe();
        let interval_rx = reconciler.interval_changes();
        let error_rx = reconciler.errors();
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (settings, _) = watch::channel(SessionSettings {
            progressive_loading: config.progressive_loading,
            refresh_interval: config.refresh_interval,
        });

        Self {
            inner: Arc::new(ConsoleInner {
                config,
                channel: OnceCell::new(),
                settings,
                input_tx,
                snapshot_rx,
                interval_rx,
                error_rx,
                parked: Mutex::new(Some((reconciler, input_rx))),
                attached: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.inner.config
    }

    /// The shared channel, opened on first use. Every later call (and
    /// every clone of this console) gets the same instance.
    pub async fn channel(&self) -> Result<Channel, CoreError> {
        let channel = self
            .inner
            .channel
            .get_or_try_init(|| async {
                info!(url = %self.inner.config.url, "opening console channel");
                Channel::open(self.inner.config.channel_config())
            })
            .await?;
        Ok(channel.clone())
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Open the channel (if needed), attach the reconciler's listeners,
    /// and start the background tasks.
    ///
    /// Idempotent: attaching an attached console only re-registers the
    /// listeners, which replaces rather than duplicates them.
    pub async fn attach(&self) -> Result<(), CoreError> {
        let channel = self.channel().await?;
        if channel.is_closed() {
            return Err(CoreError::ChannelClosed);
        }

        let mut attached = self.inner.attached.lock().await;
        channel.register(Listeners::forward_all_with(
            &self.inner.input_tx,
            ReconcilerInput::Event,
        ));
        if attached.is_some() {
            debug!("console already attached, listeners re-registered");
            return Ok(());
        }

        let Some((reconciler, input_rx)) = self.inner.parked.lock().await.take() else {
            return Err(CoreError::Internal("reconciler is unavailable".into()));
        };

        let cancel = CancellationToken::new();
        let reconciler = tokio::spawn(reconciler_task(reconciler, input_rx, cancel.clone()));
        let helpers = vec![
            tokio::spawn(settings_task(self.clone(), channel, cancel.clone())),
            tokio::spawn(poll_task(self.clone(), cancel.clone())),
        ];

        *attached = Some(Attached {
            cancel,
            reconciler,
            helpers,
        });
        info!("console attached");
        Ok(())
    }

    /// Detach listeners and stop the background tasks. The channel stays
    /// open for a later `attach`, and the snapshot keeps its last state.
    pub async fn detach(&self) {
        if let Some(channel) = self.inner.channel.get() {
            channel.unregister_all();
        }

        let Some(attached) = self.inner.attached.lock().await.take() else {
            return;
        };
        attached.cancel.cancel();
        for handle in attached.helpers {
            let _ = handle.await;
        }
        match attached.reconciler.await {
            Ok(parts) => *self.inner.parked.lock().await = Some(parts),
            Err(e) => warn!(error = %e, "reconciler task ended abnormally"),
        }
        info!("console detached");
    }

    /// Detach and close the channel. Used on logout; the console cannot
    /// be attached again afterwards.
    pub async fn shutdown(&self) {
        self.detach().await;
        if let Some(channel) = self.inner.channel.get() {
            channel.close().await;
        }
        info!("console shut down");
    }

    /// Attach, run `f`, then shut down. For one-shot CLI commands.
    pub async fn oneshot<F, Fut, T>(config: ConsoleConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Console) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let console = Console::new(config);
        console.attach().await?;
        let result = f(console.clone()).await;
        console.shutdown().await;
        result
    }

    // ── Commands ─────────────────────────────────────────────────────

    async fn emit(&self, command: OutboundCommand) -> Result<(), CoreError> {
        self.channel().await?.emit(command)?;
        Ok(())
    }

    /// Ask the backend for a new cadence. The snapshot follows once the
    /// backend confirms with `interval-updated`.
    pub async fn set_interval(&self, interval: RefreshInterval) -> Result<(), CoreError> {
        self.inner
            .settings
            .send_modify(|s| s.refresh_interval = interval);
        self.emit(OutboundCommand::SetInterval {
            interval_time: interval.as_wire(),
        })
        .await
    }

    /// Request a full refresh. The snapshot enters loading right away.
    pub async fn manual_refresh(&self) -> Result<(), CoreError> {
        self.emit(OutboundCommand::ManualRefresh).await?;
        // Receiver lives as long as the console.
        let _ = self.inner.input_tx.send(ReconcilerInput::RefreshRequested);
        Ok(())
    }

    pub async fn refresh_cluster_services(&self, cluster_name: &str) -> Result<(), CoreError> {
        self.emit(OutboundCommand::RefreshClusterServices {
            cluster_name: cluster_name.to_owned(),
        })
        .await
    }

    pub async fn refresh_cluster_scheduled_tasks(
        &self,
        cluster_arn: &str,
        cluster_name: &str,
    ) -> Result<(), CoreError> {
        self.emit(OutboundCommand::RefreshClusterScheduledTasks {
            cluster_name: cluster_name.to_owned(),
            cluster_arn: cluster_arn.to_owned(),
        })
        .await
    }

    pub async fn toggle_progressive_loading(&self, enabled: bool) -> Result<(), CoreError> {
        self.inner
            .settings
            .send_modify(|s| s.progressive_loading = enabled);
        self.emit(OutboundCommand::ToggleProgressiveLoading { enabled })
            .await
    }

    pub async fn get_ec2_inventory(&self) -> Result<(), CoreError> {
        self.emit(OutboundCommand::GetEc2Inventory).await
    }

    // ── State observation ────────────────────────────────────────────

    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.inner.snapshot_rx.borrow())
    }

    pub fn subscribe(&self) -> SnapshotStream {
        SnapshotStream::new(self.inner.snapshot_rx.clone())
    }

    pub fn interval_changes(&self) -> watch::Receiver<RefreshInterval> {
        self.inner.interval_rx.clone()
    }

    /// Errors reported by the backend, one per failed cycle.
    pub fn errors(&self) -> broadcast::Receiver<Arc<LoadError>> {
        self.inner.error_rx.resubscribe()
    }

    pub fn settings(&self) -> SessionSettings {
        *self.inner.settings.borrow()
    }

    /// `Disconnected` until the channel has been opened.
    pub fn connection_state(&self) -> ConnectionState {
        self.inner
            .channel
            .get()
            .map_or(ConnectionState::Disconnected, Channel::current_state)
    }

    pub async fn watch_connection(&self) -> Result<watch::Receiver<ConnectionState>, CoreError> {
        Ok(self.channel().await?.state())
    }

    /// Wait for a snapshot satisfying `predicate`.
    ///
    /// Fails early if the channel gives up reconnecting.
    pub async fn wait_until<F>(
        &self,
        timeout: Duration,
        mut predicate: F,
    ) -> Result<Arc<Snapshot>, CoreError>
    where
        F: FnMut(&Snapshot) -> bool,
    {
        let mut snapshots = self.inner.snapshot_rx.clone();
        let mut state = self.channel().await?.state();

        let wait = async {
            tokio::select! {
                snap = snapshots.wait_for(|s| predicate(s)) => {
                    snap.map(|s| Arc::clone(&s)).map_err(|_| CoreError::ChannelClosed)
                }
                failed = state.wait_for(|s| *s == ConnectionState::Failed) => match failed {
                    Ok(_) => Err(CoreError::ConnectionFailed {
                        url: self.inner.config.url.to_string(),
                        reason: "reconnection attempts exhausted".into(),
                    }),
                    Err(_) => Err(CoreError::ChannelClosed),
                },
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| CoreError::Timeout {
                timeout_secs: timeout.as_secs(),
            })?
    }

    /// Request a refresh and wait for a loading cycle to end after it.
    ///
    /// A cycle the backend had already started counts; its data is merged
    /// as it arrives either way.
    pub async fn refresh_and_wait(&self, timeout: Duration) -> Result<Arc<Snapshot>, CoreError> {
        let before = self.snapshot().completed_cycles();
        self.manual_refresh().await?;
        let snap = self
            .wait_until(timeout, |s| s.completed_cycles() > before && !s.is_loading())
            .await?;

        match snap.last_error() {
            Some(error) => Err(CoreError::LoadFailed {
                message: error.to_string(),
            }),
            None => Ok(snap),
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Apply inputs in arrival order until cancelled, then hand the
/// reconciler back so a later attach continues from the same state.
async fn reconciler_task(
    mut reconciler: Reconciler,
    mut input_rx: mpsc::UnboundedReceiver<ReconcilerInput>,
    cancel: CancellationToken,
) -> (Reconciler, mpsc::UnboundedReceiver<ReconcilerInput>) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            input = input_rx.recv() => {
                let Some(input) = input else { break };
                reconciler.handle(&input);
            }
        }
    }

    // Listeners are already gone; apply whatever they forwarded.
    while let Ok(input) = input_rx.try_recv() {
        reconciler.handle(&input);
    }
    (reconciler, input_rx)
}

/// Replay session settings whenever the channel (re)connects.
async fn settings_task(console: Console, channel: Channel, cancel: CancellationToken) {
    let mut state = channel.state();
    let mut was_connected = false;

    loop {
        let connected = state.borrow_and_update().is_connected();
        if connected && !was_connected {
            replay_settings(&channel, console.settings());
        }
        was_connected = connected;

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}

fn replay_settings(channel: &Channel, settings: SessionSettings) {
    debug!(?settings, "replaying session settings");
    let mut commands = vec![OutboundCommand::ToggleProgressiveLoading {
        enabled: settings.progressive_loading,
    }];
    if !settings.refresh_interval.is_automatic() {
        commands.push(OutboundCommand::SetInterval {
            interval_time: settings.refresh_interval.as_wire(),
        });
    }
    for command in commands {
        if let Err(e) = channel.emit(command) {
            warn!(error = %e, "failed to replay session setting");
        }
    }
}

/// Client-driven polling for positive intervals: request a refresh every
/// period while connected and idle.
async fn poll_task(console: Console, cancel: CancellationToken) {
    let mut interval_rx = console.interval_changes();

    loop {
        let period = interval_rx.borrow_and_update().poll_period();

        let Some(period) = period else {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                changed = interval_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            continue;
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = interval_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            () = tokio::time::sleep(period) => {
                let idle = console.connection_state().is_connected()
                    && !console.snapshot().is_loading();
                if !idle {
                    debug!("skipping scheduled refresh");
                } else if let Err(e) = console.manual_refresh().await {
                    warn!(error = %e, "scheduled refresh failed");
                }
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ecswatch_api::protocol::{IntervalUpdated, LoadingComplete, LoadingProgress};
    use ecswatch_api::{InboundEvent, TransportKind};

    use super::*;

    fn offline_config() -> ConsoleConfig {
        // Nothing listens on port 9; the channel just keeps retrying.
        let mut config = ConsoleConfig::new("http://127.0.0.1:9".parse().unwrap());
        config.transports = vec![TransportKind::Polling];
        config.reconnect_delay = Duration::from_secs(3600);
        config.timeout = Duration::from_millis(200);
        config
    }

    fn send(console: &Console, event: InboundEvent) {
        console
            .inner
            .input_tx
            .send(ReconcilerInput::Event(Arc::new(event)))
            .unwrap();
    }

    #[tokio::test]
    async fn snapshot_is_available_before_attach() {
        let mut config = offline_config();
        config.refresh_interval = RefreshInterval::from_secs(45);
        let console = Console::new(config);

        let snap = console.snapshot();
        assert!(snap.clusters().is_empty());
        assert_eq!(snap.refresh_interval(), RefreshInterval::from_secs(45));
        assert_eq!(console.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn channel_is_a_singleton() {
        let console = Console::new(offline_config());
        let a = console.channel().await.unwrap();
        let b = console.clone().channel().await.unwrap();
        a.close().await;
        assert!(b.is_closed());
    }

    #[tokio::test]
    async fn attached_console_reconciles_forwarded_events() {
        let console = Console::new(offline_config());
        console.attach().await.unwrap();
        console.attach().await.unwrap();

        send(
            &console,
            InboundEvent::LoadingProgress(LoadingProgress {
                current: 1,
                total: 4,
                stage: "clusters-basic".into(),
            }),
        );
        let snap = console
            .wait_until(Duration::from_secs(2), Snapshot::is_loading)
            .await
            .unwrap();
        assert_eq!(snap.loading_percentage(), 25);

        console.shutdown().await;
    }

    #[tokio::test]
    async fn state_survives_detach_and_reattach() {
        let console = Console::new(offline_config());
        console.attach().await.unwrap();
        send(
            &console,
            InboundEvent::IntervalUpdated(IntervalUpdated { interval_time: 0 }),
        );
        console.detach().await;
        assert!(console.snapshot().refresh_interval().is_paused());

        console.attach().await.unwrap();
        send(
            &console,
            InboundEvent::LoadingComplete(LoadingComplete {
                message: "done".into(),
                updated_on: None,
            }),
        );
        let snap = console
            .wait_until(Duration::from_secs(2), |s| s.completed_cycles() == 1)
            .await
            .unwrap();
        assert!(snap.refresh_interval().is_paused());
        console.shutdown().await;
    }

    #[tokio::test]
    async fn commands_update_session_settings() {
        let console = Console::new(offline_config());
        console.toggle_progressive_loading(false).await.unwrap();
        console
            .set_interval(RefreshInterval::from_secs(30))
            .await
            .unwrap();

        let settings = console.settings();
        assert!(!settings.progressive_loading);
        assert_eq!(settings.refresh_interval, RefreshInterval::from_secs(30));
        console.shutdown().await;
    }

    #[tokio::test]
    async fn wait_until_times_out() {
        let console = Console::new(offline_config());
        let err = console
            .wait_until(Duration::from_millis(50), |s| !s.clusters().is_empty())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Timeout { .. }));
        console.shutdown().await;
    }

    #[tokio::test]
    async fn attach_after_shutdown_is_rejected() {
        let console = Console::new(offline_config());
        console.attach().await.unwrap();
        console.shutdown().await;
        assert!(matches!(
            console.attach().await,
            Err(CoreError::ChannelClosed)
        ));
    }
}
