//! The real-time channel to the console backend.
//!
//! A [`Channel`] owns one background task that keeps a Socket.IO session
//! alive: it tries each configured transport in order, reconnects with a
//! fixed delay up to a bounded number of attempts, answers heartbeats,
//! routes inbound events to the [`ListenerRegistry`], and flushes queued
//! [`OutboundCommand`]s whenever a session is up.
//!
//! ```rust,ignore
//! use ecswatch_api::{Channel, ChannelConfig, EventKind, Listeners, OutboundCommand};
//!
//! let channel = Channel::open(ChannelConfig::new("https://console.internal".parse()?))?;
//! channel.register(Listeners::new().on(EventKind::LoadingProgress, |event| {
//!     println!("{event:?}");
//! }));
//! channel.emit(OutboundCommand::ManualRefresh)?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::engineio::{EnginePacket, PROTOCOL_VERSION};
use crate::error::Error;
use crate::listeners::{ListenerRegistry, Listeners};
use crate::protocol::{InboundEvent, OutboundCommand};
use crate::socketio::{DEFAULT_NAMESPACE, SocketPacket};
use crate::transport::{TransportConfig, TransportKind};
use crate::{polling, websocket};

/// Default Socket.IO mount point on the backend.
pub const DEFAULT_PATH: &str = "/socket.io/";

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Fixed-delay reconnection policy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Attempts after a failure before the channel gives up. Default: 10.
    pub max_attempts: u32,

    /// Pause between attempts. Default: 2s.
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(2),
        }
    }
}

// ── ChannelConfig ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Backend base URL (`http(s)://host[:port]`).
    pub url: Url,
    /// Socket.IO mount path. Default: `/socket.io/`.
    pub path: String,
    pub namespace: String,
    /// Transports to try, in order, on every (re)connect.
    pub transports: Vec<TransportKind>,
    pub transport: TransportConfig,
    pub reconnect: ReconnectConfig,
}

impl ChannelConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            path: DEFAULT_PATH.into(),
            namespace: DEFAULT_NAMESPACE.into(),
            transports: vec![TransportKind::WebSocket, TransportKind::Polling],
            transport: TransportConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Engine.IO endpoint for `kind`, with the scheme mapped to match
    /// (`http`/`https` for polling, `ws`/`wss` for websockets).
    pub fn endpoint(&self, kind: TransportKind) -> Result<Url, Error> {
        let mut url = self.url.join(&self.path)?;

        let scheme = match (kind, url.scheme()) {
            (TransportKind::WebSocket, "http" | "ws") => "ws",
            (TransportKind::WebSocket, "https" | "wss") => "wss",
            (TransportKind::Polling, "http" | "ws") => "http",
            (TransportKind::Polling, "https" | "wss") => "https",
            (_, other) => {
                return Err(Error::Handshake(format!("unsupported URL scheme '{other}'")));
            }
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::Handshake(format!("cannot use scheme '{scheme}' for {url}")))?;

        url.query_pairs_mut()
            .clear()
            .append_pair("EIO", PROTOCOL_VERSION)
            .append_pair("transport", &kind.to_string());
        Ok(url)
    }
}

// ── ConnectionState ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected { transport: TransportKind },
    Reconnecting { attempt: u32 },
    /// Reconnection attempts exhausted. Terminal until the channel is reopened.
    Failed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected { transport } => write!(f, "connected ({transport})"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

// ── Channel ──────────────────────────────────────────────────────────

/// Handle to the running channel. Cheap to clone.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    shared: Arc<Shared>,
    command_tx: mpsc::UnboundedSender<OutboundCommand>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// State the background task and the handle both touch.
pub(crate) struct Shared {
    listeners: ListenerRegistry,
    state: watch::Sender<ConnectionState>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

impl Channel {
    /// Spawn the connection task and return immediately.
    ///
    /// Must be called from inside a Tokio runtime. The first connection
    /// attempt happens in the background; watch [`state`](Self::state)
    /// to see it come up. Commands emitted before then are queued.
    pub fn open(config: ChannelConfig) -> Result<Self, Error> {
        if config.transports.is_empty() {
            return Err(Error::Handshake("no transports configured".into()));
        }
        for kind in &config.transports {
            config.endpoint(*kind)?;
        }
        let client = config.transport.build_client()?;

        let (state, _) = watch::channel(ConnectionState::Connecting);
        let shared = Arc::new(Shared {
            listeners: ListenerRegistry::new(),
            state,
        });
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let task = tokio::spawn(channel_loop(
            config,
            client,
            Arc::clone(&shared),
            command_rx,
            cancel.clone(),
        ));

        Ok(Self {
            inner: Arc::new(ChannelInner {
                shared,
                command_tx,
                cancel,
                task: Mutex::new(Some(task)),
            }),
        })
    }

    /// Attach handlers. Replaces any handler already attached to the same
    /// events, so calling this again never duplicates delivery.
    pub fn register(&self, listeners: Listeners) {
        tracing::debug!(?listeners, "registering channel listeners");
        self.inner.shared.listeners.register(listeners);
    }

    /// Detach every handler. Events keep arriving but go nowhere.
    pub fn unregister_all(&self) {
        self.inner.shared.listeners.unregister_all();
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.inner.shared.listeners
    }

    /// Queue a command for the backend.
    ///
    /// Fire-and-forget: `Ok` means the command was queued, not delivered.
    /// Commands queued while disconnected go out once a session is up.
    pub fn emit(&self, command: OutboundCommand) -> Result<(), Error> {
        if self.inner.cancel.is_cancelled() {
            return Err(Error::ChannelClosed);
        }
        tracing::debug!(command = command.event_name(), "queueing command");
        self.inner
            .command_tx
            .send(command)
            .map_err(|_| Error::ChannelClosed)
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.shared.state.subscribe()
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.inner.shared.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.current_state().is_connected()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Stop the background task and detach every listener.
    pub async fn close(&self) {
        self.inner.cancel.cancel();
        self.inner.shared.listeners.unregister_all();
        if let Some(task) = self.inner.task.lock().await.take() {
            let _ = task.await;
        }
        self.inner.shared.set_state(ConnectionState::Disconnected);
        tracing::debug!("channel closed");
    }
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: try each transport → run the session → on drop, wait and
/// retry until `max_attempts` consecutive failures.
async fn channel_loop(
    config: ChannelConfig,
    client: reqwest::Client,
    shared: Arc<Shared>,
    mut commands: mpsc::UnboundedReceiver<OutboundCommand>,
    cancel: CancellationToken,
) {
    let ctx = SessionContext {
        config: &config,
        client: &client,
        shared: &shared,
        cancel: &cancel,
    };
    let mut attempt: u32 = 0;

    'reconnect: loop {
        let mut established = false;

        for &kind in &config.transports {
            let result = match kind {
                TransportKind::WebSocket => websocket::run(&ctx, &mut commands).await,
                TransportKind::Polling => polling::run(&ctx, &mut commands).await,
            };
            established = shared.state.borrow().is_connected();

            if cancel.is_cancelled() {
                break 'reconnect;
            }
            match result {
                Ok(()) => tracing::info!(transport = %kind, "session closed"),
                Err(e) => tracing::warn!(transport = %kind, error = %e, attempt, "session failed"),
            }

            // A live session that dropped reconnects on the preferred
            // transport again rather than falling through to the next one.
            if established {
                break;
            }
        }

        if established {
            attempt = 0;
        }
        attempt += 1;

        if attempt > config.reconnect.max_attempts {
            tracing::error!(
                max_attempts = config.reconnect.max_attempts,
                "reconnection limit reached, giving up"
            );
            shared.set_state(ConnectionState::Failed);
            return;
        }

        shared.set_state(ConnectionState::Reconnecting { attempt });
        tracing::info!(
            delay_ms = u64::try_from(config.reconnect.delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(config.reconnect.delay) => {}
        }
    }

    shared.set_state(ConnectionState::Disconnected);
    tracing::debug!("channel loop exiting");
}

// ── Per-session helpers shared by both transports ────────────────────

/// What a session loop should do after one inbound packet.
pub(crate) enum Step {
    Continue,
    Reply(EnginePacket),
    Close,
}

pub(crate) struct SessionContext<'a> {
    pub config: &'a ChannelConfig,
    pub client: &'a reqwest::Client,
    pub shared: &'a Shared,
    pub cancel: &'a CancellationToken,
}

impl SessionContext<'_> {
    /// Namespace connect carrying the auth payload.
    pub fn connect_packet(&self) -> EnginePacket {
        let packet = SocketPacket::Connect {
            namespace: self.config.namespace.clone(),
            data: self.config.transport.credentials.connect_auth(),
        };
        EnginePacket::Message(packet.encode())
    }

    pub fn command_packet(&self, command: &OutboundCommand) -> EnginePacket {
        let packet = SocketPacket::event(&self.config.namespace, command.event_name(), command.payload());
        EnginePacket::Message(packet.encode())
    }

    /// `Some` once `packet` settles the namespace connect one way or the other.
    pub fn connect_ack(&self, packet: &SocketPacket) -> Option<Result<(), Error>> {
        if packet.namespace() != self.config.namespace {
            return None;
        }
        match packet {
            SocketPacket::Connect { .. } => Some(Ok(())),
            SocketPacket::ConnectError { data, .. } => {
                let reason = data
                    .as_ref()
                    .and_then(|d| d.get("message"))
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("connection refused");
                Some(Err(Error::Handshake(reason.to_owned())))
            }
            _ => None,
        }
    }

    pub fn mark_connected(&self, transport: TransportKind, sid: &str) {
        tracing::info!(%transport, sid, "channel connected");
        self.shared.set_state(ConnectionState::Connected { transport });
    }

    pub fn on_packet(&self, packet: EnginePacket) -> Step {
        match packet {
            EnginePacket::Ping(body) => Step::Reply(EnginePacket::Pong(body)),
            EnginePacket::Close => Step::Close,
            EnginePacket::Message(body) => match SocketPacket::decode(&body) {
                Ok(SocketPacket::Event {
                    namespace,
                    name,
                    payload,
                }) if namespace == self.config.namespace => {
                    self.dispatch(&name, payload);
                    Step::Continue
                }
                Ok(SocketPacket::Disconnect { namespace }) if namespace == self.config.namespace => {
                    tracing::info!("server disconnected the namespace");
                    Step::Close
                }
                Ok(other) => {
                    tracing::trace!(?other, "ignoring socket packet");
                    Step::Continue
                }
                Err(e) => {
                    tracing::warn!(error = %e, "dropping malformed socket packet");
                    Step::Continue
                }
            },
            EnginePacket::Open(_)
            | EnginePacket::Pong(_)
            | EnginePacket::Upgrade
            | EnginePacket::Noop => Step::Continue,
        }
    }

    /// Decode and route one event. Bad payloads are logged and dropped so
    /// one malformed event never takes the session down.
    fn dispatch(&self, name: &str, payload: serde_json::Value) {
        match InboundEvent::decode(name, payload) {
            Ok(Some(event)) => {
                tracing::trace!(event = name, "inbound event");
                self.shared.listeners.dispatch(Arc::new(event));
            }
            Ok(None) => tracing::debug!(event = name, "ignoring unknown event"),
            Err(e) => tracing::warn!(event = name, error = %e, "dropping malformed event payload"),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
