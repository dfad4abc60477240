use thiserror::Error;

/// Top-level error type for the `ecswatch-api` crate.
///
/// Covers every failure mode of the channel: HTTP long-polling, the
/// websocket transport, the Engine.IO / Socket.IO handshake, and payload
/// decoding. `ecswatch-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Polling request answered with a non-success status.
    #[error("Polling request failed (HTTP {status})")]
    PollingStatus { status: u16 },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Protocol ────────────────────────────────────────────────────
    /// The Engine.IO open or Socket.IO connect exchange did not complete.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// A frame did not follow the Engine.IO / Socket.IO framing rules.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No packet arrived within `pingInterval + pingTimeout`.
    #[error("Heartbeat timed out after {timeout_ms}ms")]
    HeartbeatTimeout { timeout_ms: u64 },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Lifecycle ───────────────────────────────────────────────────
    /// The channel task has shut down and no longer accepts commands.
    #[error("Channel closed")]
    ChannelClosed,
}

impl Error {
    /// Returns `true` if this is a transient error worth reconnecting for.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_)
            | Self::WebSocketClosed { .. }
            | Self::HeartbeatTimeout { .. }
            | Self::PollingStatus { .. } => true,
            _ => false,
        }
    }

    pub(crate) fn deserialization(err: &serde_json::Error, body: impl Into<String>) -> Self {
        Self::Deserialization {
            message: err.to_string(),
            body: body.into(),
        }
    }
}
