// ── Core error types ──
//
// User-facing errors from ecswatch-core. Consumers never see Engine.IO
// framing or JSON parse failures directly; the `From<ecswatch_api::Error>`
// impl folds transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to console backend at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Console channel is closed")]
    ChannelClosed,

    #[error("Timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Cluster not found: {identifier}")]
    ClusterNotFound { identifier: String },

    #[error("Service not found: {name} in cluster {cluster}")]
    ServiceNotFound { cluster: String, name: String },

    #[error("Instance not found: {identifier}")]
    InstanceNotFound { identifier: String },

    /// The backend reported a failed loading cycle.
    #[error("Backend reported an error: {message}")]
    LoadFailed { message: String },

    // ── Protocol errors ──────────────────────────────────────────────
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<ecswatch_api::Error> for CoreError {
    fn from(err: ecswatch_api::Error) -> Self {
        use ecswatch_api::Error as Api;

        match err {
            Api::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else {
                    CoreError::ConnectionFailed {
                        url: e.url().map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                }
            }
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            Api::PollingStatus { status: 401 | 403 } => CoreError::AuthenticationFailed {
                message: "backend rejected the session credentials".into(),
            },
            Api::PollingStatus { status } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("polling request failed (HTTP {status})"),
            },
            Api::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            Api::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            Api::Handshake(message) => CoreError::AuthenticationFailed { message },
            Api::Protocol(message) => CoreError::Protocol { message },
            Api::HeartbeatTimeout { timeout_ms } => CoreError::Timeout {
                timeout_secs: timeout_ms / 1000,
            },
            Api::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            Api::ChannelClosed => CoreError::ChannelClosed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_rejection_is_an_auth_failure() {
        let err: CoreError = ecswatch_api::Error::Handshake("Not authorized".into()).into();
        assert!(matches!(err, CoreError::AuthenticationFailed { ref message } if message == "Not authorized"));
    }

    #[test]
    fn heartbeat_timeout_maps_to_seconds() {
        let err: CoreError = ecswatch_api::Error::HeartbeatTimeout { timeout_ms: 45_000 }.into();
        assert!(matches!(err, CoreError::Timeout { timeout_secs: 45 }));
    }

    #[test]
    fn polling_401_is_an_auth_failure() {
        let err: CoreError = ecswatch_api::Error::PollingStatus { status: 401 }.into();
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
        let err: CoreError = ecswatch_api::Error::PollingStatus { status: 502 }.into();
        assert!(matches!(err, CoreError::ConnectionFailed { .. }));
    }
}
