// ── Runtime console configuration ──
//
// These types describe *how* to reach the console backend. They carry
// credential data and connection tuning but never touch disk; the CLI
// builds a `ConsoleConfig` (usually via ecswatch-config) and hands it in.

use std::time::Duration;

use ecswatch_api::channel::DEFAULT_PATH;
use ecswatch_api::socketio::DEFAULT_NAMESPACE;
use ecswatch_api::{
    ChannelConfig, Credentials, ReconnectConfig, TlsMode, TransportConfig, TransportKind,
};
use secrecy::SecretString;
use url::Url;

use crate::model::RefreshInterval;

/// How the channel authenticates with the backend.
#[derive(Debug, Clone, Default)]
pub enum AuthCredentials {
    /// Unauthenticated backend (local development).
    #[default]
    None,
    /// Bearer token, also sent as the Socket.IO connect `auth.token`.
    Token(SecretString),
    /// Browser session cookie, sent verbatim in the `Cookie` header.
    Cookie(SecretString),
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed certs).
    DangerAcceptInvalid,
}

/// Configuration for one console session.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Backend URL (e.g. `https://console.internal`).
    pub url: Url,
    /// Socket.IO mount path.
    pub socket_path: String,
    pub namespace: String,
    pub auth: AuthCredentials,
    pub tls: TlsVerification,
    /// Connect / handshake timeout.
    pub timeout: Duration,
    /// Consecutive failed attempts before the channel gives up.
    pub reconnect_attempts: u32,
    /// Fixed pause between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Transports to try, in order.
    pub transports: Vec<TransportKind>,
    /// Ask the backend for staged (basic first, details later) delivery.
    pub progressive_loading: bool,
    /// Interval restored from persisted client state.
    pub refresh_interval: RefreshInterval,
}

impl ConsoleConfig {
    pub fn new(url: Url) -> Self {
        let reconnect = ReconnectConfig::default();
        Self {
            url,
            socket_path: DEFAULT_PATH.into(),
            namespace: DEFAULT_NAMESPACE.into(),
            auth: AuthCredentials::None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            reconnect_attempts: reconnect.max_attempts,
            reconnect_delay: reconnect.delay,
            transports: vec![TransportKind::WebSocket, TransportKind::Polling],
            progressive_loading: true,
            refresh_interval: RefreshInterval::AUTOMATIC,
        }
    }

    /// Translate into the channel's own configuration.
    pub(crate) fn channel_config(&self) -> ChannelConfig {
        let credentials = match &self.auth {
            AuthCredentials::None => Credentials::default(),
            AuthCredentials::Token(token) => Credentials {
                bearer_token: Some(token.clone()),
                cookie: None,
            },
            AuthCredentials::Cookie(cookie) => Credentials {
                bearer_token: None,
                cookie: Some(cookie.clone()),
            },
        };

        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };

        ChannelConfig {
            url: self.url.clone(),
            path: self.socket_path.clone(),
            namespace: self.namespace.clone(),
            transports: self.transports.clone(),
            transport: TransportConfig {
                tls,
                timeout: self.timeout,
                credentials,
                ..TransportConfig::default()
            },
            reconnect: ReconnectConfig {
                max_attempts: self.reconnect_attempts,
                delay: self.reconnect_delay,
            },
        }
    }
}
