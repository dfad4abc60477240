// Shared transport configuration for the channel.
//
// Both the long-polling and websocket transports attach the same
// credentials and honour the same TLS and timeout settings, so the
// builder logic lives here once.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::{AUTHORIZATION, COOKIE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use strum::{Display, EnumString};

use crate::error::Error;

/// TLS verification mode (api-level mirror of core's `TlsVerification`).
#[derive(Debug, Clone)]
pub enum TlsMode {
    /// Use the system certificate store.
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (self-signed backends in dev setups).
    DangerAcceptInvalid,
}

/// Which Engine.IO transport a session runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum TransportKind {
    /// HTTP long-polling.
    Polling,
    /// Streaming over a websocket.
    #[strum(serialize = "websocket", serialize = "ws")]
    WebSocket,
}

/// Credentials attached to every request the channel makes.
///
/// The backend authenticates the socket the same way it authenticates
/// REST calls: a session cookie, a bearer token, or both.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub bearer_token: Option<SecretString>,
    pub cookie: Option<SecretString>,
}

impl Credentials {
    /// Header pairs for the websocket upgrade request.
    pub(crate) fn header_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(ref token) = self.bearer_token {
            pairs.push(("Authorization", format!("Bearer {}", token.expose_secret())));
        }
        if let Some(ref cookie) = self.cookie {
            pairs.push(("Cookie", cookie.expose_secret().to_owned()));
        }
        pairs
    }

    /// Socket.IO connect `auth` payload, sent with the namespace connect packet.
    pub(crate) fn connect_auth(&self) -> Option<serde_json::Value> {
        self.bearer_token
            .as_ref()
            .map(|token| serde_json::json!({ "token": token.expose_secret() }))
    }

    fn header_map(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        if let Some(ref token) = self.bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| Error::Handshake(format!("invalid bearer token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        if let Some(ref cookie) = self.cookie {
            let mut value = HeaderValue::from_str(cookie.expose_secret())
                .map_err(|e| Error::Handshake(format!("invalid cookie: {e}")))?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }
        Ok(headers)
    }
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Connect timeout. Long-poll requests themselves are bounded by the
    /// heartbeat deadline, not by this value.
    pub timeout: Duration,
    pub credentials: Credentials,
    pub cookie_jar: Option<Arc<Jar>>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            credentials: Credentials::default(),
            cookie_jar: Some(Arc::new(Jar::default())),
        }
    }
}

impl TransportConfig {
    /// Build the `reqwest::Client` used by the polling transport.
    ///
    /// Credentials go into default headers; the cookie jar keeps any
    /// sticky-session cookie the backend sets during the handshake.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.timeout)
            .user_agent(concat!("ecswatch/", env!("CARGO_PKG_VERSION")))
            .default_headers(self.credentials.header_map()?);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        if let Some(ref jar) = self.cookie_jar {
            builder = builder.cookie_provider(Arc::clone(jar));
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}
