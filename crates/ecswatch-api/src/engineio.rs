//! Engine.IO v4 packet framing.
//!
//! Engine.IO is the transport layer under Socket.IO. Every frame starts
//! with a single-digit packet type followed by an optional string body.
//! Over long-polling several packets share one HTTP body, separated by
//! the ASCII record separator (`0x1e`).

use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

/// Protocol revision sent as the `EIO` query parameter.
pub const PROTOCOL_VERSION: &str = "4";

/// Separator between packets in a long-polling payload.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// A single Engine.IO packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    /// `0` -- handshake, sent once by the server.
    Open(String),
    /// `1` -- transport close.
    Close,
    /// `2` -- heartbeat probe. In v4 the server pings and the client pongs.
    Ping(String),
    /// `3` -- heartbeat reply.
    Pong(String),
    /// `4` -- carries one Socket.IO packet.
    Message(String),
    /// `5` -- transport upgrade.
    Upgrade,
    /// `6` -- no-op, used to release a pending poll.
    Noop,
}

impl EnginePacket {
    /// Decode one packet from its text form.
    pub fn decode(frame: &str) -> Result<Self, Error> {
        let mut chars = frame.chars();
        let kind = chars
            .next()
            .ok_or_else(|| Error::Protocol("empty Engine.IO frame".into()))?;
        let body = chars.as_str();

        match kind {
            '0' => Ok(Self::Open(body.to_owned())),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(body.to_owned())),
            '3' => Ok(Self::Pong(body.to_owned())),
            '4' => Ok(Self::Message(body.to_owned())),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            'b' => Err(Error::Protocol("binary Engine.IO frames are not supported".into())),
            other => Err(Error::Protocol(format!("unknown Engine.IO packet type '{other}'"))),
        }
    }

    /// Encode this packet to its text form.
    pub fn encode(&self) -> String {
        match self {
            Self::Open(body) => format!("0{body}"),
            Self::Close => "1".into(),
            Self::Ping(body) => format!("2{body}"),
            Self::Pong(body) => format!("3{body}"),
            Self::Message(body) => format!("4{body}"),
            Self::Upgrade => "5".into(),
            Self::Noop => "6".into(),
        }
    }
}

/// Split a long-polling response body into packets.
///
/// Empty records are skipped; the first malformed record aborts the whole
/// payload since the framing can no longer be trusted.
pub fn decode_payload(body: &str) -> Result<Vec<EnginePacket>, Error> {
    body.split(RECORD_SEPARATOR)
        .filter(|record| !record.is_empty())
        .map(EnginePacket::decode)
        .collect()
}

/// Join packets into a single long-polling request body.
pub fn encode_payload(packets: &[EnginePacket]) -> String {
    packets
        .iter()
        .map(EnginePacket::encode)
        .collect::<Vec<_>>()
        .join(&RECORD_SEPARATOR.to_string())
}

// ── Handshake ────────────────────────────────────────────────────────

/// Body of the server's `open` packet.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl Handshake {
    pub fn parse(body: &str) -> Result<Self, Error> {
        serde_json::from_str(body).map_err(|e| Error::deserialization(&e, body))
    }

    /// How long the client may go without hearing from the server before
    /// treating the connection as dead.
    pub fn heartbeat_deadline(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

// ── Tests ────────────────────────────────────────────────────────────
