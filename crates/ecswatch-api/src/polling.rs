//! Engine.IO over HTTP long-polling.
//!
//! One session is a `sid` issued by the handshake `GET`. Reads are
//! long-lived `GET`s that the server releases when it has packets (or a
//! `noop`); writes are `POST`s carrying one or more packets. Both take
//! `&self` so a write can go out while a read is parked.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tokio::sync::mpsc;
use url::Url;

use crate::channel::{SessionContext, Step};
use crate::engineio::{self, EnginePacket, Handshake};
use crate::error::Error;
use crate::protocol::OutboundCommand;
use crate::socketio::SocketPacket;
use crate::transport::TransportKind;

const TEXT_PLAIN: &str = "text/plain;charset=UTF-8";

/// An open long-polling session.
pub struct PollingSession {
    client: reqwest::Client,
    /// Endpoint with `EIO`, `transport` and `sid` already in the query.
    url: Url,
    handshake: Handshake,
}

impl PollingSession {
    /// Perform the Engine.IO handshake against `endpoint`.
    ///
    /// `endpoint` must already carry `EIO=4&transport=polling`. Any packets
    /// the server bundled after `open` are returned alongside the session.
    pub async fn open(
        client: reqwest::Client,
        endpoint: &Url,
    ) -> Result<(Self, Vec<EnginePacket>), Error> {
        tracing::debug!(url = %endpoint, "opening long-polling session");

        let body = fetch(client.get(endpoint.clone())).await?;
        let mut packets = engineio::decode_payload(&body)?.into_iter();

        let handshake = match packets.next() {
            Some(EnginePacket::Open(body)) => Handshake::parse(&body)?,
            Some(other) => {
                return Err(Error::Handshake(format!(
                    "expected open packet, got {other:?}"
                )));
            }
            None => return Err(Error::Handshake("empty handshake response".into())),
        };

        let mut url = endpoint.clone();
        url.query_pairs_mut().append_pair("sid", &handshake.sid);

        tracing::debug!(
            sid = %handshake.sid,
            ping_interval = handshake.ping_interval,
            ping_timeout = handshake.ping_timeout,
            "long-polling session open"
        );

        Ok((
            Self {
                client,
                url,
                handshake,
            },
            packets.collect(),
        ))
    }

    pub fn sid(&self) -> &str {
        &self.handshake.sid
    }

    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// Wait for the next batch of packets.
    ///
    /// The request is bounded by the heartbeat deadline: a server that
    /// stays silent past `pingInterval + pingTimeout` is considered gone.
    pub async fn poll(&self) -> Result<Vec<EnginePacket>, Error> {
        let deadline = self.handshake.heartbeat_deadline();
        let request = self.client.get(self.url.clone()).timeout(deadline);
        let body = fetch(request).await.map_err(|e| heartbeat_error(e, deadline))?;
        engineio::decode_payload(&body)
    }

    /// Send packets in a single `POST`.
    pub async fn send(&self, packets: &[EnginePacket]) -> Result<(), Error> {
        if packets.is_empty() {
            return Ok(());
        }
        let body = engineio::encode_payload(packets);
        tracing::trace!(sid = %self.handshake.sid, body = %body, "polling send");
        let request = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, TEXT_PLAIN)
            .body(body);
        fetch(request).await.map(drop)
    }
}

// ── Session loop ─────────────────────────────────────────────────────

/// Run one long-polling session until it closes, fails, or is cancelled.
pub(crate) async fn run(
    ctx: &SessionContext<'_>,
    commands: &mut mpsc::UnboundedReceiver<OutboundCommand>,
) -> Result<(), Error> {
    let endpoint = ctx.config.endpoint(TransportKind::Polling)?;
    let (session, early) = PollingSession::open(ctx.client.clone(), &endpoint).await?;

    session.send(&[ctx.connect_packet()]).await?;
    let backlog = tokio::time::timeout(
        ctx.config.transport.timeout,
        await_connect(ctx, &session, early),
    )
    .await
    .map_err(|_| Error::Handshake("namespace connect was not acknowledged".into()))??;
    ctx.mark_connected(TransportKind::Polling, session.sid());

    for packet in backlog {
        if apply(ctx, &session, packet).await? {
            return Ok(());
        }
    }

    loop {
        let mut poll = Box::pin(session.poll());
        loop {
            tokio::select! {
                biased;
                () = ctx.cancel.cancelled() => {
                    let _ = session.send(&[EnginePacket::Close]).await;
                    return Ok(());
                }
                result = &mut poll => {
                    for packet in result? {
                        if apply(ctx, &session, packet).await? {
                            return Ok(());
                        }
                    }
                    break;
                }
                Some(command) = commands.recv() => {
                    tracing::debug!(command = command.event_name(), "emitting over long-polling");
                    session.send(&[ctx.command_packet(&command)]).await?;
                }
            }
        }
    }
}

/// Poll until the namespace connect is acknowledged. Returns whatever
/// arrived after the acknowledgement in the same batch.
async fn await_connect(
    ctx: &SessionContext<'_>,
    session: &PollingSession,
    early: Vec<EnginePacket>,
) -> Result<Vec<EnginePacket>, Error> {
    let mut batch = early;
    loop {
        let mut packets = batch.into_iter();
        while let Some(packet) = packets.next() {
            match packet {
                EnginePacket::Message(body) => {
                    if let Some(result) = ctx.connect_ack(&SocketPacket::decode(&body)?) {
                        return result.map(|()| packets.collect());
                    }
                }
                EnginePacket::Ping(body) => session.send(&[EnginePacket::Pong(body)]).await?,
                EnginePacket::Close => {
                    return Err(Error::Handshake("server closed during connect".into()));
                }
                _ => {}
            }
        }
        batch = session.poll().await?;
    }
}

/// Handle one packet; `true` means the session is over.
async fn apply(
    ctx: &SessionContext<'_>,
    session: &PollingSession,
    packet: EnginePacket,
) -> Result<bool, Error> {
    match ctx.on_packet(packet) {
        Step::Continue => Ok(false),
        Step::Reply(reply) => session.send(&[reply]).await.map(|()| false),
        Step::Close => Ok(true),
    }
}

// ── HTTP helpers ─────────────────────────────────────────────────────

async fn fetch(request: reqwest::RequestBuilder) -> Result<String, Error> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::PollingStatus {
            status: status.as_u16(),
        });
    }
    Ok(response.text().await?)
}

fn heartbeat_error(err: Error, deadline: Duration) -> Error {
    match err {
        Error::Transport(ref e) if e.is_timeout() => Error::HeartbeatTimeout {
            timeout_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
        },
        other => other,
    }
}
