//! Engine.IO over a websocket.
//!
//! After the upgrade the server sends `open`, the client sends the
//! namespace connect, and from then on every websocket text frame is
//! exactly one Engine.IO packet.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, sleep_until};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::channel::{SessionContext, Step};
use crate::engineio::{EnginePacket, Handshake};
use crate::error::Error;
use crate::protocol::OutboundCommand;
use crate::socketio::SocketPacket;
use crate::transport::TransportKind;

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Run one websocket session until it closes, fails, or is cancelled.
pub(crate) async fn run(
    ctx: &SessionContext<'_>,
    commands: &mut tokio::sync::mpsc::UnboundedReceiver<OutboundCommand>,
) -> Result<(), Error> {
    let url = ctx.config.endpoint(TransportKind::WebSocket)?;
    tracing::info!(url = %url, "connecting websocket");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    for (name, value) in ctx.config.transport.credentials.header_pairs() {
        request = request.with_header(name, value);
    }

    let (ws, _response) =
        tokio::time::timeout(ctx.config.transport.timeout, tokio_tungstenite::connect_async(request))
            .await
            .map_err(|_| Error::WebSocketConnect("upgrade timed out".into()))?
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    let (mut write, mut read) = ws.split();

    let handshake = match next_packet(&mut read).await? {
        Some(EnginePacket::Open(body)) => Handshake::parse(&body)?,
        Some(other) => {
            return Err(Error::Handshake(format!("expected open packet, got {other:?}")));
        }
        None => return Err(Error::Handshake("socket closed before open".into())),
    };
    let deadline = handshake.heartbeat_deadline();

    send(&mut write, &ctx.connect_packet()).await?;
    await_connect(ctx, &mut read, &mut write).await?;
    ctx.mark_connected(TransportKind::WebSocket, &handshake.sid);

    let mut heartbeat = Instant::now() + deadline;

    loop {
        tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => {
                let _ = send(&mut write, &EnginePacket::Close).await;
                return Ok(());
            }
            () = sleep_until(heartbeat) => {
                return Err(Error::HeartbeatTimeout {
                    timeout_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                });
            }
            packet = next_packet(&mut read) => {
                heartbeat = Instant::now() + deadline;
                let Some(packet) = packet? else {
                    tracing::info!("websocket closed by server");
                    return Ok(());
                };
                match ctx.on_packet(packet) {
                    Step::Continue => {}
                    Step::Reply(reply) => send(&mut write, &reply).await?,
                    Step::Close => return Ok(()),
                }
            }
            Some(command) = commands.recv() => {
                tracing::debug!(command = command.event_name(), "emitting over websocket");
                send(&mut write, &ctx.command_packet(&command)).await?;
            }
        }
    }
}

/// Read packets until the namespace connect is acknowledged.
async fn await_connect(
    ctx: &SessionContext<'_>,
    read: &mut SplitStream<Stream>,
    write: &mut SplitSink<Stream, Message>,
) -> Result<(), Error> {
    let deadline = ctx.config.transport.timeout;
    tokio::time::timeout(deadline, async {
        loop {
            match next_packet(read).await? {
                Some(EnginePacket::Message(body)) => {
                    if let Some(result) = ctx.connect_ack(&SocketPacket::decode(&body)?) {
                        return result;
                    }
                }
                Some(EnginePacket::Ping(body)) => send(write, &EnginePacket::Pong(body)).await?,
                Some(EnginePacket::Close) | None => {
                    return Err(Error::Handshake("server closed during connect".into()));
                }
                Some(_) => {}
            }
        }
    })
    .await
    .map_err(|_| Error::Handshake("namespace connect was not acknowledged".into()))?
}

/// Next Engine.IO packet, or `None` once the socket is closed.
async fn next_packet(read: &mut SplitStream<Stream>) -> Result<Option<EnginePacket>, Error> {
    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => return EnginePacket::decode(&text).map(Some),
            Some(Ok(Message::Close(frame))) => {
                if let Some(ref cf) = frame {
                    tracing::info!(code = %cf.code, reason = %cf.reason, "websocket close frame received");
                }
                return Ok(None);
            }
            Some(Ok(_)) => {
                // Binary, websocket-level ping/pong -- tungstenite answers pings itself
            }
            Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
            None => return Ok(None),
        }
    }
}

async fn send(write: &mut SplitSink<Stream, Message>, packet: &EnginePacket) -> Result<(), Error> {
    write
        .send(Message::text(packet.encode()))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))
}
