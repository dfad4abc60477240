// Integration tests for the long-polling transport using wiremock.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use tokio::sync::mpsc;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ecswatch_api::{
    Channel, ChannelConfig, ConnectionState, InboundEvent, Listeners, OutboundCommand,
    ReconnectConfig, TransportKind,
};

const HANDSHAKE: &str =
    r#"0{"sid":"eio-1","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":20000}"#;

// ── Helpers ─────────────────────────────────────────────────────────

fn polling_config(server: &MockServer) -> ChannelConfig {
    let mut config = ChannelConfig::new(server.uri().parse().unwrap());
    config.transports = vec![TransportKind::Polling];
    config.transport.timeout = Duration::from_secs(2);
    config.reconnect = ReconnectConfig {
        max_attempts: 1,
        delay: Duration::from_millis(20),
    };
    config
}

/// Handshake, connect POST, one batch with the connect ack plus `first_batch`,
/// then idle `noop` polls.
async fn mount_session(server: &MockServer, first_batch: &str) {
    Mock::given(method("GET"))
        .and(path("/socket.io/"))
        .and(query_param("EIO", "4"))
        .and(query_param("transport", "polling"))
        .and(query_param_is_missing("sid"))
        .respond_with(ResponseTemplate::new(200).set_body_string(HANDSHAKE))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/socket.io/"))
        .and(query_param("sid", "eio-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/socket.io/"))
        .and(query_param("sid", "eio-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(format!("40{{\"sid\":\"s-1\"}}\u{1e}{first_batch}")),
        )
        .up_to_n_times(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/socket.io/"))
        .and(query_param("sid", "eio-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("6")
                .set_delay(Duration::from_millis(100)),
        )
        .mount(server)
        .await;
}

async fn wait_for_state(channel: &Channel, wanted: impl Fn(&ConnectionState) -> bool) {
    let mut rx = channel.state();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| wanted(s)))
        .await
        .expect("state change timed out")
        .unwrap();
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_polling_session_delivers_events() {
    let server = MockServer::start().await;
    mount_session(
        &server,
        r#"42["interval-updated",{"intervalTime":30}]"#,
    )
    .await;

    let channel = Channel::open(polling_config(&server)).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    channel.register(Listeners::forward_all(&tx));

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let InboundEvent::IntervalUpdated(update) = event.as_ref() else {
        panic!("expected interval-updated, got {event:?}");
    };
    assert_eq!(update.interval_time, 30);
    assert_eq!(
        channel.current_state(),
        ConnectionState::Connected {
            transport: TransportKind::Polling
        }
    );

    channel.close().await;
    assert_eq!(channel.current_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_polling_session_flushes_queued_commands() {
    let server = MockServer::start().await;
    mount_session(&server, "6").await;

    let channel = Channel::open(polling_config(&server)).unwrap();
    // Queued before the session exists.
    channel.emit(OutboundCommand::SetInterval { interval_time: 60 }).unwrap();
    channel.emit(OutboundCommand::ManualRefresh).unwrap();

    wait_for_state(&channel, ConnectionState::is_connected).await;

    let mut bodies = Vec::new();
    for _ in 0..50 {
        bodies = server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.method.as_str() == "POST")
            .map(|r| String::from_utf8(r.body).unwrap())
            .collect();
        if bodies.len() >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(bodies[0], "40");
    assert_eq!(bodies[1], r#"42["set-interval",60]"#);
    assert_eq!(bodies[2], r#"42["manual-refresh"]"#);

    channel.close().await;
}

#[tokio::test]
async fn test_polling_answers_server_ping() {
    let server = MockServer::start().await;
    mount_session(&server, "2").await;

    let channel = Channel::open(polling_config(&server)).unwrap();
    wait_for_state(&channel, ConnectionState::is_connected).await;

    let mut ponged = false;
    for _ in 0..50 {
        ponged = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .any(|r| r.method.as_str() == "POST" && r.body == b"3");
        if ponged {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(ponged, "client never answered the server ping");

    channel.close().await;
}

#[tokio::test]
async fn test_malformed_event_does_not_end_session() {
    let server = MockServer::start().await;
    mount_session(
        &server,
        "42[\"clusters-error\",42]\u{1e}42[\"loading-complete\",{\"message\":\"done\"}]",
    )
    .await;

    let channel = Channel::open(polling_config(&server)).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    channel.register(Listeners::forward_all(&tx));

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event.as_ref(), InboundEvent::LoadingComplete(_)));
    assert!(channel.is_connected());

    channel.close().await;
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/socket.io/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let channel = Channel::open(polling_config(&server)).unwrap();
    wait_for_state(&channel, |s| *s == ConnectionState::Failed).await;

    // Handshake once, then one reconnect attempt.
    let attempts = server.received_requests().await.unwrap().len();
    assert_eq!(attempts, 2);
}

#[tokio::test]
async fn test_rejected_namespace_connect_is_not_connected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/socket.io/"))
        .and(query_param_is_missing("sid"))
        .respond_with(ResponseTemplate::new(200).set_body_string(HANDSHAKE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/socket.io/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/socket.io/"))
        .and(query_param("sid", "eio-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"44{"message":"Not authorized"}"#))
        .mount(&server)
        .await;

    let channel = Channel::open(polling_config(&server)).unwrap();
    wait_for_state(&channel, |s| *s == ConnectionState::Failed).await;
    assert!(!channel.is_connected());
}
