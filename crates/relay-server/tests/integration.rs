//! End-to-end tests against a real listener on an ephemeral port.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::{SinkExt, StreamExt};
use jsonwebtoken::{EncodingKey, Header, encode};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

use relay_auth::{AuthorizationGate, Claims, JwtVerifier, SharedSecretKeys};
use relay_client::{ClientSession, ConnectUri, SessionEvent, SessionState, WsConnector};
use relay_core::ConnectionId;
use relay_registry::{ConnectionRegistry, MemoryStore};
use relay_server::{RelayServer, ServerConfig};

const TIMEOUT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(300);
const SECRET: &[u8] = b"integration-secret";
const ISSUER_BASE: &str = "https://issuer.test";
const POOL: &str = "pool-1";
const CLIENT: &str = "client-1";

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Boot a server and return it with its `ws://` endpoint.
async fn boot_server() -> (Arc<RelayServer>, String) {
    boot_server_with(ServerConfig::default()).await
}

async fn boot_server_with(config: ServerConfig) -> (Arc<RelayServer>, String) {
    let server = build_server(config);
    let (addr, _handle) = server.listen().await.unwrap();
    (server, format!("ws://{addr}/ws"))
}

fn build_server(config: ServerConfig) -> Arc<RelayServer> {
    let keys = Arc::new(SharedSecretKeys::new(SECRET));
    let verifier = Arc::new(JwtVerifier::new(ISSUER_BASE, keys).with_token_use("access"));
    let gate = Arc::new(AuthorizationGate::new(verifier));
    let registry = Arc::new(ConnectionRegistry::new(Arc::new(MemoryStore::new())));
    Arc::new(RelayServer::new(config, gate, registry))
}

fn token_for(client_id: &str, exp_offset: i64) -> String {
    let now = i64::try_from(SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()).unwrap();
    let claims = Claims {
        sub: "user-1".into(),
        iss: format!("{ISSUER_BASE}/{POOL}"),
        exp: now + exp_offset,
        client_id: Some(client_id.into()),
        token_use: Some("access".into()),
        ..Claims::default()
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
}

fn connect_uri(base: &str, token: &str) -> String {
    ConnectUri::new(base)
        .token(token)
        .client_id(CLIENT)
        .user_pool_id(POOL)
        .build()
}

async fn connect(base: &str) -> WsStream {
    let uri = connect_uri(base, &token_for(CLIENT, 3600));
    let (ws, _) = timeout(TIMEOUT, connect_async(uri)).await.unwrap().unwrap();
    ws
}

/// Wait until the registry holds `n` records.
async fn wait_registered(server: &RelayServer, n: usize) {
    timeout(TIMEOUT, async {
        loop {
            if server.registry().list_active().await.unwrap().len() == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

async fn recv_text(ws: &mut WsStream) -> String {
    loop {
        let msg = timeout(TIMEOUT, ws.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = msg {
            return text.as_str().to_owned();
        }
    }
}

async fn assert_silent(ws: &mut WsStream) {
    if let Ok(Some(Ok(Message::Text(text)))) = timeout(QUIET, ws.next()).await {
        panic!("unexpected frame: {}", text.as_str());
    }
}

async fn send(ws: &mut WsStream, frame: &str) {
    ws.send(Message::Text(frame.into())).await.unwrap();
}

// ── Connect handshake ──

#[tokio::test]
async fn valid_token_registers_connection() {
    let (server, base) = boot_server().await;
    let _ws = connect(&base).await;
    wait_registered(&server, 1).await;
    assert_eq!(server.hub().connection_count().await, 1);
}

#[tokio::test]
async fn bad_token_rejected_with_401_and_nothing_registered() {
    let (server, base) = boot_server().await;
    let uri = connect_uri(&base, "not-a-token");
    match connect_async(uri).await {
        Err(tungstenite::Error::Http(resp)) => assert_eq!(resp.status().as_u16(), 401),
        other => panic!("expected 401, got {other:?}"),
    }
    assert!(server.registry().list_active().await.unwrap().is_empty());
}

#[tokio::test]
async fn expired_token_rejected() {
    let (server, base) = boot_server().await;
    let uri = connect_uri(&base, &token_for(CLIENT, -60));
    assert!(connect_async(uri).await.is_err());
    assert!(server.registry().list_active().await.unwrap().is_empty());
}

#[tokio::test]
async fn wrong_audience_rejected() {
    let (_server, base) = boot_server().await;
    let uri = connect_uri(&base, &token_for("someone-else", 3600));
    match connect_async(uri).await {
        Err(tungstenite::Error::Http(resp)) => assert_eq!(resp.status().as_u16(), 401),
        other => panic!("expected 401, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_query_rejected() {
    let (_server, base) = boot_server().await;
    match connect_async(base.as_str()).await {
        Err(tungstenite::Error::Http(resp)) => assert_eq!(resp.status().as_u16(), 401),
        other => panic!("expected 401, got {other:?}"),
    }
}

// ── Broadcast ──

#[tokio::test]
async fn broadcast_reaches_everyone_but_the_sender() {
    let (server, base) = boot_server().await;
    let mut x = connect(&base).await;
    let mut y = connect(&base).await;
    let mut z = connect(&base).await;
    wait_registered(&server, 3).await;

    send(&mut x, r#"{"action":"message","message":"{\"message\":\"hi\"}"}"#).await;

    assert_eq!(recv_text(&mut y).await, r#"{"message":"hi"}"#);
    assert_eq!(recv_text(&mut z).await, r#"{"message":"hi"}"#);
    assert_silent(&mut x).await;
}

#[tokio::test]
async fn heartbeat_and_unknown_actions_are_not_broadcast() {
    let (server, base) = boot_server().await;
    let mut x = connect(&base).await;
    let mut y = connect(&base).await;
    wait_registered(&server, 2).await;

    send(&mut x, r#"{"action":"heartbeat","message":""}"#).await;
    send(&mut x, r#"{"action":"teleport","message":"nope"}"#).await;
    send(&mut x, "not json").await;
    assert_silent(&mut y).await;

    // The session survives dropped frames.
    send(&mut x, r#"{"action":"message","message":"after"}"#).await;
    assert_eq!(recv_text(&mut y).await, "after");
}

#[tokio::test]
async fn stale_record_is_pruned_during_broadcast() {
    let (server, base) = boot_server().await;
    let mut x = connect(&base).await;
    let mut y = connect(&base).await;
    wait_registered(&server, 2).await;

    // A record with no live connection behind it.
    let ghost = ConnectionId::from("conn_ghost");
    let _ = server.registry().register(&ghost).await.unwrap();
    wait_registered(&server, 3).await;

    send(&mut x, r#"{"action":"message","message":"ping"}"#).await;
    assert_eq!(recv_text(&mut y).await, "ping");
    wait_registered(&server, 2).await;
    assert!(!server.registry().list_active().await.unwrap().contains(&ghost));
}

// ── Disconnect ──

#[tokio::test]
async fn close_unregisters() {
    let (server, base) = boot_server().await;
    let mut x = connect(&base).await;
    let _y = connect(&base).await;
    wait_registered(&server, 2).await;

    x.close(None).await.unwrap();
    wait_registered(&server, 1).await;
}

#[tokio::test]
async fn idle_connection_is_reclaimed() {
    let config = ServerConfig {
        idle_timeout: Duration::from_millis(200),
        idle_check_interval: Duration::from_millis(50),
        ..ServerConfig::default()
    };
    let (server, base) = boot_server_with(config).await;
    let mut x = connect(&base).await;
    wait_registered(&server, 1).await;

    let closed = timeout(TIMEOUT, async {
        loop {
            match x.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());
    wait_registered(&server, 0).await;
}

#[tokio::test]
async fn shutdown_closes_sessions() {
    let (server, base) = boot_server().await;
    let mut x = connect(&base).await;
    wait_registered(&server, 1).await;

    server.shutdown().shutdown();
    let closed = timeout(TIMEOUT, async {
        loop {
            match x.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());
    wait_registered(&server, 0).await;
}

#[tokio::test]
async fn drain_returns_after_sessions_unregister() {
    let server = build_server(ServerConfig::default());
    let (addr, handle) = server.listen().await.unwrap();
    let base = format!("ws://{addr}/ws");
    let _a = connect(&base).await;
    let _b = connect(&base).await;
    wait_registered(&server, 2).await;

    timeout(TIMEOUT, server.shutdown().drain(vec![handle], None))
        .await
        .unwrap();
    // No polling: everything must already be gone when drain returns.
    assert!(server.registry().list_active().await.unwrap().is_empty());
    assert_eq!(server.hub().connection_count().await, 0);
    assert_eq!(server.shutdown().live_sessions(), 0);
}

// ── Client session against the real server ──

#[tokio::test]
async fn client_sessions_exchange_messages() {
    let (server, base) = boot_server().await;
    let uri = connect_uri(&base, &token_for(CLIENT, 3600));

    let (alice, mut alice_events) = ClientSession::new(Arc::new(WsConnector), None);
    let (bob, mut bob_events) = ClientSession::new(Arc::new(WsConnector), None);
    alice.connect(&uri).await.unwrap();
    bob.connect(&uri).await.unwrap();
    assert_eq!(alice_events.recv().await, Some(SessionEvent::Opened));
    assert_eq!(bob_events.recv().await, Some(SessionEvent::Opened));
    wait_registered(&server, 2).await;

    alice
        .send_message(r#"{"Type":"chat","Content":"hello"}"#)
        .await
        .unwrap();
    let got = timeout(TIMEOUT, bob_events.recv()).await.unwrap();
    assert_eq!(
        got,
        Some(SessionEvent::Message(r#"{"Type":"chat","Content":"hello"}"#.into()))
    );

    alice.close().await.unwrap();
    assert_eq!(alice.state(), SessionState::Closed);
    wait_registered(&server, 1).await;
}

#[tokio::test]
async fn client_session_rejected_upgrade_is_errored() {
    let (_server, base) = boot_server().await;
    let uri = connect_uri(&base, "garbage");

    let (session, mut events) = ClientSession::new(Arc::new(WsConnector), None);
    assert!(session.connect(&uri).await.is_err());
    assert_eq!(session.state(), SessionState::Errored);
    assert!(matches!(events.recv().await, Some(SessionEvent::Error(_))));
}

#[tokio::test]
async fn client_heartbeat_keeps_session_alive() {
    let config = ServerConfig {
        idle_timeout: Duration::from_millis(400),
        idle_check_interval: Duration::from_millis(50),
        ..ServerConfig::default()
    };
    let (server, base) = boot_server_with(config).await;
    let uri = connect_uri(&base, &token_for(CLIENT, 3600));

    let (session, _events) =
        ClientSession::new(Arc::new(WsConnector), Some(Duration::from_millis(100)));
    session.connect(&uri).await.unwrap();
    wait_registered(&server, 1).await;

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(session.state(), SessionState::Open);
    assert_eq!(server.registry().list_active().await.unwrap().len(), 1);
}
