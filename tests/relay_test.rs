//! End-to-end tests: boot the relay on an ephemeral port with in-memory
//! collaborators and drive it over real sockets.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_test::assert_ok;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use chat_relay::app_state::AppState;
use chat_relay::auth::{TokenGate, TokenKind};
use chat_relay::domain::{Hub, UserId};
use chat_relay::persistence::memory::{InMemoryDirectory, InMemoryMessageStore};
use chat_relay::service::DeliveryService;

const SECRET: &[u8] = b"relay-e2e-secret";
const ALICE_NUMBER: &str = "0100000000";
const BOB_NUMBER: &str = "0200000000";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_relay() -> SocketAddr {
    let delivery = DeliveryService::new(
        Arc::new(Hub::new()),
        Arc::new(InMemoryDirectory::from_seed(&format!(
            "1:alice:{ALICE_NUMBER},2:bob:{BOB_NUMBER}"
        ))),
        Arc::new(InMemoryMessageStore::new()),
        Duration::from_secs(2),
    );
    let state = AppState {
        delivery: Arc::new(delivery),
        token_gate: TokenGate::new(SECRET),
        outbound_queue_capacity: 16,
    };

    let listener = assert_ok!(tokio::net::TcpListener::bind("127.0.0.1:0").await);
    let addr = assert_ok!(listener.local_addr());
    tokio::spawn(async move {
        let _ = axum::serve(listener, chat_relay::build_app(state)).await;
    });
    addr
}

fn token(user: &str, kind: TokenKind) -> String {
    let gate = TokenGate::new(SECRET);
    assert_ok!(gate.issue(&UserId::from(user), &kind, chrono::Duration::minutes(5)))
}

async fn connect(addr: SocketAddr, user: &str) -> Socket {
    let url = format!("ws://{addr}/ws?token={}", token(user, TokenKind::Access));
    let (socket, _) = assert_ok!(connect_async(url).await);
    socket
}

async fn connected_sessions(addr: SocketAddr) -> u64 {
    let resp = assert_ok!(reqwest::get(format!("http://{addr}/health")).await);
    let body: Value = assert_ok!(resp.json().await);
    body["connected_sessions"].as_u64().unwrap_or_default()
}

async fn wait_for_sessions(addr: SocketAddr, expected: u64) {
    for _ in 0..100 {
        if connected_sessions(addr).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("never reached {expected} connected sessions");
}

async fn next_message(socket: &mut Socket) -> WsMessage {
    match tokio::time::timeout(Duration::from_secs(3), socket.next()).await {
        Ok(Some(Ok(msg))) => msg,
        other => panic!("no message from relay: {other:?}"),
    }
}

#[tokio::test]
async fn socket_message_reaches_connected_recipient() {
    let addr = spawn_relay().await;
    let mut alice = connect(addr, "1").await;
    let mut bob = connect(addr, "2").await;
    wait_for_sessions(addr, 2).await;

    let frame = json!({"receiver_number": BOB_NUMBER, "message": "hi"});
    assert_ok!(alice.send(WsMessage::text(frame.to_string())).await);

    let WsMessage::Text(text) = next_message(&mut bob).await else {
        panic!("expected text frame");
    };
    let received: Value = assert_ok!(serde_json::from_str(text.as_str()));
    assert_eq!(received["sender_id"], "1");
    assert_eq!(received["message"], "hi");
    assert!(received["created_at"].is_string());
    assert_eq!(received.as_object().map(|o| o.len()), Some(3));

    let list: Value = assert_ok!(
        assert_ok!(
            reqwest::Client::new()
                .get(format!("http://{addr}/chat_list"))
                .bearer_auth(token("1", TokenKind::Access))
                .send()
                .await
        )
        .json()
        .await
    );
    assert_eq!(list[0]["partner_id"], "2");
    assert_eq!(list[0]["last_message"], "hi");
}

#[tokio::test]
async fn rest_send_is_delivered_live_and_stored_for_offline() {
    let addr = spawn_relay().await;
    let client = reqwest::Client::new();

    // Bob offline: stored only.
    let resp = assert_ok!(
        client
            .post(format!("http://{addr}/message"))
            .bearer_auth(token("1", TokenKind::Access))
            .json(&json!({"receiver_number": BOB_NUMBER, "message": "while away"}))
            .send()
            .await
    );
    assert_eq!(resp.status(), 200);

    // Bob online: delivered live.
    let mut bob = connect(addr, "2").await;
    wait_for_sessions(addr, 1).await;
    let resp = assert_ok!(
        client
            .post(format!("http://{addr}/message"))
            .bearer_auth(token("1", TokenKind::Access))
            .json(&json!({"receiver_number": BOB_NUMBER, "message": "now live"}))
            .send()
            .await
    );
    assert_eq!(resp.status(), 200);

    let WsMessage::Text(text) = next_message(&mut bob).await else {
        panic!("expected text frame");
    };
    let received: Value = assert_ok!(serde_json::from_str(text.as_str()));
    assert_eq!(received["message"], "now live");

    let history: Value = assert_ok!(
        assert_ok!(
            client
                .post(format!("http://{addr}/get_message"))
                .bearer_auth(token("2", TokenKind::Access))
                .json(&json!({"sender_number": ALICE_NUMBER}))
                .send()
                .await
        )
        .json()
        .await
    );
    assert_eq!(history[0]["message"], "while away");
    assert_eq!(history[1]["message"], "now live");
}

#[tokio::test]
async fn second_connection_replaces_first() {
    let addr = spawn_relay().await;
    let mut first = connect(addr, "2").await;
    wait_for_sessions(addr, 1).await;
    let mut second = connect(addr, "2").await;

    let WsMessage::Close(Some(frame)) = next_message(&mut first).await else {
        panic!("expected close frame on replaced session");
    };
    assert_eq!(u16::from(frame.code), 4000);
    wait_for_sessions(addr, 1).await;

    let mut alice = connect(addr, "1").await;
    wait_for_sessions(addr, 2).await;
    let frame = json!({"receiver_number": BOB_NUMBER, "message": "to the new one"});
    assert_ok!(alice.send(WsMessage::text(frame.to_string())).await);

    let WsMessage::Text(text) = next_message(&mut second).await else {
        panic!("expected text frame");
    };
    assert!(text.as_str().contains("to the new one"));
}

#[tokio::test]
async fn upgrade_with_bad_token_is_rejected() {
    let addr = spawn_relay().await;

    assert!(connect_async(format!("ws://{addr}/ws?token=garbage")).await.is_err());
    assert!(connect_async(format!("ws://{addr}/ws")).await.is_err());

    let resp = assert_ok!(reqwest::get(format!("http://{addr}/ws?token=garbage")).await);
    assert_eq!(resp.status(), 401);
    let body: Value = assert_ok!(resp.json().await);
    assert_eq!(body["error"]["code"], 1001);

    let refresh = token("1", TokenKind::Refresh);
    let resp = assert_ok!(reqwest::get(format!("http://{addr}/ws?token={refresh}")).await);
    assert_eq!(resp.status(), 401);

    assert_eq!(connected_sessions(addr).await, 0);
}

#[tokio::test]
async fn rest_rejects_bad_token_and_self_send() {
    let addr = spawn_relay().await;
    let client = reqwest::Client::new();

    let resp = assert_ok!(
        client
            .post(format!("http://{addr}/message"))
            .bearer_auth("not-a-token")
            .json(&json!({"receiver_number": BOB_NUMBER, "message": "x"}))
            .send()
            .await
    );
    assert_eq!(resp.status(), 401);

    let resp = assert_ok!(
        client
            .post(format!("http://{addr}/message"))
            .bearer_auth(token("1", TokenKind::Access))
            .json(&json!({"receiver_number": ALICE_NUMBER, "message": "me"}))
            .send()
            .await
    );
    assert_eq!(resp.status(), 400);
}
