//! End-to-end tests: a real server on a loopback port, driven over
//! WebSocket and REST.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_test::assert_ok;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use worldcast::app_state::AppState;
use worldcast::server::build_app;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn spawn_server(broadcast_on_clear: bool) -> (SocketAddr, AppState) {
    let state = AppState::new(1024, broadcast_on_clear).await;
    let app = build_app(state.clone(), Path::new("static"));
    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, state)
}

async fn connect(addr: SocketAddr) -> Client {
    let Ok((client, _)) = connect_async(format!("ws://{addr}/subscribe")).await else {
        panic!("ws connect failed");
    };
    client
}

/// Polls until the router holds exactly `expected` subscribers.
async fn wait_for_subscribers(state: &AppState, expected: usize) {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while state.router.subscriber_count() != expected {
        if tokio::time::Instant::now() > deadline {
            panic!(
                "expected {expected} subscribers, have {}",
                state.router.subscriber_count()
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn send(client: &mut Client, text: &str) {
    assert_ok!(client.send(Message::text(text.to_string())).await);
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let Ok(frame) = tokio::time::timeout(TIMEOUT, client.next()).await else {
            panic!("timed out waiting for a message");
        };
        match frame {
            Some(Ok(Message::Text(text))) => {
                let Ok(value) = serde_json::from_str(text.as_str()) else {
                    panic!("server sent non-json text: {}", text.as_str());
                };
                return value;
            }
            Some(Ok(_)) => continue,
            other => panic!("connection ended: {other:?}"),
        }
    }
}

#[tokio::test]
async fn two_sessions_then_one_disconnects() {
    let (addr, state) = spawn_server(true).await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    wait_for_subscribers(&state, 2).await;

    send(&mut a, r#"{"robot1": {"x": 1}}"#).await;
    assert_eq!(next_json(&mut a).await, json!({"robot1": {"x": 1}}));
    assert_eq!(next_json(&mut b).await, json!({"robot1": {"x": 1}}));

    assert_ok!(b.close(None).await);
    wait_for_subscribers(&state, 1).await;

    send(&mut a, r#"{"robot1": {"x": 2}}"#).await;
    assert_eq!(next_json(&mut a).await, json!({"robot1": {"x": 2}}));
    assert_eq!(Value::Object(state.world.get("robot1").await), json!({"x": 2}));
}

#[tokio::test]
async fn malformed_message_is_skipped() {
    let (addr, state) = spawn_server(true).await;
    let mut client = connect(addr).await;
    wait_for_subscribers(&state, 1).await;

    send(&mut client, "not json at all").await;
    send(&mut client, r#"{"a": {}, "b": {}}"#).await;
    send(&mut client, r#"{"a": 3}"#).await;
    send(&mut client, r#"{"ok": {"fine": true}}"#).await;

    assert_eq!(next_json(&mut client).await, json!({"ok": {"fine": true}}));
    assert_eq!(state.world.len().await, 1);
    assert_eq!(state.router.subscriber_count(), 1);
}

#[tokio::test]
async fn rest_writes_reach_subscribers() {
    let (addr, state) = spawn_server(true).await;
    let mut client = connect(addr).await;
    wait_for_subscribers(&state, 1).await;

    let http = reqwest::Client::new();
    let response = assert_ok!(
        http.put(format!("http://{addr}/entity/door"))
            .body(r#"{"open": false}"#)
            .send()
            .await
    );
    assert!(response.status().is_success());
    let stored: Value = assert_ok!(response.json().await);
    assert_eq!(stored, json!({"open": false}));

    assert_eq!(next_json(&mut client).await, json!({"door": {"open": false}}));

    let world: Value = assert_ok!(
        assert_ok!(http.get(format!("http://{addr}/world")).send().await)
            .json()
            .await
    );
    assert_eq!(world, json!({"door": {"open": false}}));
}

#[tokio::test]
async fn direct_writes_arrive_in_call_order() {
    let (addr, state) = spawn_server(true).await;
    let mut client = connect(addr).await;
    wait_for_subscribers(&state, 1).await;

    for i in 0..50 {
        if i % 2 == 0 {
            state.world.update("counter", "n", json!(i)).await;
        } else {
            let Value::Object(data) = json!({"n": i}) else {
                panic!("object literal");
            };
            state.world.set("counter", data).await;
        }
    }
    for i in 0..50 {
        assert_eq!(next_json(&mut client).await, json!({"counter": {"n": i}}));
    }
}

#[tokio::test]
async fn clear_notifies_each_entity() {
    let (addr, state) = spawn_server(true).await;
    let mut client = connect(addr).await;
    wait_for_subscribers(&state, 1).await;

    state.world.update("a", "x", json!(1)).await;
    state.world.update("b", "y", json!(2)).await;
    let _ = next_json(&mut client).await;
    let _ = next_json(&mut client).await;

    let cleared: Value = assert_ok!(
        assert_ok!(reqwest::get(format!("http://{addr}/clear")).await)
            .json()
            .await
    );
    assert_eq!(cleared, json!({}));

    let mut notices = vec![next_json(&mut client).await, next_json(&mut client).await];
    notices.sort_by_key(ToString::to_string);
    assert_eq!(notices, vec![json!({"a": {}}), json!({"b": {}})]);
}

#[tokio::test]
async fn disconnect_deregisters_subscriber() {
    let (addr, state) = spawn_server(false).await;
    let mut client = connect(addr).await;
    wait_for_subscribers(&state, 1).await;

    let _ = client.close(None).await;
    wait_for_subscribers(&state, 0).await;

    state.world.update("after", "k", json!("v")).await;
    assert_eq!(state.router.dropped_messages(), 0);
}

#[tokio::test]
async fn dropped_connection_without_close_frame_is_deregistered() {
    let (addr, state) = spawn_server(true).await;
    let mut a = connect(addr).await;
    let b = connect(addr).await;
    wait_for_subscribers(&state, 2).await;

    drop(b);
    wait_for_subscribers(&state, 1).await;

    send(&mut a, r#"{"robot2": {"y": 5}}"#).await;
    assert_eq!(next_json(&mut a).await, json!({"robot2": {"y": 5}}));
    assert_eq!(state.router.dropped_messages(), 0);
}

#[tokio::test]
async fn server_answers_client_close() {
    let (addr, state) = spawn_server(true).await;
    let mut client = connect(addr).await;
    wait_for_subscribers(&state, 1).await;

    assert_ok!(client.send(Message::Close(None)).await);
    let Ok(frame) = tokio::time::timeout(TIMEOUT, client.next()).await else {
        panic!("timed out waiting for the close reply");
    };
    match frame {
        Some(Ok(Message::Close(_))) | None => {}
        other => panic!("expected a close reply, got {other:?}"),
    }
    wait_for_subscribers(&state, 0).await;
}
