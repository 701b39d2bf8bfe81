//! HubConnection against an in-process WebSocket server

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use ha_client::{HubConnection, HubError};
use ha_trigger_engine::{BoxError, NotificationSource, Payload, TriggerEngine};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

type ServerStream = WebSocketStream<TcpStream>;

/// Accept one connection and run `script` on it; returns the host to dial
async fn mock_hub<F, Fut>(script: F) -> (String, JoinHandle<()>)
where
    F: FnOnce(ServerStream) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host = listener.local_addr().unwrap().to_string();

    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let ws = accept_async(tcp).await.unwrap();
        script(ws).await;
    });

    (host, server)
}

async fn send(ws: &mut ServerStream, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

async fn recv(ws: &mut ServerStream) -> Value {
    loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            _ => continue,
        }
    }
}

/// Standard handshake accepting token `secret`
async fn handshake(ws: &mut ServerStream) {
    send(ws, json!({"type": "auth_required", "ha_version": "2024.6.0"})).await;
    let auth = recv(ws).await;
    assert_eq!(auth["type"], "auth");
    if auth["access_token"] == "secret" {
        send(ws, json!({"type": "auth_ok", "ha_version": "2024.6.0"})).await;
    } else {
        send(ws, json!({"type": "auth_invalid", "message": "Invalid access token"})).await;
    }
}

/// Reply to one command with `result`
async fn answer(ws: &mut ServerStream, expected_type: &str, result: Value) {
    let command = recv(ws).await;
    assert_eq!(command["type"], expected_type);
    send(
        ws,
        json!({"id": command["id"], "type": "result", "success": true, "result": result}),
    )
    .await;
}

fn state_changed(entity_id: &str, old: &str, new: &str) -> Value {
    json!({
        "id": 1,
        "type": "event",
        "event": {
            "event_type": "state_changed",
            "data": {
                "entity_id": entity_id,
                "old_state": {"entity_id": entity_id, "state": old, "attributes": {}},
                "new_state": {"entity_id": entity_id, "state": new, "attributes": {}}
            }
        }
    })
}

#[tokio::test]
async fn test_authenticate_and_query_registries() {
    let (host, server) = mock_hub(|mut ws| async move {
        handshake(&mut ws).await;
        answer(&mut ws, "config/area_registry/list", json!([{"area_id": "bedroom", "name": "Bedroom"}])).await;

        let command = recv(&mut ws).await;
        assert_eq!(command["id"], 2);
        send(&mut ws, json!({"id": 2, "type": "result", "success": true})).await;
    })
    .await;

    let mut hub = HubConnection::connect(&host, "secret").await.unwrap();
    assert!(hub.url().ends_with("/api/websocket"));

    let areas = hub.call("config/area_registry/list").await.unwrap();
    assert_eq!(areas[0]["area_id"], "bedroom");

    // Missing result defaults to an empty list
    let empty = hub.call("config/device_registry/list").await.unwrap();
    assert_eq!(empty, json!([]));

    server.await.unwrap();
}

#[tokio::test]
async fn test_rejected_token() {
    let (host, server) = mock_hub(|mut ws| async move {
        handshake(&mut ws).await;
    })
    .await;

    let err = HubConnection::connect(&host, "wrong").await.err().unwrap();
    match err {
        HubError::AuthRejected(reason) => assert_eq!(reason, "Invalid access token"),
        other => panic!("unexpected error: {other}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn test_server_that_skips_auth_required() {
    let (host, server) = mock_hub(|mut ws| async move {
        send(&mut ws, json!({"type": "auth_ok"})).await;
    })
    .await;

    let err = HubConnection::connect(&host, "secret").await.err().unwrap();
    assert!(matches!(err, HubError::UnexpectedHandshake(_)));
    server.await.unwrap();
}

#[tokio::test]
async fn test_reply_id_must_match() {
    let (host, server) = mock_hub(|mut ws| async move {
        handshake(&mut ws).await;
        let _ = recv(&mut ws).await;
        send(&mut ws, json!({"id": 42, "type": "result", "success": true, "result": null})).await;
    })
    .await;

    let mut hub = HubConnection::connect(&host, "secret").await.unwrap();
    let err = hub.subscribe_events().await.unwrap_err();
    assert!(matches!(
        err,
        HubError::IdMismatch {
            expected: 1,
            received: Some(42)
        }
    ));
    server.await.unwrap();
}

#[tokio::test]
async fn test_failed_command() {
    let (host, server) = mock_hub(|mut ws| async move {
        handshake(&mut ws).await;
        let command = recv(&mut ws).await;
        send(
            &mut ws,
            json!({
                "id": command["id"],
                "type": "result",
                "success": false,
                "error": {"code": "unauthorized", "message": "Unauthorized"}
            }),
        )
        .await;
    })
    .await;

    let mut hub = HubConnection::connect(&host, "secret").await.unwrap();
    let err = hub.subscribe_events().await.unwrap_err();
    match err {
        HubError::CommandFailed { command, detail } => {
            assert_eq!(command, "subscribe_events");
            assert!(detail.contains("unauthorized"));
        }
        other => panic!("unexpected error: {other}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn test_event_feed_as_notification_source() {
    let (host, server) = mock_hub(|mut ws| async move {
        handshake(&mut ws).await;
        answer(&mut ws, "subscribe_events", Value::Null).await;

        send(&mut ws, json!({"id": 1, "type": "event", "event": {"event_type": "call_service", "data": {}}})).await;
        ws.send(Message::Ping(vec![1, 2, 3])).await.unwrap();
        send(&mut ws, state_changed("light.bedroom_lamp", "off", "on")).await;
        ws.close(None).await.unwrap();
    })
    .await;

    let mut hub = HubConnection::connect(&host, "secret").await.unwrap();
    hub.subscribe_events().await.unwrap();

    let notification = hub.next_notification().await.unwrap().unwrap();
    assert_eq!(notification.entity_id, "light.bedroom_lamp");
    assert!(notification.transitioned("off", "on"));

    let err = hub.next_notification().await.unwrap_err();
    assert!(matches!(err, HubError::Closed));
    server.await.unwrap();
}

#[tokio::test]
async fn test_malformed_frames_do_not_end_the_feed() {
    let (host, server) = mock_hub(|mut ws| async move {
        handshake(&mut ws).await;
        answer(&mut ws, "subscribe_events", Value::Null).await;

        send(&mut ws, json!({"id": 1, "type": "event", "event": {"data": {}}})).await;
        send(&mut ws, json!({"id": 7})).await;
        ws.send(Message::Text("not json".to_string())).await.unwrap();
        send(&mut ws, state_changed("switch.bedroom_fan", "off", "on")).await;
        send(&mut ws, json!({"type": "auth_invalid", "message": "Token revoked"})).await;
    })
    .await;

    let mut hub = HubConnection::connect(&host, "secret").await.unwrap();
    hub.subscribe_events().await.unwrap();

    let notification = hub.next_notification().await.unwrap().unwrap();
    assert_eq!(notification.entity_id, "switch.bedroom_fan");
    assert!(notification.transitioned("off", "on"));

    match hub.next_notification().await.unwrap_err() {
        HubError::AuthRejected(reason) => assert_eq!(reason, "Token revoked"),
        other => panic!("unexpected error: {other}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn test_engine_listens_to_hub() {
    let (host, server) = mock_hub(|mut ws| async move {
        handshake(&mut ws).await;
        answer(&mut ws, "subscribe_events", Value::Null).await;

        for (old, new) in [("off", "on"), ("on", "off"), ("off", "on")] {
            send(&mut ws, state_changed("binary_sensor.bedroom_motion", old, new)).await;
        }
        ws.close(None).await.unwrap();
    })
    .await;

    let mut hub = HubConnection::connect(&host, "secret").await.unwrap();
    hub.subscribe_events().await.unwrap();

    let engine = TriggerEngine::default();
    let motion = Arc::new(AtomicUsize::new(0));
    let count = motion.clone();
    engine.register(
        |payload: Payload| async move {
            Ok::<_, BoxError>(
                payload
                    .filter(|n| n.is_about("binary_sensor.bedroom_motion"))
                    .map(|n| n.new_value() == Some("on")),
            )
        },
        move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, BoxError>(()) }
        },
        None,
    );

    // The feed ends with a close frame, which ends the listener with an error
    let result = engine.listen(hub).await;
    assert!(result.is_err());
    assert_eq!(motion.load(Ordering::SeqCst), 2);
    server.await.unwrap();
}
