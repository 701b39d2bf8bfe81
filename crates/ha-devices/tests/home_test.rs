//! Home::connect against an in-process hub

use futures_util::{SinkExt, StreamExt};
use ha_devices::{DeviceError, Home};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

async fn send(ws: &mut WebSocketStream<TcpStream>, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

async fn recv(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        if let Message::Text(text) = ws.next().await.unwrap().unwrap() {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Serve the handshake and then answer registry listings in order
async fn serve_registries(listener: TcpListener, listings: Vec<(&'static str, Value)>) {
    let (tcp, _) = listener.accept().await.unwrap();
    let mut ws = accept_async(tcp).await.unwrap();

    send(&mut ws, json!({"type": "auth_required"})).await;
    let _ = recv(&mut ws).await;
    send(&mut ws, json!({"type": "auth_ok"})).await;

    for (expected_id, (command_type, result)) in (1u64..).zip(listings) {
        let command = recv(&mut ws).await;
        assert_eq!(command["type"], command_type);
        assert_eq!(command["id"], expected_id);
        send(
            &mut ws,
            json!({"id": expected_id, "type": "result", "success": true, "result": result}),
        )
        .await;
    }
}

#[tokio::test]
async fn test_connect_builds_device_table() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host = listener.local_addr().unwrap().to_string();

    let server = tokio::spawn(serve_registries(
        listener,
        vec![
            (
                "config/area_registry/list",
                json!([{"area_id": "living_room", "name": "Living Room"}]),
            ),
            (
                "config/device_registry/list",
                json!([
                    {"id": "tv", "area_id": "living_room", "model": "Shield"},
                    {"id": "switch", "area_id": "living_room", "model": "Hue dimmer switch"}
                ]),
            ),
            (
                "config/entity_registry/list",
                json!([
                    {"entity_id": "media_player.android_tv", "device_id": "tv", "original_name": "Android TV"},
                    {"entity_id": "event.living_room_button_1", "device_id": "switch", "original_name": "Living Room Button 1"},
                    {"entity_id": "event.living_room_button_4", "device_id": "switch", "original_name": "Living Room Button 4"}
                ]),
            ),
        ],
    ));

    let home = Home::connect(&host, "secret").await.unwrap();
    server.await.unwrap();

    assert_eq!(home.len(), 3);
    let living_room = home.devices().area("Living Room");
    let projector = living_room.name("Android TV").single().unwrap();
    assert_eq!(projector.entity_ids(), vec!["media_player.android_tv"]);

    let button = living_room.name("*Button 1*").single().unwrap();
    assert_eq!(button.devices()[0].name.as_deref(), Some("Button 1"));
    assert_eq!(button.devices()[0].kind.as_deref(), Some("event"));
}

#[tokio::test]
async fn test_connect_rejects_malformed_registry() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host = listener.local_addr().unwrap().to_string();

    let server = tokio::spawn(serve_registries(
        listener,
        vec![
            ("config/area_registry/list", json!([{"name": "No id"}])),
            ("config/device_registry/list", json!([])),
            ("config/entity_registry/list", json!([])),
        ],
    ));

    let err = Home::connect(&host, "secret").await.unwrap_err();
    assert!(matches!(err, DeviceError::Registry { registry: "area", .. }));
    server.await.unwrap();
}
