//! WebSocket connection to the hub
//!
//! Performs the `auth_required` / `auth` / `auth_ok` handshake, issues
//! id-checked commands, and exposes the subscribed event feed as a
//! [`NotificationSource`] for the trigger engine.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use ha_core::Notification;
use ha_trigger_engine::NotificationSource;
use serde_json::{json, Map, Value};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::error::{HubError, HubResult};
use crate::messages::HubMessage;

/// How long to wait for the TCP/WebSocket connection and each handshake frame
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An authenticated hub connection
pub struct HubConnection {
    stream: WsStream,
    url: String,
    next_id: u64,
}

impl HubConnection {
    /// WebSocket URL for a hub host such as `homeassistant.local:8123`
    pub fn websocket_url(host: &str) -> String {
        let host = host.trim_end_matches('/');
        if host.starts_with("ws://") || host.starts_with("wss://") {
            return format!("{}/api/websocket", host);
        }

        let host = host
            .strip_prefix("http://")
            .or_else(|| host.strip_prefix("https://"))
            .unwrap_or(host);
        format!("ws://{}/api/websocket", host)
    }

    /// Connect to the hub and authenticate with a long-lived access token
    pub async fn connect(host: &str, token: &str) -> HubResult<Self> {
        let url = Self::websocket_url(host);
        info!(url = %url, "Connecting to hub");

        let (stream, _) = timeout(HANDSHAKE_TIMEOUT, connect_async(url.as_str()))
            .await
            .map_err(|_| HubError::Timeout)??;

        let mut connection = Self {
            stream,
            url,
            next_id: 1,
        };
        connection.authorize(token).await?;
        Ok(connection)
    }

    async fn authorize(&mut self, token: &str) -> HubResult<()> {
        let first = timeout(HANDSHAKE_TIMEOUT, self.recv())
            .await
            .map_err(|_| HubError::Timeout)??;
        if first.get("type").and_then(Value::as_str) != Some("auth_required") {
            return Err(HubError::UnexpectedHandshake(first.to_string()));
        }

        self.send(json!({"type": "auth", "access_token": token}))
            .await?;

        let reply = timeout(HANDSHAKE_TIMEOUT, self.recv())
            .await
            .map_err(|_| HubError::Timeout)??;
        if reply.get("type").and_then(Value::as_str) != Some("auth_ok") {
            let reason = reply
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| reply.to_string());
            warn!(url = %self.url, reason = %reason, "Hub rejected authentication");
            return Err(HubError::AuthRejected(reason));
        }

        info!(url = %self.url, "Authenticated with hub");
        Ok(())
    }

    /// URL this connection was opened against
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Subscribe to every hub event
    pub async fn subscribe_events(&mut self) -> HubResult<Value> {
        let result = self.call("subscribe_events").await?;
        info!("Subscribed to hub events");
        Ok(result)
    }

    /// Send a command with no arguments and return its `result`
    pub async fn call(&mut self, command_type: &str) -> HubResult<Value> {
        self.call_with(command_type, Map::new()).await
    }

    /// Send a command with extra fields and return its `result`
    ///
    /// Each command gets the next message id. The reply must carry the same
    /// id and must not report `success: false`. A missing `result` is
    /// returned as an empty list.
    pub async fn call_with(
        &mut self,
        command_type: &str,
        mut fields: Map<String, Value>,
    ) -> HubResult<Value> {
        let id = self.next_id;
        self.next_id += 1;

        fields.insert("id".to_string(), Value::from(id));
        fields.insert("type".to_string(), Value::from(command_type));
        debug!(id, command = command_type, "Sending hub command");
        self.send(Value::Object(fields)).await?;

        let reply = self.recv().await?;
        let received = reply.get("id").and_then(Value::as_u64);
        if received != Some(id) {
            return Err(HubError::IdMismatch {
                expected: id,
                received,
            });
        }
        if reply.get("success").and_then(Value::as_bool) == Some(false) {
            return Err(HubError::CommandFailed {
                command: command_type.to_string(),
                detail: reply
                    .get("error")
                    .map(Value::to_string)
                    .unwrap_or_else(|| reply.to_string()),
            });
        }

        Ok(match reply.get("result") {
            Some(result) if !result.is_null() => result.clone(),
            _ => Value::Array(Vec::new()),
        })
    }

    /// Receive the next JSON frame
    ///
    /// Ping, pong and binary frames are skipped. A close frame or the end of
    /// the stream is reported as [`HubError::Closed`].
    pub async fn recv(&mut self) -> HubResult<Value> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(&text)?),
                Some(Ok(Message::Close(_))) | None => return Err(HubError::Closed),
                Some(Ok(other)) => trace!(frame = ?other, "Skipping non-text frame"),
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    async fn send(&mut self, value: Value) -> HubResult<()> {
        self.stream.send(Message::Text(value.to_string())).await?;
        Ok(())
    }

    /// Close the connection
    pub async fn close(mut self) -> HubResult<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationSource for HubConnection {
    type Error = HubError;

    async fn next_notification(&mut self) -> Result<Option<Notification>, Self::Error> {
        loop {
            let value = match self.recv().await {
                Ok(value) => value,
                Err(HubError::Json(e)) => {
                    debug!(error = %e, "Skipping unparseable hub frame");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let message = match serde_json::from_value::<HubMessage>(value) {
                Ok(message) => message,
                Err(e) => {
                    debug!(error = %e, "Skipping malformed hub frame");
                    continue;
                }
            };

            match message {
                HubMessage::Event { event, .. } => match event.into_notification() {
                    Some(notification) => return Ok(Some(notification)),
                    None => continue,
                },
                HubMessage::AuthInvalid { message } => {
                    return Err(HubError::AuthRejected(message.unwrap_or_default()));
                }
                HubMessage::Result {
                    success: false,
                    error,
                    ..
                } => {
                    return Err(HubError::CommandFailed {
                        command: "subscription".to_string(),
                        detail: error.map(|e| e.to_string()).unwrap_or_default(),
                    });
                }
                other => trace!(message = ?other, "Ignoring hub message"),
            }
        }
    }
}
